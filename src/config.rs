use crate::types::{GeoPatchError, GeoResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Path prefix marking a metered remote raster endpoint
const METERED_PREFIX: &str = "EEDAI:";

/// Query budget of the metered endpoint, in reads per second
const METERED_ENDPOINT_QPS: f64 = 100.0;

/// Maximum number of workers the scheduler may fan out to. The rate
/// budget is divided statically by this; there is no cross-worker
/// coordination.
const MAX_WORKERS: f64 = 20.0;

/// Where the extraction run executes. Distributed fan-out itself is
/// handled by an external scheduler; we only validate its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ExecutionMode {
    Local,
    Distributed {
        project: Option<String>,
        region: Option<String>,
    },
}

/// Startup configuration for an example generation run.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateExamplesConfig {
    /// Before-disaster image path; `None` switches the orchestrator to
    /// placeholder-before mode
    pub before_image_path: Option<String>,
    /// After-disaster image path
    pub after_image_path: String,
    /// Size of the patches packaged into training records
    pub example_patch_size: usize,
    /// Size of the patches used during alignment; larger than the
    /// example size so alignment sees more context
    pub alignment_patch_size: usize,
    /// Size of the before/after crops in labeling images
    pub labeling_patch_size: usize,
    /// Desired output resolution in m/pixel
    pub resolution: f64,
    /// Parent output directory
    pub output_dir: PathBuf,
    /// Number of record shard files
    pub num_output_shards: usize,
    /// How many labeling images to sample, 0 to disable
    pub num_labeling_images: usize,
    /// Raster backend settings in `var=value` form
    pub backend_settings: Vec<String>,
    pub mode: ExecutionMode,
}

impl Default for GenerateExamplesConfig {
    fn default() -> Self {
        Self {
            before_image_path: None,
            after_image_path: String::new(),
            example_patch_size: 64,
            alignment_patch_size: 96,
            labeling_patch_size: 64,
            resolution: 0.5,
            output_dir: PathBuf::from("examples_output"),
            num_output_shards: 20,
            num_labeling_images: 0,
            backend_settings: Vec::new(),
            mode: ExecutionMode::Local,
        }
    }
}

impl GenerateExamplesConfig {
    /// Validate the whole surface at startup. Any failure here aborts
    /// the run before rasters are opened.
    pub fn validate(&self) -> GeoResult<()> {
        if self.after_image_path.is_empty() {
            return Err(GeoPatchError::Validation(
                "after image path must be set".to_string(),
            ));
        }
        if self.example_patch_size == 0 || self.labeling_patch_size == 0 {
            return Err(GeoPatchError::Validation(
                "patch sizes must be positive".to_string(),
            ));
        }
        if self.alignment_patch_size < self.example_patch_size
            || self.alignment_patch_size < self.labeling_patch_size
        {
            return Err(GeoPatchError::Validation(format!(
                "alignment patch size {} must cover the example ({}) and labeling ({}) crops",
                self.alignment_patch_size, self.example_patch_size, self.labeling_patch_size
            )));
        }
        if self.resolution <= 0.0 {
            return Err(GeoPatchError::Validation(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.num_output_shards == 0 {
            return Err(GeoPatchError::Validation(
                "shard count must be at least 1".to_string(),
            ));
        }
        if let ExecutionMode::Distributed { project, region } = &self.mode {
            if project.is_none() || region.is_none() {
                return Err(GeoPatchError::Validation(
                    "project and region must be specified in distributed mode".to_string(),
                ));
            }
        }
        parse_backend_settings(&self.backend_settings)?;
        Ok(())
    }

    /// Parsed raster backend settings.
    pub fn backend_env(&self) -> GeoResult<HashMap<String, String>> {
        parse_backend_settings(&self.backend_settings)
    }

    /// Static per-worker delay between reads: the endpoint's rate budget
    /// divided conservatively by the maximum worker count. Zero for
    /// unmetered local or network sources.
    pub fn seconds_between_reads(&self) -> Duration {
        let metered = self.after_image_path.starts_with(METERED_PREFIX)
            || self
                .before_image_path
                .as_deref()
                .map(|p| p.starts_with(METERED_PREFIX))
                .unwrap_or(false);
        if metered {
            Duration::from_secs_f64(1.0 / (METERED_ENDPOINT_QPS / MAX_WORKERS))
        } else {
            Duration::ZERO
        }
    }
}

/// Parse `var=value` backend settings into a map.
pub fn parse_backend_settings(settings: &[String]) -> GeoResult<HashMap<String, String>> {
    let mut env = HashMap::new();
    for setting in settings {
        let (var, value) = setting.split_once('=').ok_or_else(|| {
            GeoPatchError::Validation(format!(
                "each backend setting should have the form \"var=value\", got '{}'",
                setting
            ))
        })?;
        env.insert(var.to_string(), value.to_string());
    }
    Ok(env)
}
