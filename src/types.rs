use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Square RGB image patch, shaped (rows, cols, 3), 8-bit channels
pub type RgbPatch = Array3<u8>;

/// Single-channel intensity image used during alignment
pub type GrayPatch = Array2<f32>;

/// Maximum pixel displacement the aligner may correct in each axis
pub const MAX_DISPLACEMENT: usize = 30;

/// Fraction of blank pixels above which a patch is discarded
pub const BLANK_THRESHOLD: f64 = 0.25;

/// Role a patch plays in the extraction pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchRole {
    Before,
    After,
    LabelingCrop,
}

impl std::fmt::Display for PatchRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchRole::Before => write!(f, "before"),
            PatchRole::After => write!(f, "after"),
            PatchRole::LabelingCrop => write!(f, "labeling-crop"),
        }
    }
}

/// Geographic position with an optional training label.
///
/// Longitude and latitude are WGS84 degrees. The label is a float class
/// index; -1.0 marks an unlabeled coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
    label: f64,
}

impl Coordinate {
    pub const UNLABELED: f64 = -1.0;

    pub fn new(longitude: f64, latitude: f64, label: f64) -> GeoResult<Self> {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPatchError::Validation(format!(
                "Invalid longitude, got {}",
                longitude
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPatchError::Validation(format!(
                "Invalid latitude, got {}",
                latitude
            )));
        }
        Ok(Self {
            longitude,
            latitude,
            label,
        })
    }

    pub fn unlabeled(longitude: f64, latitude: f64) -> GeoResult<Self> {
        Self::new(longitude, latitude, Self::UNLABELED)
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn label(&self) -> f64 {
        self.label
    }
}

/// Why a coordinate was dropped instead of producing a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Before-image read returned no data
    BeforeRead,
    /// Before patch exceeded the blank-pixel threshold
    BeforeBlank,
    /// After-image read returned no data
    AfterRead,
    /// After patch exceeded the blank-pixel threshold
    AfterBlank,
    /// Coordinate could not be reprojected into the raster CRS
    Projection,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::BeforeRead => write!(f, "before_read_failed"),
            RejectReason::BeforeBlank => write!(f, "before_patch_blank"),
            RejectReason::AfterRead => write!(f, "after_read_failed"),
            RejectReason::AfterBlank => write!(f, "after_patch_blank"),
            RejectReason::Projection => write!(f, "projection_failed"),
        }
    }
}

/// Error types for patch extraction
#[derive(Debug, thiserror::Error)]
pub enum GeoPatchError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("expecting identical x and y resolutions, got {x}, {y}")]
    ResolutionMismatch { x: f64, y: f64 },

    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("pixel data violates 8-bit RGB contract: {0}")]
    PixelContract(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for patch extraction operations
pub type GeoResult<T> = Result<T, GeoPatchError>;
