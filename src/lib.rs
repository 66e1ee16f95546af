//! geopatch: Before/After Satellite Patch Extraction
//!
//! This library turns streams of geographic coordinates into paired
//! before/after satellite image patches, geometrically aligned,
//! quality-filtered, and packaged into fixed-schema training records
//! for disaster-damage classifiers.

pub mod config;
pub mod core;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::config::{ExecutionMode, GenerateExamplesConfig};
pub use crate::core::{
    BeforeSource, CoordinateProjector, ExampleExtractor, Extraction, LabelingImage,
    ResolutionNormalizer, TrainingRecord,
};
pub use crate::io::{PatchRead, PatchReader, RasterSource};
pub use crate::metrics::ExtractionMetrics;
pub use crate::pipeline::{generate_examples, RunSummary};
pub use crate::types::{
    Coordinate, GeoPatchError, GeoResult, PatchRole, RejectReason, RgbPatch, BLANK_THRESHOLD,
    MAX_DISPLACEMENT,
};
