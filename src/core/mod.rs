//! Core patch extraction modules

pub mod align;
pub mod blank;
pub mod crop;
pub mod example;
pub mod extract;
pub mod projection;
pub mod resolution;

// Re-export main types
pub use align::{align_after_patch, to_grayscale};
pub use blank::{blank_fraction, is_mostly_blank};
pub use crop::center_crop;
pub use example::{encode_coordinates, LabelingImage, TrainingRecord};
pub use extract::{BeforeSource, ExampleExtractor, Extraction};
pub use projection::CoordinateProjector;
pub use resolution::{NormalizedResolution, ResolutionNormalizer};
