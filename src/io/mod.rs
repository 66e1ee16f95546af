//! Raster access, coordinate feeds, and output sinks

pub mod coordinates;
pub mod raster;
pub mod sink;

pub use coordinates::{parse_coordinate_line, read_coordinates_file, write_coordinates_file};
pub use raster::{PatchRead, PatchReader, RasterSource};
pub use sink::{ImageSink, LabelingImageDir, RecordSink, ShardedRecordWriter};
