use crate::config::GenerateExamplesConfig;
use crate::core::extract::{BeforeSource, ExampleExtractor, Extraction};
use crate::io::raster::{PatchReader, RasterSource};
use crate::io::sink::{ImageSink, LabelingImageDir, RecordSink, ShardedRecordWriter};
use crate::metrics::ExtractionMetrics;
use crate::types::{Coordinate, GeoResult};

/// Record file suffix used by the downstream training reader
const RECORD_SUFFIX: &str = ".tfrecord";

/// Metrics of the unlabeled and labeled passes of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub unlabeled: Option<ExtractionMetrics>,
    pub labeled: Option<ExtractionMetrics>,
}

/// Run example generation sequentially in this process.
///
/// Unlabeled coordinates get labeling images sampled at
/// num_labeling_images / n; labeled coordinates never do. Distributed
/// fan-out is an external concern; this is the per-worker loop each
/// work item runs through.
pub fn generate_examples(
    config: &GenerateExamplesConfig,
    unlabeled_coordinates: &[Coordinate],
    labeled_coordinates: &[Coordinate],
) -> GeoResult<RunSummary> {
    config.validate()?;

    let mut summary = RunSummary::default();

    if !unlabeled_coordinates.is_empty() {
        let sample_rate = if config.num_labeling_images > 0 {
            config.num_labeling_images as f64 / unlabeled_coordinates.len() as f64
        } else {
            0.0
        };
        let mut extractor = build_extractor(config, sample_rate)?;

        let prefix = config.output_dir.join("examples/unlabeled/unlabeled");
        let mut records =
            ShardedRecordWriter::create(&prefix, RECORD_SUFFIX, config.num_output_shards)?;
        let mut labeling_images = if config.num_labeling_images > 0 {
            Some(LabelingImageDir::create(
                config.output_dir.join("examples/labeling_images"),
            )?)
        } else {
            None
        };

        log::info!(
            "Processing {} unlabeled coordinates (labeling sample rate {:.4})",
            unlabeled_coordinates.len(),
            sample_rate
        );
        for coordinate in unlabeled_coordinates {
            if let Extraction::Accepted {
                record,
                labeling_image,
            } = extractor.process(coordinate)?
            {
                records.write(&record)?;
                if let (Some(sink), Some(image)) = (labeling_images.as_mut(), labeling_image) {
                    sink.write(&image)?;
                }
            }
        }
        records.finish()?;
        extractor.metrics().log_summary();
        summary.unlabeled = Some(extractor.metrics().clone());
    }

    if !labeled_coordinates.is_empty() {
        let mut extractor = build_extractor(config, 0.0)?;

        let prefix = config.output_dir.join("examples/labeled/labeled");
        let mut records =
            ShardedRecordWriter::create(&prefix, RECORD_SUFFIX, config.num_output_shards)?;

        log::info!(
            "Processing {} labeled coordinates",
            labeled_coordinates.len()
        );
        for coordinate in labeled_coordinates {
            if let Extraction::Accepted { record, .. } = extractor.process(coordinate)? {
                records.write(&record)?;
            }
        }
        records.finish()?;
        extractor.metrics().log_summary();
        summary.labeled = Some(extractor.metrics().clone());
    }

    Ok(summary)
}

/// Open the raster handles once and assemble the per-worker extractor.
fn build_extractor(
    config: &GenerateExamplesConfig,
    labeling_sample_rate: f64,
) -> GeoResult<ExampleExtractor> {
    let backend_env = config.backend_env()?;
    let wait = config.seconds_between_reads();

    let after_source = RasterSource::open(&config.after_image_path, &backend_env)?;
    let after = PatchReader::new(after_source, config.resolution, wait)?;

    let before = match &config.before_image_path {
        Some(path) => {
            let source = RasterSource::open(path, &backend_env)?;
            BeforeSource::Raster(PatchReader::new(source, config.resolution, wait)?)
        }
        None => BeforeSource::Placeholder,
    };

    Ok(ExampleExtractor::new(
        before,
        after,
        config.example_patch_size,
        config.alignment_patch_size,
        config.labeling_patch_size,
        labeling_sample_rate,
    ))
}
