use crate::core::align::align_after_patch;
use crate::core::blank::is_mostly_blank;
use crate::core::crop::center_crop;
use crate::core::example::{LabelingImage, TrainingRecord};
use crate::io::raster::{PatchRead, PatchReader};
use crate::metrics::ExtractionMetrics;
use crate::types::{Coordinate, GeoResult, PatchRole, RejectReason, RgbPatch, MAX_DISPLACEMENT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Where before-disaster pixels come from, fixed at construction.
///
/// With no before image configured, every example gets a zero-filled
/// placeholder and the after patch is read directly at its final size,
/// skipping alignment entirely.
pub enum BeforeSource {
    Raster(PatchReader),
    Placeholder,
}

/// Terminal outcome for one coordinate.
#[derive(Debug)]
pub enum Extraction {
    Accepted {
        record: TrainingRecord,
        labeling_image: Option<LabelingImage>,
    },
    Rejected(RejectReason),
}

/// Per-worker extraction state machine.
///
/// Holds the raster handles opened once at worker startup and exposes a
/// single per-coordinate operation. Processing is sequential and each
/// coordinate is atomic: a rejection at any stage discards all partial
/// state and only bumps a counter.
pub struct ExampleExtractor {
    before: BeforeSource,
    after: PatchReader,
    example_patch_size: usize,
    alignment_patch_size: usize,
    labeling_patch_size: usize,
    labeling_sample_rate: f64,
    rng: StdRng,
    metrics: ExtractionMetrics,
}

impl ExampleExtractor {
    pub fn new(
        before: BeforeSource,
        after: PatchReader,
        example_patch_size: usize,
        alignment_patch_size: usize,
        labeling_patch_size: usize,
        labeling_sample_rate: f64,
    ) -> Self {
        Self {
            before,
            after,
            example_patch_size,
            alignment_patch_size,
            labeling_patch_size,
            labeling_sample_rate,
            rng: StdRng::from_entropy(),
            metrics: ExtractionMetrics::new(),
        }
    }

    /// Fix the labeling-image sampling sequence, for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn metrics(&self) -> &ExtractionMetrics {
        &self.metrics
    }

    /// Extract one coordinate into a training record, a labeling image
    /// for a sampled subset, or a reason-tagged rejection.
    ///
    /// Only a broken pixel-format contract escapes as an error; every
    /// transient condition is absorbed into a `Rejected` outcome.
    pub fn process(&mut self, coordinate: &Coordinate) -> GeoResult<Extraction> {
        let (before_patch, after_patch) = match &self.before {
            BeforeSource::Placeholder => {
                let size = self.example_patch_size.max(self.labeling_patch_size);
                let before = RgbPatch::zeros((size, size, 3));
                let after = match self.after.read_patch(
                    coordinate,
                    size,
                    &mut self.metrics.raster_read_latency,
                )? {
                    PatchRead::Patch(patch) => patch,
                    PatchRead::ProjectionFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::Projection))
                    }
                    PatchRead::ReadFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::AfterRead))
                    }
                };
                (before, after)
            }
            BeforeSource::Raster(reader) => {
                let before = match reader.read_patch(
                    coordinate,
                    self.alignment_patch_size,
                    &mut self.metrics.raster_read_latency,
                )? {
                    PatchRead::Patch(patch) => patch,
                    PatchRead::ProjectionFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::Projection))
                    }
                    PatchRead::ReadFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::BeforeRead))
                    }
                };
                if is_mostly_blank(&before) {
                    // No point reading the after patch for a blank site
                    log::debug!("{} patch mostly blank, skipping after read", PatchRole::Before);
                    return Ok(reject(&mut self.metrics, RejectReason::BeforeBlank));
                }

                // Border of MAX_DISPLACEMENT pixels on each side gives the
                // alignment up to that much movement per axis
                let after_size = self.alignment_patch_size + 2 * MAX_DISPLACEMENT;
                let after = match self.after.read_patch(
                    coordinate,
                    after_size,
                    &mut self.metrics.raster_read_latency,
                )? {
                    PatchRead::Patch(patch) => patch,
                    PatchRead::ProjectionFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::Projection))
                    }
                    PatchRead::ReadFailed => {
                        return Ok(reject(&mut self.metrics, RejectReason::AfterRead))
                    }
                };
                let aligned = align_after_patch(&before, &after);
                (before, aligned)
            }
        };

        if is_mostly_blank(&after_patch) {
            log::debug!("{} patch mostly blank", PatchRole::After);
            return Ok(reject(&mut self.metrics, RejectReason::AfterBlank));
        }

        let record = TrainingRecord::build(
            &center_crop(&before_patch, self.example_patch_size),
            &center_crop(&after_patch, self.example_patch_size),
            coordinate,
        )?;

        // One independent draw per accepted coordinate
        let labeling_image = if self.rng.gen::<f64>() < self.labeling_sample_rate {
            log::debug!("Coordinate sampled for a {} pair", PatchRole::LabelingCrop);
            Some(LabelingImage::build(
                &center_crop(&before_patch, self.labeling_patch_size),
                &center_crop(&after_patch, self.labeling_patch_size),
                coordinate,
            )?)
        } else {
            None
        };

        self.metrics.record_accepted();
        Ok(Extraction::Accepted {
            record,
            labeling_image,
        })
    }
}

fn reject(metrics: &mut ExtractionMetrics, reason: RejectReason) -> Extraction {
    log::debug!("Coordinate rejected: {}", reason);
    metrics.record_rejected(reason);
    Extraction::Rejected(reason)
}
