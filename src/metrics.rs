use crate::types::RejectReason;

/// Running distribution of raster read latencies, in milliseconds.
#[derive(Debug, Default, Clone)]
pub struct LatencyStats {
    pub count: u64,
    pub sum_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn record(&mut self, elapsed_ms: f64) {
        if self.count == 0 {
            self.min_ms = elapsed_ms;
            self.max_ms = elapsed_ms;
        } else {
            self.min_ms = self.min_ms.min(elapsed_ms);
            self.max_ms = self.max_ms.max(elapsed_ms);
        }
        self.count += 1;
        self.sum_ms += elapsed_ms;
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms / self.count as f64
        }
    }
}

/// Named counters for one worker's extraction run.
///
/// Every rejection increments exactly one reason counter plus the
/// rejected total, so accepted + rejected always equals the number of
/// coordinates processed.
#[derive(Debug, Default, Clone)]
pub struct ExtractionMetrics {
    pub generated_examples: u64,
    pub rejected_examples: u64,
    pub before_patch_blank: u64,
    pub after_patch_blank: u64,
    pub read_errors: u64,
    pub projection_errors: u64,
    pub raster_read_latency: LatencyStats,
}

impl ExtractionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&mut self) {
        self.generated_examples += 1;
    }

    pub fn record_rejected(&mut self, reason: RejectReason) {
        self.rejected_examples += 1;
        match reason {
            RejectReason::BeforeBlank => self.before_patch_blank += 1,
            RejectReason::AfterBlank => self.after_patch_blank += 1,
            RejectReason::BeforeRead | RejectReason::AfterRead => self.read_errors += 1,
            RejectReason::Projection => self.projection_errors += 1,
        }
    }

    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        log::info!(
            "Extraction finished: {} examples generated, {} rejected \
             (before blank: {}, after blank: {}, read errors: {}, projection errors: {})",
            self.generated_examples,
            self.rejected_examples,
            self.before_patch_blank,
            self.after_patch_blank,
            self.read_errors,
            self.projection_errors,
        );
        if self.raster_read_latency.count > 0 {
            log::info!(
                "Raster reads: {} in {:.1} ms total (mean {:.1}, min {:.1}, max {:.1})",
                self.raster_read_latency.count,
                self.raster_read_latency.sum_ms,
                self.raster_read_latency.mean_ms(),
                self.raster_read_latency.min_ms,
                self.raster_read_latency.max_ms,
            );
        }
    }
}
