use crate::types::{RgbPatch, BLANK_THRESHOLD};

/// Fraction of pixels in a patch that are blank.
///
/// A pixel is blank when every channel is exactly zero, which is how the
/// raster backends fill areas outside the image footprint. Computed by
/// taking the per-pixel maximum across channels and counting zeros. An
/// empty patch has a blank fraction of 0.
pub fn blank_fraction(patch: &RgbPatch) -> f64 {
    let (rows, cols, _) = patch.dim();
    let total = rows * cols;
    if total == 0 {
        return 0.0;
    }

    let mut blank = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            let max = patch[[r, c, 0]].max(patch[[r, c, 1]]).max(patch[[r, c, 2]]);
            if max == 0 {
                blank += 1;
            }
        }
    }
    blank as f64 / total as f64
}

/// Rejects patches whose blank-pixel fraction exceeds the discard
/// threshold.
pub fn is_mostly_blank(patch: &RgbPatch) -> bool {
    blank_fraction(patch) > BLANK_THRESHOLD
}
