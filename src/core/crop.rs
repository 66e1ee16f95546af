use crate::types::RgbPatch;
use ndarray::s;

/// Deterministic center crop of a patch to a square of `crop_size`.
///
/// Offsets are rows/2 - size/2 and cols/2 - size/2 with integer floor
/// division, matching how both the training records and the labeling
/// crops are taken from the same aligned pair.
pub fn center_crop(patch: &RgbPatch, crop_size: usize) -> RgbPatch {
    let (rows, cols, _) = patch.dim();
    let i = rows / 2 - crop_size / 2;
    let j = cols / 2 - crop_size / 2;
    patch
        .slice(s![i..i + crop_size, j..j + crop_size, ..])
        .to_owned()
}
