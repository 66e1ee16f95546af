use crate::types::{GrayPatch, RgbPatch};
use ndarray::{s, Array2};

/// Convert an RGB patch to single-channel intensity using the usual
/// luma weights.
pub fn to_grayscale(patch: &RgbPatch) -> GrayPatch {
    let (rows, cols, _) = patch.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        0.299 * patch[[r, c, 0]] as f32
            + 0.587 * patch[[r, c, 1]] as f32
            + 0.114 * patch[[r, c, 2]] as f32
    })
}

/// Aligns the after patch to the before patch.
///
/// The after patch must be larger than the before patch in both
/// dimensions so the search has room to move; the orchestrator reads it
/// with a MAX_DISPLACEMENT border on each side. Runs zero-normalized
/// cross-correlation of the before patch (template) over the after patch
/// (search area) and crops the after patch at the highest-scoring
/// location. The result always has the before patch's dimensions.
pub fn align_after_patch(before: &RgbPatch, after: &RgbPatch) -> RgbPatch {
    let (rows, cols, _) = before.dim();
    let (i, j) = match_template(&to_grayscale(after), &to_grayscale(before));
    after.slice(s![i..i + rows, j..j + cols, ..]).to_owned()
}

/// Find the (row, col) offset in `search` where `template` correlates
/// best, by zero-normalized cross-correlation.
fn match_template(search: &GrayPatch, template: &GrayPatch) -> (usize, usize) {
    let (t_rows, t_cols) = template.dim();
    let (s_rows, s_cols) = search.dim();
    debug_assert!(s_rows >= t_rows && s_cols >= t_cols);

    let n = (t_rows * t_cols) as f64;
    let t_mean = template.iter().map(|&v| v as f64).sum::<f64>() / n;
    let centered: Vec<f64> = template.iter().map(|&v| v as f64 - t_mean).collect();
    let t_norm_sq: f64 = centered.iter().map(|v| v * v).sum();

    let mut best_score = f64::NEG_INFINITY;
    let mut best = (0usize, 0usize);

    for i in 0..=(s_rows - t_rows) {
        for j in 0..=(s_cols - t_cols) {
            let mut w_sum = 0.0;
            let mut w_sq_sum = 0.0;
            let mut cross = 0.0;
            for (idx, (r, c)) in (0..t_rows)
                .flat_map(|r| (0..t_cols).map(move |c| (r, c)))
                .enumerate()
            {
                let w = search[[i + r, j + c]] as f64;
                w_sum += w;
                w_sq_sum += w * w;
                cross += centered[idx] * w;
            }
            // Sum of (W - mean(W))^2, expanded form
            let w_norm_sq = w_sq_sum - w_sum * w_sum / n;
            let denom = (t_norm_sq * w_norm_sq).sqrt();
            if denom < f64::EPSILON {
                continue;
            }
            let score = cross / denom;
            if score > best_score {
                best_score = score;
                best = (i, j);
            }
        }
    }
    log::debug!(
        "Best alignment offset ({}, {}) with score {:.4}",
        best.0,
        best.1,
        best_score
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_DISPLACEMENT;
    use ndarray::Array3;

    /// Deterministic patch with enough texture to correlate against
    fn textured_patch(rows: usize, cols: usize) -> RgbPatch {
        Array3::from_shape_fn((rows, cols, 3), |(r, c, ch)| {
            ((r * 31 + c * 17 + ch * 7 + (r * c) % 13) % 251) as u8 + 1
        })
    }

    #[test]
    fn test_output_size_matches_before_patch() {
        let n = 16;
        let before = textured_patch(n, n);
        let after = textured_patch(n + 2 * MAX_DISPLACEMENT, n + 2 * MAX_DISPLACEMENT);
        let aligned = align_after_patch(&before, &after);
        assert_eq!(aligned.dim(), (n, n, 3));
    }

    #[test]
    fn test_finds_known_displacement() {
        let n = 12;
        let border = 8;
        let big = textured_patch(n + 2 * border, n + 2 * border);

        // Template cut at a known offset must be located exactly there
        let (di, dj) = (border + 3, border - 2);
        let before = big
            .slice(ndarray::s![di..di + n, dj..dj + n, ..])
            .to_owned();
        let aligned = align_after_patch(&before, &big);
        assert_eq!(aligned, before);
    }

    #[test]
    fn test_same_size_degenerates_to_identity() {
        let n = 10;
        let before = textured_patch(n, n);
        let aligned = align_after_patch(&before, &before.clone());
        assert_eq!(aligned, before);
    }

    #[test]
    fn test_grayscale_weights() {
        let mut patch = Array3::<u8>::zeros((1, 1, 3));
        patch[[0, 0, 0]] = 100;
        let gray = to_grayscale(&patch);
        assert!((gray[[0, 0]] - 29.9).abs() < 1e-4);
    }
}
