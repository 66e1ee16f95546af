use crate::core::projection::CoordinateProjector;
use crate::core::resolution::ResolutionNormalizer;
use crate::metrics::LatencyStats;
use crate::types::{Coordinate, GeoPatchError, GeoResult, RgbPatch};
use gdal::raster::GdalDataType;
use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use image::imageops::FilterType;
use image::{ImageBuffer, Luma};
use ndarray::Array3;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Fill value for window pixels outside the raster footprint. Negative
/// so it stays distinguishable from valid zero-valued (blank) pixels
/// until the final clip to u8.
const BOUNDLESS_FILL: f32 = -1.0;

/// Bands read from every source, assumed to be RGB.
const RGB_BANDS: [usize; 3] = [1, 2, 3];

/// Outcome of a windowed patch read. Transient failures carry the
/// reason so the orchestrator can tag the rejection counter; they never
/// escape as errors.
#[derive(Debug)]
pub enum PatchRead {
    Patch(RgbPatch),
    /// Coordinate could not be reprojected into this raster's CRS
    ProjectionFailed,
    /// The raster backend reported an I/O fault for this window
    ReadFailed,
}

/// Read-only handle to a geospatial raster, opened once per worker.
#[derive(Debug)]
pub struct RasterSource {
    dataset: Dataset,
    srs: SpatialRef,
    geo_transform: [f64; 6],
    width: usize,
    height: usize,
}

impl RasterSource {
    /// Open a raster, applying backend `key=value` settings first.
    ///
    /// Validates the pixel-format contract up front: at least three
    /// bands, all with an integer data type. A float-typed source is a
    /// systemic format mismatch and aborts the run rather than being
    /// coerced per patch.
    pub fn open<P: AsRef<Path>>(
        path: P,
        backend_settings: &HashMap<String, String>,
    ) -> GeoResult<Self> {
        for (key, value) in backend_settings {
            gdal::config::set_config_option(key, value)?;
        }

        log::info!("Opening raster: {}", path.as_ref().display());
        let dataset = Dataset::open(path.as_ref())?;
        let srs = dataset.spatial_ref()?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();

        if dataset.raster_count() < 3 {
            return Err(GeoPatchError::PixelContract(format!(
                "expected at least 3 bands (RGB), got {}",
                dataset.raster_count()
            )));
        }
        for band_index in RGB_BANDS {
            let band = dataset.rasterband(band_index as usize)?;
            match band.band_type() {
                GdalDataType::UInt8
                | GdalDataType::UInt16
                | GdalDataType::Int16
                | GdalDataType::UInt32
                | GdalDataType::Int32 => {}
                other => {
                    return Err(GeoPatchError::PixelContract(format!(
                        "band {} has non-integer pixel type {:?}",
                        band_index, other
                    )))
                }
            }
        }

        log::debug!("Raster size: {}x{}, geotransform: {:?}", width, height, geo_transform);
        Ok(Self {
            dataset,
            srs,
            geo_transform,
            width,
            height,
        })
    }

    pub fn srs(&self) -> &SpatialRef {
        &self.srs
    }

    pub fn geo_transform(&self) -> [f64; 6] {
        self.geo_transform
    }

    /// Declared (x, y) pixel sizes from the geotransform.
    pub fn resolution(&self) -> (f64, f64) {
        (self.geo_transform[1].abs(), self.geo_transform[5].abs())
    }

    /// Boundless windowed read of the RGB bands at native resolution.
    ///
    /// The window may extend past the raster edges; pixels outside the
    /// footprint are sentinel-filled. Returns `None` when the backend
    /// reports a read fault.
    fn read_window(
        &self,
        row_off: i64,
        col_off: i64,
        window_size: usize,
    ) -> GeoResult<Option<Array3<f32>>> {
        let mut window = Array3::from_elem((window_size, window_size, 3), BOUNDLESS_FILL);

        let x0 = col_off.max(0);
        let y0 = row_off.max(0);
        let x1 = (col_off + window_size as i64).min(self.width as i64);
        let y1 = (row_off + window_size as i64).min(self.height as i64);
        if x1 <= x0 || y1 <= y0 {
            // Entirely outside the footprint; all sentinel
            return Ok(Some(window));
        }
        let (read_w, read_h) = ((x1 - x0) as usize, (y1 - y0) as usize);

        for (channel, band_index) in RGB_BANDS.into_iter().enumerate() {
            let band = match self.dataset.rasterband(band_index as usize) {
                Ok(band) => band,
                Err(e) => {
                    log::error!("Failed to access band {}: {}", band_index, e);
                    return Ok(None);
                }
            };
            let buffer = match band.read_as::<i32>(
                (x0 as isize, y0 as isize),
                (read_w, read_h),
                (read_w, read_h),
                None,
            ) {
                Ok(buffer) => buffer,
                Err(e) => {
                    log::error!("Raster read error in band {}: {}", band_index, e);
                    return Ok(None);
                }
            };

            for y in 0..read_h {
                for x in 0..read_w {
                    let value = buffer.data()[y * read_w + x];
                    if !(0..=255).contains(&value) {
                        return Err(GeoPatchError::PixelContract(format!(
                            "pixel value {} out of range, only 0-255 is supported",
                            value
                        )));
                    }
                    let wr = (y0 - row_off) as usize + y;
                    let wc = (x0 - col_off) as usize + x;
                    window[[wr, wc, channel]] = value as f32;
                }
            }
        }
        Ok(Some(window))
    }
}

/// Bounds-safe windowed patch reader delivering fixed-size RGB patches
/// at the target resolution.
pub struct PatchReader {
    source: RasterSource,
    projector: CoordinateProjector,
    scale_factor: f64,
    wait: Duration,
}

impl PatchReader {
    /// Build a reader for one raster. Resolution normalization and
    /// projector construction happen here once; their failures
    /// (mismatched x/y resolution, unsupported CRS) are fatal.
    pub fn new(source: RasterSource, target_resolution: f64, wait: Duration) -> GeoResult<Self> {
        let (res_x, res_y) = source.resolution();
        let normalized =
            ResolutionNormalizer::new(target_resolution).normalize(source.srs(), res_x, res_y)?;
        let projector = CoordinateProjector::new(source.srs(), source.geo_transform())?;
        log::info!(
            "Patch reader ready: native {:.4} m/pixel, scale factor {:.4}",
            normalized.meters_per_pixel,
            normalized.scale_factor
        );
        Ok(Self {
            source,
            projector,
            scale_factor: normalized.scale_factor,
            wait,
        })
    }

    pub fn projector(&self) -> &CoordinateProjector {
        &self.projector
    }

    /// Read a `patch_size` x `patch_size` RGB patch centered on the
    /// coordinate.
    ///
    /// The native read window is scaled so the patch covers the same
    /// ground extent at any source resolution, then Lanczos-resampled to
    /// the requested size. Read latency goes into `latency`; the
    /// configured post-read delay is applied afterwards to respect
    /// metered backends.
    pub fn read_patch(
        &self,
        coordinate: &Coordinate,
        patch_size: usize,
        latency: &mut LatencyStats,
    ) -> GeoResult<PatchRead> {
        let (row, col) = match self
            .projector
            .pixel_at(coordinate.longitude(), coordinate.latitude())
        {
            Some(pixel) => pixel,
            None => return Ok(PatchRead::ProjectionFailed),
        };
        let (row, col) = (row.floor() as i64, col.floor() as i64);

        // A target resolution much finer than the source can floor the
        // scaled window to zero pixels; always read at least one
        let window_size = (((patch_size as f64) * self.scale_factor) as usize).max(1);
        let half = (window_size / 2) as i64;

        let start = Instant::now();
        let window = self.source.read_window(row - half, col - half, window_size);
        latency.record(start.elapsed().as_secs_f64() * 1000.0);

        if !self.wait.is_zero() {
            std::thread::sleep(self.wait);
        }

        let window = match window? {
            Some(window) => window,
            None => return Ok(PatchRead::ReadFailed),
        };
        Ok(PatchRead::Patch(resample_to_patch(&window, patch_size)))
    }
}

/// Resample a native-resolution window to the delivered patch size and
/// convert to 8-bit.
///
/// Lanczos3 avoids aliasing under both up- and down-sampling. Sentinel
/// and any ringing below zero are clipped to 0, overshoot above 255 is
/// clamped, before the u8 conversion.
fn resample_to_patch(window: &Array3<f32>, patch_size: usize) -> RgbPatch {
    let (rows, cols, _) = window.dim();
    let mut patch = RgbPatch::zeros((patch_size, patch_size, 3));

    for channel in 0..3 {
        let raw: Vec<f32> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .map(|(r, c)| window[[r, c, channel]])
            .collect();
        let plane: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(cols as u32, rows as u32, raw)
                .unwrap_or_else(|| ImageBuffer::new(cols as u32, rows as u32));

        let resampled = if rows == patch_size && cols == patch_size {
            plane
        } else {
            image::imageops::resize(
                &plane,
                patch_size as u32,
                patch_size as u32,
                FilterType::Lanczos3,
            )
        };

        for r in 0..patch_size {
            for c in 0..patch_size {
                let value = resampled.get_pixel(c as u32, r as u32).0[0];
                patch[[r, c, channel]] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity_at_native_size() {
        let mut window = Array3::from_elem((4, 4, 3), 10.0f32);
        window[[1, 2, 0]] = 200.0;
        let patch = resample_to_patch(&window, 4);
        assert_eq!(patch.dim(), (4, 4, 3));
        assert_eq!(patch[[1, 2, 0]], 200);
        assert_eq!(patch[[0, 0, 1]], 10);
    }

    #[test]
    fn test_resample_clips_sentinel_to_zero() {
        let window = Array3::from_elem((4, 4, 3), BOUNDLESS_FILL);
        let patch = resample_to_patch(&window, 4);
        assert!(patch.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_resample_downscales_to_patch_size() {
        let window = Array3::from_elem((8, 8, 3), 100.0f32);
        let patch = resample_to_patch(&window, 4);
        assert_eq!(patch.dim(), (4, 4, 3));
        // Uniform input stays uniform under any kernel
        assert!(patch.iter().all(|&v| v == 100));
    }
}
