use crate::types::{GeoPatchError, GeoResult};
use gdal::spatial_ref::SpatialRef;

/// Relative tolerance when comparing x and y pixel sizes
const RESOLUTION_RTOL: f64 = 1e-4;

/// Approximate meters per degree of longitude/latitude
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Native resolution of a raster normalized against a desired target
/// resolution.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedResolution {
    /// Native pixel size in meters
    pub meters_per_pixel: f64,
    /// Window scaling needed to deliver patches at the target resolution:
    /// target / native
    pub scale_factor: f64,
}

/// Derives a raster's resolution in meters and the read-window scale
/// factor for a desired output resolution.
pub struct ResolutionNormalizer {
    target_resolution: f64,
}

impl ResolutionNormalizer {
    pub fn new(target_resolution: f64) -> Self {
        Self { target_resolution }
    }

    /// Normalize a raster's declared pixel sizes against the target
    /// resolution.
    ///
    /// Fails with `ResolutionMismatch` when x and y pixel sizes differ
    /// beyond tolerance, and with `UnsupportedCrs` when the CRS has no
    /// usable linear unit. Both are structural faults of the input raster,
    /// not per-coordinate conditions.
    pub fn normalize(
        &self,
        srs: &SpatialRef,
        res_x: f64,
        res_y: f64,
    ) -> GeoResult<NormalizedResolution> {
        if (res_x - res_y).abs() > RESOLUTION_RTOL * res_y.abs() {
            return Err(GeoPatchError::ResolutionMismatch { x: res_x, y: res_y });
        }

        let meter_factor = if srs.is_geographic() {
            match srs.auth_code() {
                // Resolution is expressed in degrees lon/lat. Convert to
                // meters with the approximation 1 degree ~ 111 km.
                Ok(4326) => METERS_PER_DEGREE,
                Ok(code) => {
                    return Err(GeoPatchError::UnsupportedCrs(format!(
                        "geographic CRS EPSG:{} has no linear units factor",
                        code
                    )))
                }
                Err(e) => {
                    return Err(GeoPatchError::UnsupportedCrs(format!(
                        "no linear units factor or EPSG code: {}",
                        e
                    )))
                }
            }
        } else {
            srs.linear_units()
        };

        let meters_per_pixel = res_x * meter_factor;
        log::debug!(
            "Native resolution {:.4} m/pixel, target {:.4} m/pixel",
            meters_per_pixel,
            self.target_resolution
        );

        Ok(NormalizedResolution {
            meters_per_pixel,
            scale_factor: self.target_resolution / meters_per_pixel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resolution_within_tolerance() {
        // Projected CRS in meters, x and y differing by 1e-7
        let srs = SpatialRef::from_epsg(32633).unwrap();
        let normalizer = ResolutionNormalizer::new(0.5);
        let norm = normalizer.normalize(&srs, 0.5, 0.5000001).unwrap();
        assert_relative_eq!(norm.meters_per_pixel, 0.5, max_relative = 1e-6);
        assert_relative_eq!(norm.scale_factor, 1.0, max_relative = 1e-6);
    }

    #[test]
    fn test_resolution_mismatch_is_fatal() {
        let srs = SpatialRef::from_epsg(32633).unwrap();
        let normalizer = ResolutionNormalizer::new(0.5);
        let err = normalizer.normalize(&srs, 0.5, 0.6).unwrap_err();
        assert!(matches!(err, GeoPatchError::ResolutionMismatch { .. }));
    }

    #[test]
    fn test_geographic_degrees_to_meters() {
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let normalizer = ResolutionNormalizer::new(0.5);
        let norm = normalizer.normalize(&srs, 1e-5, 1e-5).unwrap();
        assert_relative_eq!(norm.meters_per_pixel, 1.11, max_relative = 1e-6);
        assert_relative_eq!(norm.scale_factor, 0.5 / 1.11, max_relative = 1e-6);
    }

    #[test]
    fn test_scale_factor_downsamples_finer_sources() {
        let srs = SpatialRef::from_epsg(32633).unwrap();
        let normalizer = ResolutionNormalizer::new(1.0);
        let norm = normalizer.normalize(&srs, 0.25, 0.25).unwrap();
        // 1 m target over 0.25 m native: read a 4x larger window
        assert_relative_eq!(norm.scale_factor, 4.0, max_relative = 1e-9);
    }
}
