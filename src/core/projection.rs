use crate::types::{GeoPatchError, GeoResult};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};

/// Maps WGS84 coordinates to fractional pixel positions in a raster grid.
///
/// Both sides of the geodetic transform are forced into traditional GIS
/// axis order, so callers always pass (longitude, latitude) regardless of
/// the raster CRS's native axis convention. GDAL >= 3 would otherwise
/// expect (lat, lon) for some authorities and silently shift every patch.
pub struct CoordinateProjector {
    to_raster: CoordTransform,
    to_wgs84: CoordTransform,
    geo_transform: [f64; 6],
    inv_geo_transform: [f64; 6],
}

impl CoordinateProjector {
    pub fn new(raster_srs: &SpatialRef, geo_transform: [f64; 6]) -> GeoResult<Self> {
        let mut wgs84 = SpatialRef::from_epsg(4326)?;
        wgs84.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let mut target = raster_srs.clone();
        target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let to_raster = CoordTransform::new(&wgs84, &target)?;
        let to_wgs84 = CoordTransform::new(&target, &wgs84)?;

        let inv_geo_transform = invert_geo_transform(&geo_transform)?;
        Ok(Self {
            to_raster,
            to_wgs84,
            geo_transform,
            inv_geo_transform,
        })
    }

    /// Project a WGS84 coordinate to a fractional (row, col) pixel position.
    ///
    /// Returns `None` when the geodetic transform fails, e.g. for a
    /// coordinate outside the projection domain. The caller treats that as
    /// a per-coordinate rejection, not a fatal condition.
    pub fn pixel_at(&self, longitude: f64, latitude: f64) -> Option<(f64, f64)> {
        let mut xs = [longitude];
        let mut ys = [latitude];
        let mut zs = [0.0_f64];
        if let Err(e) = self.to_raster.transform_coords(&mut xs, &mut ys, &mut zs) {
            log::debug!(
                "Transform failed for ({:.6}, {:.6}): {}",
                longitude,
                latitude,
                e
            );
            return None;
        }
        if !xs[0].is_finite() || !ys[0].is_finite() {
            return None;
        }
        Some(self.index(xs[0], ys[0]))
    }

    /// Inverse of `pixel_at`: recover the WGS84 (longitude, latitude) at a
    /// fractional pixel position.
    pub fn coordinate_at(&self, row: f64, col: f64) -> GeoResult<(f64, f64)> {
        let gt = &self.geo_transform;
        let x = gt[0] + col * gt[1] + row * gt[2];
        let y = gt[3] + col * gt[4] + row * gt[5];

        let mut xs = [x];
        let mut ys = [y];
        let mut zs = [0.0_f64];
        self.to_wgs84.transform_coords(&mut xs, &mut ys, &mut zs)?;
        Ok((xs[0], ys[0]))
    }

    /// Convert projected (x, y) to fractional (row, col) via the inverse
    /// geotransform.
    fn index(&self, x: f64, y: f64) -> (f64, f64) {
        let gt = &self.geo_transform;
        let inv = &self.inv_geo_transform;
        let dx = x - gt[0];
        let dy = y - gt[3];
        let col = inv[0] * dx + inv[1] * dy;
        let row = inv[2] * dx + inv[3] * dy;
        (row, col)
    }
}

/// Invert the 2x2 linear part of an affine geotransform.
///
/// Returns [a, b, c, d] such that col = a*dx + b*dy, row = c*dx + d*dy.
fn invert_geo_transform(gt: &[f64; 6]) -> GeoResult<[f64; 6]> {
    let det = gt[1] * gt[5] - gt[2] * gt[4];
    if det.abs() < f64::EPSILON {
        return Err(GeoPatchError::Validation(format!(
            "Degenerate geotransform, determinant {}",
            det
        )));
    }
    Ok([
        gt[5] / det,
        -gt[2] / det,
        -gt[4] / det,
        gt[1] / det,
        0.0,
        0.0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wgs84_projector() -> CoordinateProjector {
        // 0.001 degree pixels, top-left corner at (30.0E, 10.0N)
        let srs = SpatialRef::from_epsg(4326).unwrap();
        CoordinateProjector::new(&srs, [30.0, 0.001, 0.0, 10.0, 0.0, -0.001]).unwrap()
    }

    #[test]
    fn test_pixel_at_center() {
        let projector = wgs84_projector();
        let (row, col) = projector.pixel_at(30.05, 9.95).unwrap();
        assert_relative_eq!(row, 50.0, max_relative = 1e-6);
        assert_relative_eq!(col, 50.0, max_relative = 1e-6);
    }

    #[test]
    fn test_round_trip_within_half_pixel() {
        let projector = wgs84_projector();
        let (lon, lat) = (30.0731, 9.9212);
        let (row, col) = projector.pixel_at(lon, lat).unwrap();
        let (lon2, lat2) = projector.coordinate_at(row, col).unwrap();
        // Half a pixel is 0.0005 degrees in this grid
        assert!((lon2 - lon).abs() < 0.0005);
        assert!((lat2 - lat).abs() < 0.0005);
    }

    #[test]
    fn test_degenerate_geotransform_rejected() {
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let result = CoordinateProjector::new(&srs, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(result.is_err());
    }
}
