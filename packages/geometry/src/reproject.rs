//! Coordinate reprojection between the reference systems parcel and
//! activity layers are published in.
//!
//! Transforms are delegated to [`proj4rs`], with projection definitions
//! looked up by EPSG code. A CRS without an EPSG code, or with one the
//! registry does not know, is reported as
//! [`GeometryError::UnsupportedTransform`].

use geo::{Coord, Geometry, MapCoords as _};
use parcel_fusion_parcel_models::Crs;
use proj4rs::proj::Proj;

use crate::GeometryError;

/// Legacy Google code for Web Mercator.
const LEGACY_WEB_MERCATOR: u32 = 900_913;
const WEB_MERCATOR: u16 = 3857;

/// Transforms geometries between coordinate reference systems.
pub trait Reprojector: Send + Sync {
    /// Reprojects `geometry` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// * If no transform is known between the two systems
    /// * If a coordinate is outside the domain of a projection
    fn reproject(
        &self,
        geometry: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Geometry<f64>, GeometryError>;
}

/// Reprojector backed by the EPSG registry shipped with `proj4rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpsgReprojector;

impl EpsgReprojector {
    fn projection(crs: &Crs) -> Option<Proj> {
        let code = match crs.epsg_code()? {
            LEGACY_WEB_MERCATOR => WEB_MERCATOR,
            code => u16::try_from(code).ok()?,
        };
        Proj::from_epsg_code(code)
            .inspect_err(|e| log::debug!("No projection for {crs}: {e}"))
            .ok()
    }
}

impl Reprojector for EpsgReprojector {
    fn reproject(
        &self,
        geometry: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Geometry<f64>, GeometryError> {
        if from.same_as(to) {
            return Ok(geometry.clone());
        }

        let unsupported = || GeometryError::UnsupportedTransform {
            from: from.to_string(),
            to: to.to_string(),
        };
        let source = Self::projection(from).ok_or_else(unsupported)?;
        let target = Self::projection(to).ok_or_else(unsupported)?;

        geometry.try_map_coords(|coord| transform_coord(&source, &target, coord))
    }
}

/// Geographic systems take and return degrees; `proj4rs` works in radians.
fn transform_coord(
    source: &Proj,
    target: &Proj,
    coord: Coord<f64>,
) -> Result<Coord<f64>, GeometryError> {
    if !coord.x.is_finite() || !coord.y.is_finite() {
        return Err(GeometryError::InvalidCoordinate {
            x: coord.x,
            y: coord.y,
            reason: "non-finite coordinate",
        });
    }

    let mut point = if source.is_latlong() {
        if coord.y.abs() > 90.0 {
            return Err(GeometryError::InvalidCoordinate {
                x: coord.x,
                y: coord.y,
                reason: "outside geographic domain",
            });
        }
        (coord.x.to_radians(), coord.y.to_radians(), 0.0)
    } else {
        (coord.x, coord.y, 0.0)
    };

    proj4rs::transform::transform(source, target, &mut point)
        .map_err(|e| GeometryError::Projection(e.to_string()))?;

    let (x, y) = if target.is_latlong() {
        (point.0.to_degrees(), point.1.to_degrees())
    } else {
        (point.0, point.1)
    };
    if !x.is_finite() || !y.is_finite() {
        return Err(GeometryError::InvalidCoordinate {
            x: coord.x,
            y: coord.y,
            reason: "projected to a non-finite coordinate",
        });
    }

    Ok(Coord { x, y })
}

#[cfg(test)]
mod tests {
    use geo::{Point, coord, polygon};

    use super::*;

    fn close(a: Coord<f64>, b: Coord<f64>, tolerance: f64) -> bool {
        (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance
    }

    fn point(geometry: &Geometry<f64>) -> Coord<f64> {
        match geometry {
            Geometry::Point(point) => point.0,
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn albers_origin_maps_to_zero() {
        let out = EpsgReprojector
            .reproject(
                &Geometry::Point(Point::new(-96.0, 23.0)),
                &Crs::new("EPSG:4269"),
                &Crs::conus_albers(),
            )
            .unwrap();
        assert!(close(point(&out), coord! { x: 0.0, y: 0.0 }, 1e-3));
    }

    #[test]
    fn utm_central_meridian_maps_to_false_easting() {
        let out = EpsgReprojector
            .reproject(
                &Geometry::Point(Point::new(-111.0, 40.0)),
                &Crs::new("EPSG:4269"),
                &Crs::new("EPSG:26912"),
            )
            .unwrap();
        let projected = point(&out);
        assert!((projected.x - 500_000.0).abs() < 1e-3, "{projected:?}");
        assert!(
            (4_420_000.0..4_440_000.0).contains(&projected.y),
            "{projected:?}"
        );
    }

    #[test]
    fn same_crs_is_identity() {
        let geometry = Geometry::Point(Point::new(-100.0, 40.0));
        let out = EpsgReprojector
            .reproject(
                &geometry,
                &Crs::wgs84(),
                &Crs::new("urn:ogc:def:crs:OGC:1.3:CRS84"),
            )
            .unwrap();
        assert_eq!(out, geometry);
    }

    #[test]
    fn polygon_round_trips_through_projected_systems() {
        let geometry = Geometry::Polygon(polygon![
            (x: -112.0, y: 40.0),
            (x: -111.0, y: 40.0),
            (x: -111.0, y: 41.0),
            (x: -112.0, y: 40.0),
        ]);
        let utm = EpsgReprojector
            .reproject(&geometry, &Crs::new("EPSG:4269"), &Crs::new("EPSG:26912"))
            .unwrap();
        let albers = EpsgReprojector
            .reproject(&utm, &Crs::new("EPSG:26912"), &Crs::conus_albers())
            .unwrap();
        let back = EpsgReprojector
            .reproject(&albers, &Crs::conus_albers(), &Crs::new("EPSG:4269"))
            .unwrap();

        let (Geometry::Polygon(original), Geometry::Polygon(round_tripped)) = (&geometry, &back)
        else {
            panic!("expected polygons");
        };
        for (a, b) in original.exterior().0.iter().zip(&round_tripped.exterior().0) {
            assert!(close(*a, *b, 1e-6), "{a:?} -> {b:?}");
        }
    }

    #[test]
    fn crs_without_epsg_code_is_rejected() {
        let geometry = Geometry::Point(Point::new(0.0, 0.0));
        let result = EpsgReprojector.reproject(&geometry, &Crs::new("local grid"), &Crs::wgs84());
        assert!(matches!(
            result,
            Err(GeometryError::UnsupportedTransform { .. })
        ));
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let geometry = Geometry::Point(Point::new(0.0, 95.0));
        let result = EpsgReprojector.reproject(&geometry, &Crs::wgs84(), &Crs::conus_albers());
        assert!(matches!(
            result,
            Err(GeometryError::InvalidCoordinate { .. })
        ));
    }
}
