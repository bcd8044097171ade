//! Robust planar distance between geometries.

use geo::dimensions::HasDimensions as _;
use geo::{Distance as _, Euclidean, Geometry};

use crate::{GeometryError, boundary, envelope};

/// Planar distance between two geometries, rejecting empty inputs and
/// non-finite results.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] for empty inputs and
/// [`GeometryError::NonFiniteDistance`] when the result is NaN or infinite.
pub fn planar_distance(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64, GeometryError> {
    if a.is_empty() || b.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    let distance = Euclidean.distance(a, b);
    if distance.is_finite() {
        Ok(distance)
    } else {
        Err(GeometryError::NonFiniteDistance)
    }
}

/// Minimum of three distance approximations between `a` and `b`:
/// envelope to envelope, boundary to boundary, and `a`'s boundary to `b`'s
/// envelope.
///
/// Approximations that fail (empty boundary, non-finite result) are
/// skipped. The envelope/envelope term makes the result a lower bound for
/// the boundary terms, so a parcel sitting inside an activity's bounding
/// box reads as distance zero.
///
/// # Errors
///
/// Returns [`GeometryError::NoDistanceComputable`] when every approximation
/// fails.
pub fn robust_distance(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64, GeometryError> {
    let envelopes = || planar_distance(&envelope(a)?, &envelope(b)?);
    let boundaries = || planar_distance(&boundary(a)?, &boundary(b)?);
    let mixed = || planar_distance(&boundary(a)?, &envelope(b)?);

    let attempts: [(&str, &dyn Fn() -> Result<f64, GeometryError>); 3] = [
        ("envelope/envelope", &envelopes),
        ("boundary/boundary", &boundaries),
        ("boundary/envelope", &mixed),
    ];

    let mut best: Option<f64> = None;
    for (label, attempt) in attempts {
        match attempt() {
            Ok(distance) => best = Some(best.map_or(distance, |current| current.min(distance))),
            Err(e) => log::trace!("Skipping {label} distance: {e}"),
        }
    }

    best.ok_or(GeometryError::NoDistanceComputable)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Point, Polygon, polygon};

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ])
    }

    #[test]
    fn separated_squares_measure_gap() {
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(3.0, 0.0, 4.0, 1.0);
        let d = robust_distance(&a, &b).unwrap();
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn nested_geometry_is_distance_zero() {
        let outer = rect(0.0, 0.0, 10.0, 10.0);
        let inner = rect(4.0, 4.0, 5.0, 5.0);
        assert!(robust_distance(&outer, &inner).unwrap().abs() < 1e-12);
        assert!(robust_distance(&inner, &outer).unwrap().abs() < 1e-12);
    }

    #[test]
    fn points_fall_back_to_envelopes() {
        let a = Geometry::Point(Point::new(0.0, 0.0));
        let b = Geometry::Point(Point::new(3.0, 4.0));
        let d = robust_distance(&a, &b).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_geometry_has_no_distance() {
        let empty = Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![]));
        let a = rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            robust_distance(&a, &empty),
            Err(GeometryError::NoDistanceComputable)
        );
    }

    #[test]
    fn planar_distance_rejects_empty() {
        let empty = Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![]));
        assert_eq!(
            planar_distance(&empty, &empty),
            Err(GeometryError::EmptyGeometry)
        );
    }
}
