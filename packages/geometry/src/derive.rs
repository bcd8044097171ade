//! Boundary and envelope derivation.

use geo::dimensions::HasDimensions as _;
use geo::{BoundingRect as _, Coord, Geometry, LineString, MultiLineString, MultiPoint, Point, Polygon, Rect};

use crate::GeometryError;

/// Returns the topological boundary of a geometry.
///
/// Polygons yield their rings as a `MultiLineString`; open lines yield their
/// end points (mod-2 rule for multi-lines). Points, closed rings and other
/// zero-boundary inputs return [`GeometryError::EmptyGeometry`].
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] when the boundary is empty and
/// [`GeometryError::UnsupportedGeometry`] for geometry collections.
pub fn boundary(geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    let derived = match geometry {
        Geometry::Polygon(polygon) => rings_of(std::iter::once(polygon)),
        Geometry::MultiPolygon(multi) => rings_of(multi.iter()),
        Geometry::Rect(rect) => rings_of(std::iter::once(&rect.to_polygon())),
        Geometry::Triangle(triangle) => rings_of(std::iter::once(&triangle.to_polygon())),
        Geometry::Line(line) => {
            line_endpoints(std::iter::once(&LineString::new(vec![line.start, line.end])))
        }
        Geometry::LineString(line) => line_endpoints(std::iter::once(line)),
        Geometry::MultiLineString(multi) => line_endpoints(multi.iter()),
        Geometry::Point(_) | Geometry::MultiPoint(_) => return Err(GeometryError::EmptyGeometry),
        Geometry::GeometryCollection(_) => {
            return Err(GeometryError::UnsupportedGeometry {
                kind: "GeometryCollection",
            });
        }
    };

    if derived.is_empty() {
        Err(GeometryError::EmptyGeometry)
    } else {
        Ok(derived)
    }
}

/// Returns the bounding envelope of a geometry.
///
/// Degenerate envelopes collapse to a `Point` or `LineString` the way a
/// zero-area rectangle would.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] for empty geometries and
/// [`GeometryError::InvalidCoordinate`] when the bounds are not finite.
pub fn envelope(geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    if geometry.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    let rect = geometry
        .bounding_rect()
        .ok_or(GeometryError::EmptyGeometry)?;

    let (min, max) = (rect.min(), rect.max());
    if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
        return Err(GeometryError::InvalidCoordinate {
            x: min.x,
            y: min.y,
            reason: "non-finite bounds",
        });
    }

    Ok(rect_geometry(rect))
}

/// Converts a rectangle to the simplest geometry covering it.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn rect_geometry(rect: Rect<f64>) -> Geometry<f64> {
    let (min, max) = (rect.min(), rect.max());
    if min == max {
        Geometry::Point(Point::from(min))
    } else if min.x == max.x || min.y == max.y {
        Geometry::LineString(LineString::new(vec![min, max]))
    } else {
        Geometry::Polygon(rect.to_polygon())
    }
}

fn rings_of<'a>(polygons: impl Iterator<Item = &'a Polygon<f64>>) -> Geometry<f64> {
    let rings: Vec<LineString<f64>> = polygons
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .filter(|ring| ring.0.len() >= 2)
        .cloned()
        .collect();

    Geometry::MultiLineString(MultiLineString::new(rings))
}

fn line_endpoints<'a>(lines: impl Iterator<Item = &'a LineString<f64>>) -> Geometry<f64> {
    let mut ends: Vec<(Coord<f64>, usize)> = Vec::new();

    for line in lines {
        if line.is_closed() {
            continue;
        }
        let (Some(first), Some(last)) = (line.0.first(), line.0.last()) else {
            continue;
        };
        for coord in [*first, *last] {
            if let Some(entry) = ends.iter_mut().find(|(c, _)| *c == coord) {
                entry.1 += 1;
            } else {
                ends.push((coord, 1));
            }
        }
    }

    let points: Vec<Point<f64>> = ends
        .into_iter()
        .filter(|(_, count)| count % 2 == 1)
        .map(|(coord, _)| Point::from(coord))
        .collect();

    Geometry::MultiPoint(MultiPoint::new(points))
}
