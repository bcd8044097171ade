//! R-tree over named boundary polygons (reservations, management areas).
//!
//! Used to attribute parcels to the boundary they fall in and to clip
//! parcels against the boundaries they intersect.

use geo::{BoundingRect as _, Geometry, MultiPolygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

/// A boundary polygon stored in the R-tree with its name.
#[derive(Debug, Clone)]
pub struct BoundaryEntry {
    /// Position of the boundary in the input sequence.
    pub key: usize,
    /// Boundary name (e.g. reservation name).
    pub name: String,
    /// Boundary area.
    pub polygon: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over named polygons.
pub struct BoundaryIndex {
    tree: RTree<BoundaryEntry>,
}

impl BoundaryIndex {
    /// Indexes `(name, geometry)` pairs. Non-areal geometries are skipped.
    pub fn new(boundaries: impl IntoIterator<Item = (String, Geometry<f64>)>) -> Self {
        let mut entries = Vec::new();

        for (key, (name, geometry)) in boundaries.into_iter().enumerate() {
            let Some(polygon) = to_multipolygon(geometry) else {
                log::warn!("Skipping non-polygon boundary {name}");
                continue;
            };
            let Some(rect) = polygon.bounding_rect() else {
                log::warn!("Skipping empty boundary {name}");
                continue;
            };

            entries.push(BoundaryEntry {
                key,
                name,
                polygon,
                envelope: aabb_of(rect),
            });
        }

        log::info!("Indexed {} boundaries", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Boundaries whose envelope intersects the envelope of `geometry`.
    #[must_use]
    pub fn candidates(&self, geometry: &Geometry<f64>) -> Vec<&BoundaryEntry> {
        geometry.bounding_rect().map_or_else(Vec::new, |rect| {
            self.tree
                .locate_in_envelope_intersecting(&aabb_of(rect))
                .collect()
        })
    }
}

/// Converts polygonal geometries to a [`MultiPolygon`].
#[must_use]
pub fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        Geometry::Rect(r) => Some(MultiPolygon(vec![r.to_polygon()])),
        _ => None,
    }
}

/// R-tree envelope of a bounding rectangle.
#[must_use]
pub fn aabb_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

#[cfg(test)]
mod tests {
    use geo::{Point, polygon};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ])
    }

    fn index() -> BoundaryIndex {
        BoundaryIndex::new([
            ("Alpha".to_string(), square(0.0, 0.0, 10.0)),
            ("Beta".to_string(), square(20.0, 0.0, 10.0)),
            (
                "Line".to_string(),
                Geometry::Point(Point::new(100.0, 100.0)),
            ),
        ])
    }

    #[test]
    fn skips_non_polygons() {
        assert_eq!(index().len(), 2);
    }

    #[test]
    fn candidates_filter_by_envelope() {
        let index = index();
        let names: Vec<&str> = index
            .candidates(&square(8.0, 2.0, 4.0))
            .into_iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha"]);

        let both: Vec<usize> = {
            let mut keys: Vec<usize> = index
                .candidates(&square(5.0, 2.0, 20.0))
                .into_iter()
                .map(|e| e.key)
                .collect();
            keys.sort_unstable();
            keys
        };
        assert_eq!(both, vec![0, 1]);
    }
}
