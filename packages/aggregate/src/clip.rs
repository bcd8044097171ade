//! Clipping parcels to reservation boundaries.
//!
//! Areas are computed in the units of the input CRS, so both the parcels and
//! the boundaries must already be in a meter-based projection such as
//! EPSG:5070 (see [`reproject_parcels`]).

use geo::{Area as _, BooleanOps as _, Geometry, MultiPolygon};
use parcel_fusion_geometry::{GeometryError, Reprojector};
use parcel_fusion_parcel_models::{Crs, Parcel, SQUARE_METERS_PER_ACRE};
use parcel_fusion_spatial::boundary::{BoundaryIndex, to_multipolygon};

use crate::round2;

/// Reprojects every parcel geometry in place.
///
/// # Errors
///
/// * If any geometry cannot be reprojected; parcels before it are already
///   transformed
pub fn reproject_parcels(
    parcels: &mut [Parcel],
    from: &Crs,
    to: &Crs,
    reprojector: &dyn Reprojector,
) -> Result<(), GeometryError> {
    if from.same_as(to) {
        return Ok(());
    }
    for parcel in parcels {
        if let Some(geometry) = parcel.geometry.as_mut() {
            *geometry = reprojector.reproject(geometry, from, to)?;
        }
    }
    Ok(())
}

/// Clips each parcel to the boundaries it overlaps.
///
/// The clipped shape replaces the parcel geometry and its area in acres,
/// rounded to two decimals, becomes `clipped_acres`. Parcels without an
/// areal overlap are dropped. A parcel with no `reservation_name` takes the
/// name of the boundary it overlaps most.
#[must_use]
pub fn clip_to_boundaries(parcels: Vec<Parcel>, boundaries: &BoundaryIndex) -> Vec<Parcel> {
    let before = parcels.len();
    let clipped: Vec<Parcel> = parcels
        .into_iter()
        .filter_map(|parcel| clip_parcel(parcel, boundaries))
        .collect();

    log::info!(
        "Clipped {} of {before} parcels to {} boundaries",
        clipped.len(),
        boundaries.len()
    );
    clipped
}

fn clip_parcel(mut parcel: Parcel, boundaries: &BoundaryIndex) -> Option<Parcel> {
    let geometry = parcel.geometry.take()?;
    let candidates = boundaries.candidates(&geometry);
    let Some(shape) = to_multipolygon(geometry) else {
        log::debug!("Parcel {} has no areal geometry", parcel.object_id);
        return None;
    };

    let mut pieces: Vec<(&str, f64, MultiPolygon<f64>)> = candidates
        .into_iter()
        .filter_map(|entry| {
            let piece = shape.intersection(&entry.polygon);
            let area = piece.unsigned_area();
            (area > 0.0).then_some((entry.name.as_str(), area, piece))
        })
        .collect();
    if pieces.is_empty() {
        return None;
    }

    pieces.sort_by(|a, b| b.1.total_cmp(&a.1));
    if parcel.reservation_name.is_none() {
        parcel.reservation_name = Some(pieces[0].0.to_string());
    }

    let mut pieces = pieces.into_iter().map(|(_, _, piece)| piece);
    let first = pieces.next()?;
    let clipped = pieces.fold(first, |acc, piece| acc.union(&piece));

    parcel.clipped_acres = Some(round2(clipped.unsigned_area() / SQUARE_METERS_PER_ACRE));
    parcel.geometry = Some(Geometry::MultiPolygon(clipped));
    Some(parcel)
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use parcel_fusion_geometry::EpsgReprojector;

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

    fn reservations() -> BoundaryIndex {
        BoundaryIndex::new([
            ("Alpha".to_string(), square(0.0, 0.0, 1_000.0)),
            ("Beta".to_string(), square(1_000.0, 0.0, 1_000.0)),
        ])
    }

    #[test]
    fn parcels_are_clipped_to_the_overlap() {
        let inside = Parcel::new("1", "AZ", "surface", Some(square(100.0, 100.0, 200.0)));
        let straddling = Parcel::new("2", "AZ", "surface", Some(square(900.0, 0.0, 400.0)));
        let outside = Parcel::new("3", "AZ", "surface", Some(square(5_000.0, 0.0, 100.0)));
        let no_geometry = Parcel::new("4", "AZ", "surface", None);

        let clipped = clip_to_boundaries(vec![inside, straddling, outside, no_geometry], &reservations());
        assert_eq!(clipped.len(), 2);

        let acres = |square_meters: f64| round2(square_meters / SQUARE_METERS_PER_ACRE);
        assert_eq!(clipped[0].clipped_acres, Some(acres(40_000.0)));
        assert_eq!(clipped[0].reservation_name.as_deref(), Some("Alpha"));
        assert_eq!(clipped[1].clipped_acres, Some(acres(160_000.0)));
        assert_eq!(clipped[1].reservation_name.as_deref(), Some("Beta"));
    }

    #[test]
    fn existing_reservation_names_are_kept() {
        let mut parcel = Parcel::new("1", "AZ", "surface", Some(square(1_500.0, 0.0, 100.0)));
        parcel.reservation_name = Some("Gamma".to_string());
        let clipped = clip_to_boundaries(vec![parcel], &reservations());
        assert_eq!(clipped[0].reservation_name.as_deref(), Some("Gamma"));
    }

    #[test]
    fn identical_crs_leaves_geometry_untouched() {
        let mut parcels = vec![Parcel::new("1", "AZ", "surface", Some(square(0.0, 0.0, 1.0)))];
        let original = parcels[0].geometry.clone();
        reproject_parcels(
            &mut parcels,
            &Crs::conus_albers(),
            &Crs::conus_albers(),
            &EpsgReprojector,
        )
        .unwrap();
        assert_eq!(parcels[0].geometry, original);
    }

    #[test]
    fn unsupported_crs_is_an_error() {
        let mut parcels = vec![Parcel::new("1", "AZ", "surface", Some(square(0.0, 0.0, 1.0)))];
        let result = reproject_parcels(
            &mut parcels,
            &Crs::new("local grid"),
            &Crs::conus_albers(),
            &EpsgReprojector,
        );
        assert!(result.is_err());
    }
}
