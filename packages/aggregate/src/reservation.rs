//! Per-reservation summary of the clipped parcel dataset.

use std::collections::BTreeMap;

use geo::{Area as _, Geometry, MultiPolygon, Polygon, unary_union};
use parcel_fusion_parcel_models::{Parcel, SQUARE_METERS_PER_ACRE};
use parcel_fusion_spatial::boundary::to_multipolygon;

use crate::round2;

/// Acreage and parcel count for one slice of a reservation's parcels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RightsTypeTotals {
    pub gis_acres: f64,
    pub clipped_acres: f64,
    pub parcel_count: usize,
}

impl RightsTypeTotals {
    fn add(&mut self, parcel: &Parcel) {
        self.gis_acres += parcel.gis_acres.unwrap_or_default();
        self.clipped_acres += parcel.clipped_acres.unwrap_or_default();
        self.parcel_count += 1;
    }
}

/// One row of the by-reservation report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationSummary {
    pub reservation_name: String,
    /// State of the first parcel seen for the reservation.
    pub state: String,
    /// Distinct trust names in first-seen order.
    pub trust_names: Vec<String>,
    /// Distinct rights types in first-seen order.
    pub rights_types: Vec<String>,
    pub all: RightsTypeTotals,
    pub surface: RightsTypeTotals,
    pub subsurface: RightsTypeTotals,
    /// Area of the reservation itself, when boundaries were supplied.
    pub reservation_acres: Option<f64>,
    /// Union of the reservation's parcel shapes.
    pub geometry: Option<MultiPolygon<f64>>,
}

impl ReservationSummary {
    fn new(reservation_name: &str, state: &str) -> Self {
        Self {
            reservation_name: reservation_name.to_string(),
            state: state.to_string(),
            trust_names: Vec::new(),
            rights_types: Vec::new(),
            all: RightsTypeTotals::default(),
            surface: RightsTypeTotals::default(),
            subsurface: RightsTypeTotals::default(),
            reservation_acres: None,
            geometry: None,
        }
    }
}

/// Groups parcels by `reservation_name` and totals each group.
///
/// Parcels without a reservation are left out. The surface and subsurface
/// slices count parcels whose rights type is exactly that value, ignoring
/// case; everything else only counts toward the overall totals. Rows come
/// back sorted by reservation name.
#[must_use]
pub fn summarize_reservations(parcels: &[Parcel]) -> Vec<ReservationSummary> {
    let mut groups: BTreeMap<&str, (ReservationSummary, Vec<Polygon<f64>>)> = BTreeMap::new();

    for parcel in parcels {
        let Some(name) = parcel.reservation_name.as_deref() else {
            continue;
        };
        let (summary, polygons) = groups
            .entry(name)
            .or_insert_with(|| (ReservationSummary::new(name, &parcel.state), Vec::new()));

        if let Some(trust_name) = parcel.trust_name.as_deref() {
            push_unique(&mut summary.trust_names, trust_name);
        }
        push_unique(&mut summary.rights_types, &parcel.rights_type);

        summary.all.add(parcel);
        match parcel.rights_type.trim().to_ascii_lowercase().as_str() {
            "surface" => summary.surface.add(parcel),
            "subsurface" => summary.subsurface.add(parcel),
            _ => {}
        }

        if let Some(shape) = parcel.geometry.clone().and_then(to_multipolygon) {
            polygons.extend(shape);
        }
    }

    log::info!("Reservations with parcels: {}", groups.len());

    groups
        .into_values()
        .map(|(mut summary, polygons)| {
            if !polygons.is_empty() {
                summary.geometry = Some(unary_union(polygons.iter()));
            }
            summary
        })
        .collect()
}

/// Area in acres of each named boundary, dissolving repeated names.
#[must_use]
pub fn reservation_acres(boundaries: &[(String, Geometry<f64>)]) -> BTreeMap<String, f64> {
    let mut shapes: BTreeMap<&str, Vec<Polygon<f64>>> = BTreeMap::new();
    for (name, geometry) in boundaries {
        if let Some(shape) = to_multipolygon(geometry.clone()) {
            shapes.entry(name.as_str()).or_default().extend(shape);
        }
    }

    shapes
        .into_iter()
        .map(|(name, polygons)| {
            let area = unary_union(polygons.iter()).unsigned_area();
            (name.to_string(), round2(area / SQUARE_METERS_PER_ACRE))
        })
        .collect()
}

/// Fills `reservation_acres` from a name-to-acres table.
pub fn attach_reservation_acres(
    summaries: &mut [ReservationSummary],
    acres: &BTreeMap<String, f64>,
) {
    for summary in summaries {
        summary.reservation_acres = acres.get(&summary.reservation_name).copied();
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}
