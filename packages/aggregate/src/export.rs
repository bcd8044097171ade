//! CSV export of the parcel dataset and its summary reports.

use std::{collections::BTreeSet, fs::File, io, path::Path};

use parcel_fusion_fusion::tribes::LIST_SEPARATOR;
use parcel_fusion_parcel_models::{Parcel, columns};
use serde::Serialize;

use crate::{
    AggregateError,
    reservation::ReservationSummary,
    university::{UniversitySummary, acres_columns},
};

/// Creates `path` for writing, along with any missing parent directories.
///
/// # Errors
///
/// * If a directory or the file cannot be created
pub fn create_output(path: &Path) -> Result<File, AggregateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Writes a header row followed by `rows`.
///
/// # Errors
///
/// * If a record cannot be written
pub fn write_table<W: io::Write>(
    writer: W,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<(), AggregateError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(headers)?;
    for row in rows {
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes parcels with the canonical columns first, then every extra
/// attribute column in name order. Geometry is not written.
///
/// # Errors
///
/// * If a record cannot be written
pub fn write_parcels<W: io::Write>(writer: W, parcels: &[Parcel]) -> Result<(), AggregateError> {
    let extra: BTreeSet<&str> = parcels
        .iter()
        .flat_map(|parcel| parcel.attributes.keys().map(String::as_str))
        .filter(|column| !columns::FINAL_DATASET_COLUMNS.contains(column))
        .collect();

    let headers: Vec<&str> = columns::FINAL_DATASET_COLUMNS
        .iter()
        .copied()
        .chain(extra.iter().copied())
        .collect();

    let rows = parcels.iter().map(|parcel| {
        headers
            .iter()
            .map(|column| {
                canonical_value(parcel, column)
                    .or_else(|| parcel.attributes.get(*column).cloned())
                    .unwrap_or_default()
            })
            .collect()
    });

    write_table(writer, &headers, rows)
}

#[derive(Serialize)]
struct ReservationRow<'a> {
    reservation_name: &'a str,
    state: &'a str,
    trust_name: String,
    rights_type: String,
    gis_acres: f64,
    clipped_acres: f64,
    parcel_count: usize,
    surface_gis_acres: f64,
    surface_clipped_acres: f64,
    surface_parcel_count: usize,
    subsurface_gis_acres: f64,
    subsurface_clipped_acres: f64,
    subsurface_parcel_count: usize,
    reservation_acres: Option<f64>,
}

impl<'a> From<&'a ReservationSummary> for ReservationRow<'a> {
    fn from(summary: &'a ReservationSummary) -> Self {
        Self {
            reservation_name: &summary.reservation_name,
            state: &summary.state,
            trust_name: summary.trust_names.join(LIST_SEPARATOR),
            rights_type: summary.rights_types.join(LIST_SEPARATOR),
            gis_acres: summary.all.gis_acres,
            clipped_acres: summary.all.clipped_acres,
            parcel_count: summary.all.parcel_count,
            surface_gis_acres: summary.surface.gis_acres,
            surface_clipped_acres: summary.surface.clipped_acres,
            surface_parcel_count: summary.surface.parcel_count,
            subsurface_gis_acres: summary.subsurface.gis_acres,
            subsurface_clipped_acres: summary.subsurface.clipped_acres,
            subsurface_parcel_count: summary.subsurface.parcel_count,
            reservation_acres: summary.reservation_acres,
        }
    }
}

/// Writes the by-reservation report.
///
/// # Errors
///
/// * If a record cannot be written
pub fn write_reservations<W: io::Write>(
    writer: W,
    summaries: &[ReservationSummary],
) -> Result<(), AggregateError> {
    let mut csv = csv::Writer::from_writer(writer);
    for summary in summaries {
        csv.serialize(ReservationRow::from(summary))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the by-university report.
///
/// Acres columns are the sorted union across all universities; a university
/// without parcels of a rights type gets `0`.
///
/// # Errors
///
/// * If a record cannot be written
pub fn write_universities<W: io::Write>(
    writer: W,
    summaries: &[UniversitySummary],
) -> Result<(), AggregateError> {
    let acres = acres_columns(summaries);

    let mut headers = vec!["university"];
    headers.extend(acres.iter().map(String::as_str));
    headers.extend([
        "price_paid",
        "present_day_tribe_count",
        "present_day_tribe",
        "tribes_named_in_cession_count",
        "tribes_named_in_cession",
        "cession_count",
        "all_cessions",
    ]);

    let rows = summaries.iter().map(|summary| {
        let mut row = vec![summary.university.clone()];
        row.extend(acres.iter().map(|column| {
            summary
                .acres_by_rights_type
                .get(column)
                .copied()
                .unwrap_or_default()
                .to_string()
        }));
        row.extend([
            summary.price_paid.to_string(),
            summary.present_day_tribes.len().to_string(),
            summary.present_day_tribe(),
            summary.tribes_named_in_cession.len().to_string(),
            summary.tribes_named_in_cession_list(),
            summary.cessions.len().to_string(),
            summary.all_cessions(),
        ]);
        row
    });

    write_table(writer, &headers, rows)
}

fn canonical_value(parcel: &Parcel, column: &str) -> Option<String> {
    let location = &parcel.location;
    match column {
        columns::OBJECT_ID => Some(parcel.object_id.clone()),
        columns::STATE => Some(parcel.state.clone()),
        columns::MANAGING_AGENCY => parcel.managing_agency.clone(),
        columns::STATE_ENABLING_ACT => parcel.state_enabling_act.clone(),
        columns::TRUST_NAME => parcel.trust_name.clone(),
        columns::RESERVATION_NAME => parcel.reservation_name.clone(),
        columns::RIGHTS_TYPE => Some(parcel.rights_type.clone()),
        columns::RIGHTS_TYPE_INFO => parcel.rights_type_info.clone(),
        columns::ACRES => parcel.acres.map(|v| v.to_string()),
        columns::GIS_ACRES => parcel.gis_acres.map(|v| v.to_string()),
        columns::NET_ACRES => parcel.net_acres.map(|v| v.to_string()),
        columns::CLIPPED_ACRES => parcel.clipped_acres.map(|v| v.to_string()),
        columns::ACTIVITY => Some(parcel.activity.clone()),
        columns::ACTIVITY_INFO => Some(parcel.activity_info.clone()),
        columns::COUNTY => location.county.clone(),
        columns::MERIDIAN => location.meridian.clone(),
        columns::TOWNSHIP => location.township.clone(),
        columns::RANGE => location.range.clone(),
        columns::SECTION => location.section.clone(),
        columns::ALIQUOT => location.aliquot.clone(),
        _ => None,
    }
}
