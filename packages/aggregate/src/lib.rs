#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Everything that happens to the parcel dataset after activity matching:
//! cleaning passes, clipping to reservation boundaries, and the reservation
//! and university summary reports with their CSV export.

pub mod clean;
pub mod clip;
pub mod export;
pub mod reservation;
pub mod university;

pub use clean::{
    KeywordCase, fill_lessees, filter_parcels_by_acreage, fix_trust_names, join_activity_info,
    pascal_case, remove_river_slivers, remove_timber_rows,
};
pub use clip::{clip_to_boundaries, reproject_parcels};
pub use export::{create_output, write_parcels, write_reservations, write_table, write_universities};
pub use reservation::{
    ReservationSummary, RightsTypeTotals, attach_reservation_acres, reservation_acres,
    summarize_reservations,
};
pub use university::{UniversitySummary, acres_column, summarize_universities};

/// Errors from writing reports.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Rounds to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
