#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry predicates used to decide whether a parcel and an activity
//! feature describe the same piece of land.
//!
//! Everything here is a thin layer over [`geo`]: DE-9IM relations via
//! [`geo::Relate`], planar distances via [`geo::Euclidean`]. Every call
//! returns a [`Result`] so that callers can drop a single failing pair
//! without hiding the failure.

mod derive;
mod distance;
mod predicates;
pub mod reproject;

use thiserror::Error;

pub use derive::{boundary, envelope, rect_geometry};
pub use distance::{planar_distance, robust_distance};
pub use predicates::{any_relation, is_spatially_compatible};
pub use reproject::{EpsgReprojector, Reprojector};

/// Errors raised by geometry computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The geometry (or a geometry derived from it) has no coordinates.
    #[error("Geometry is empty")]
    EmptyGeometry,

    /// The geometry type has no defined boundary for this operation.
    #[error("Unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// Geometry type name.
        kind: &'static str,
    },

    /// A distance computation produced NaN or infinity.
    #[error("Distance computation produced a non-finite value")]
    NonFiniteDistance,

    /// Every distance approximation failed for a pair.
    #[error("No distance approximation could be computed")]
    NoDistanceComputable,

    /// A DE-9IM pattern could not be evaluated.
    #[error("Relate error: {0}")]
    Relate(String),

    /// No transform is known between two coordinate reference systems.
    #[error("Unsupported coordinate transform: {from} -> {to}")]
    UnsupportedTransform {
        /// Source CRS.
        from: String,
        /// Target CRS.
        to: String,
    },

    /// The projection library rejected a transform.
    #[error("Projection error: {0}")]
    Projection(String),

    /// A coordinate is outside the valid domain of a projection.
    #[error("Invalid coordinate ({x}, {y}): {reason}")]
    InvalidCoordinate {
        /// X (or longitude).
        x: f64,
        /// Y (or latitude).
        y: f64,
        /// Why the coordinate was rejected.
        reason: &'static str,
    },
}
