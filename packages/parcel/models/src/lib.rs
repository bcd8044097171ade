#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel and activity-layer types shared across the fusion pipeline.
//!
//! A [`Parcel`] is the unit of output: a land record with canonical
//! attributes, a generic side map for source-specific fields, and the two
//! mutable fusion fields (`activity`, `activity_info`). An [`ActivityLayer`]
//! is a read-only collection of [`ActivityRecord`]s produced by a source
//! loader for one (state, activity-source) pair.

pub mod columns;
mod crs;

use std::collections::BTreeMap;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use crs::Crs;

/// Square meters in one acre.
pub const SQUARE_METERS_PER_ACRE: f64 = 4_046.856_422_4;

/// Source-specific attributes keyed by column name.
pub type AttributeMap = BTreeMap<String, String>;

/// Rights type declared by an activity source.
///
/// Parcels carry their rights type as free text (`"surface"`, `"subsurface"`,
/// `"timber"`, `"surface+subsurface"`, ...) and are compared against the
/// activity's declared type case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ActivityRightsType {
    /// Applies to surface estates only.
    Surface,
    /// Applies to subsurface (mineral) estates only.
    Subsurface,
    /// Resolved per activity name from the rights-type lookup table.
    NeedsLookup,
    /// Applies to any parcel regardless of rights type.
    Universal,
}

/// Public Land Survey System location of a parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlssLocation {
    /// County name.
    pub county: Option<String>,
    /// Principal meridian.
    pub meridian: Option<String>,
    /// Township designation (e.g. `"T12N"`).
    pub township: Option<String>,
    /// Range designation (e.g. `"R3E"`).
    pub range: Option<String>,
    /// Section number.
    pub section: Option<String>,
    /// Aliquot part description.
    pub aliquot: Option<String>,
}

/// A single land parcel.
///
/// Identity is `object_id`; the position of a parcel inside a collection is
/// only used as a transient row key during one matching pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parcel {
    /// Unique parcel identifier.
    pub object_id: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// Rights type as recorded by the source (free text).
    pub rights_type: String,
    /// Agency managing the parcel.
    pub managing_agency: Option<String>,
    /// Enabling act that granted the trust land.
    pub state_enabling_act: Option<String>,
    /// Trust beneficiary name.
    pub trust_name: Option<String>,
    /// Reservation the parcel falls within, if known.
    pub reservation_name: Option<String>,
    /// Free-text detail about the rights type.
    pub rights_type_info: Option<String>,
    /// Acreage reported by the source.
    pub acres: Option<f64>,
    /// Acreage computed from the geometry.
    pub gis_acres: Option<f64>,
    /// Net acreage reported by the source.
    pub net_acres: Option<f64>,
    /// Acreage remaining after clipping to reservation boundaries.
    pub clipped_acres: Option<f64>,
    /// PLSS location fields.
    pub location: PlssLocation,
    /// Sorted, comma-joined, de-duplicated activity names.
    pub activity: String,
    /// Newline-joined formatted activity info blocks.
    pub activity_info: String,
    /// Source-specific fields not covered by the canonical columns.
    pub attributes: AttributeMap,
    /// Polygon or multipolygon geometry in the collection's CRS.
    pub geometry: Option<Geometry<f64>>,
}

impl Parcel {
    /// Creates a parcel with the minimum required fields.
    #[must_use]
    pub fn new(
        object_id: impl Into<String>,
        state: impl Into<String>,
        rights_type: impl Into<String>,
        geometry: Option<Geometry<f64>>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            state: state.into(),
            rights_type: rights_type.into(),
            geometry,
            ..Self::default()
        }
    }

    /// Whether this parcel belongs to `state` (case-insensitive).
    #[must_use]
    pub fn is_in_state(&self, state: &str) -> bool {
        self.state.trim().eq_ignore_ascii_case(state.trim())
    }

    /// Non-empty activity tokens currently recorded on the parcel.
    pub fn activity_tokens(&self) -> impl Iterator<Item = &str> {
        self.activity.split(',').map(str::trim).filter(|t| !t.is_empty())
    }

    /// Looks up an extra attribute by exact column name.
    #[must_use]
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// One feature of an activity layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRecord {
    /// Feature geometry in the layer's CRS.
    pub geometry: Option<Geometry<f64>>,
    /// Raw attribute columns.
    pub attributes: AttributeMap,
}

impl ActivityRecord {
    /// Creates a record from a geometry and raw attributes.
    #[must_use]
    pub const fn new(geometry: Option<Geometry<f64>>, attributes: AttributeMap) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Returns the non-blank value of `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.attributes
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns the non-blank value of the first column whose name matches
    /// `column` ignoring ASCII case.
    #[must_use]
    pub fn get_ignore_case(&self, column: &str) -> Option<&str> {
        self.get(column).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v.as_str())
                .filter(|v| !v.trim().is_empty())
        })
    }
}

/// All features loaded from one activity source for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLayer {
    /// State the source belongs to.
    pub state: String,
    /// Activity source name.
    pub source_name: String,
    /// Coordinate reference system of every record geometry.
    pub crs: Crs,
    /// Layer features.
    pub records: Vec<ActivityRecord>,
}

impl ActivityLayer {
    /// Number of features in the layer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
