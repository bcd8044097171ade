//! Coordinate reference system identifiers.

use serde::{Deserialize, Serialize};

/// A coordinate reference system identifier such as `"EPSG:5070"`.
///
/// Accepts the spellings found in GeoJSON `crs` members
/// (`urn:ogc:def:crs:EPSG::5070`, `urn:ogc:def:crs:OGC:1.3:CRS84`) and
/// compares by EPSG code when both sides have one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    /// WGS 84 geographic coordinates.
    pub const WGS_84: &'static str = "EPSG:4326";
    /// NAD83 / CONUS Albers equal-area projection.
    pub const NAD_83_CONUS_ALBERS: &'static str = "EPSG:5070";

    /// Wraps a CRS identifier.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// WGS 84 (the GeoJSON default).
    #[must_use]
    pub fn wgs84() -> Self {
        Self::new(Self::WGS_84)
    }

    /// NAD83 / CONUS Albers.
    #[must_use]
    pub fn conus_albers() -> Self {
        Self::new(Self::NAD_83_CONUS_ALBERS)
    }

    /// The identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric EPSG code, if the identifier carries one.
    ///
    /// `CRS84` is reported as 4326.
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        let code = self.0.trim();
        if code.to_ascii_uppercase().ends_with("CRS84") {
            return Some(4326);
        }
        code.rsplit(':').next()?.trim().parse().ok()
    }

    /// Whether two identifiers denote the same CRS.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self.epsg_code(), other.epsg_code()) {
            (Some(a), Some(b)) => a == b,
            _ => self.0.trim().eq_ignore_ascii_case(other.0.trim()),
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
