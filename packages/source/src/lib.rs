#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Everything the matcher needs from the outside world.
//!
//! Activity sources are described in TOML ([`config`]), their raw columns
//! are mapped to canonical names through a JSON rename table
//! ([`rename_rules`]), and their features are materialized by an
//! [`ActivitySourceLoader`] ([`loader`]), optionally behind an
//! [`ActivityCache`] ([`cache`]). Parcels are read and written as `GeoJSON`
//! ([`geojson_io`]).

pub mod cache;
pub mod config;
pub mod geojson_io;
pub mod loader;
pub mod rename_rules;

pub use cache::{ActivityCache, CachedLoader, DirectoryCache, MemoryCache, cache_key};
pub use config::{ActivitySourceDefinition, ActivitySources, StateActivities};
pub use loader::{ActivitySourceLoader, GeoJsonFileLoader};
pub use rename_rules::ColumnRenameRules;

/// Errors that can occur while loading or writing source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document is not a feature collection.
    #[error("Expected a GeoJSON FeatureCollection in {location}")]
    NotAFeatureCollection {
        /// Where the document came from.
        location: String,
    },

    /// The source produced no features.
    #[error("No features found in {location}")]
    MissingFeatures {
        /// Where the source was read from.
        location: String,
    },

    /// The loader cannot read this kind of location.
    #[error("Unsupported source location: {location}")]
    UnsupportedLocation {
        /// The offending location.
        location: String,
    },

    /// A feature could not be converted.
    #[error("Invalid feature {index}: {message}")]
    InvalidFeature {
        /// Feature position in the collection.
        index: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A requested state has no configured activity sources.
    #[error("No activity sources configured for state {state}")]
    UnknownState {
        /// The requested state.
        state: String,
    },
}
