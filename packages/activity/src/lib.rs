#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Activity matching: which land-use activities apply to which parcels.
//!
//! For every configured state and activity source, the layer is loaded,
//! spatially matched against that state's parcels, filtered by the domain
//! rules in [`rules`] and folded into per-parcel activity bundles.

pub mod compat;
pub mod driver;
pub mod info;
pub mod name;
pub mod rules;

pub use compat::{effective_rights_type, is_compatible_activity, is_inactive};
pub use driver::{
    ActivityMatcher, DriverError, MatchContext, MatchOptions, MatchRecord, MatchReport,
    SkippedSource, SourceOutcome, SourceState, process_state_activity,
};
pub use info::format_activity_info;
pub use name::resolve_activity_name;
pub use rules::{DomainRules, RulesError};
