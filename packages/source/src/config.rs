//! Activity source descriptors.
//!
//! One TOML file lists every state and, per state, the activity layers to
//! match parcels against:
//!
//! ```toml
//! [[states]]
//! state = "AZ"
//! name = "Arizona"
//!
//! [[states.activities]]
//! name = "Grazing Lease"
//! location = "AZ/grazing.geojson"
//! rights_type = "surface"
//! use_name_as_activity = true
//! keep_cols = ["LESSEE", "STATUS"]
//! ```

use std::path::Path;

use parcel_fusion_parcel_models::ActivityRightsType;
use serde::{Deserialize, Serialize};

use crate::SourceError;

/// Environment variable restricting which states are processed.
pub const STATES_ENV_VAR: &str = "PARCEL_FUSION_STATES";

/// One activity layer for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySourceDefinition {
    /// Activity source name (used as the activity when configured so, and
    /// as the key into the rename rules).
    pub name: String,
    /// Where the layer lives, relative to the activities directory.
    pub location: String,
    /// Rights type the activity applies to.
    pub rights_type: ActivityRightsType,
    /// Use `name` as the activity name instead of a column value.
    #[serde(default)]
    pub use_name_as_activity: bool,
    /// Raw columns to keep in the per-match report.
    #[serde(default)]
    pub keep_cols: Vec<String>,
    /// Column whose value is appended to the activity name.
    #[serde(default)]
    pub activity_name_appendage_col: Option<String>,
}

/// All activity sources for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateActivities {
    /// Two-letter state abbreviation.
    pub state: String,
    /// Human-readable state name.
    #[serde(default)]
    pub name: String,
    /// Activity layers, processed in order.
    #[serde(default)]
    pub activities: Vec<ActivitySourceDefinition>,
}

/// The full source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySources {
    /// Per-state source lists.
    #[serde(default)]
    pub states: Vec<StateActivities>,
}

impl ActivitySources {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Toml`] if the document is malformed.
    pub fn parse(toml_str: &str) -> Result<Self, SourceError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the document is malformed
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let text = tokio::fs::read_to_string(path).await?;
        let sources = Self::parse(&text)?;
        log::info!(
            "Loaded {} states with {} activity sources from {}",
            sources.states.len(),
            sources.source_count(),
            path.display(),
        );
        Ok(sources)
    }

    /// Total number of activity sources across all states.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.states.iter().map(|s| s.activities.len()).sum()
    }

    /// Sources for one state (case-insensitive).
    #[must_use]
    pub fn for_state(&self, state: &str) -> Option<&StateActivities> {
        self.states
            .iter()
            .find(|s| s.state.eq_ignore_ascii_case(state.trim()))
    }

    /// Keeps only the requested states, in configuration order.
    ///
    /// `None` keeps everything.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownState`] for a requested state with no
    /// configured sources.
    pub fn select(&self, states: Option<&[String]>) -> Result<Vec<&StateActivities>, SourceError> {
        let Some(requested) = states else {
            return Ok(self.states.iter().collect());
        };

        for state in requested {
            if self.for_state(state).is_none() {
                return Err(SourceError::UnknownState {
                    state: state.clone(),
                });
            }
        }

        Ok(self
            .states
            .iter()
            .filter(|s| requested.iter().any(|r| r.eq_ignore_ascii_case(&s.state)))
            .collect())
    }
}

/// Parses a comma-separated state list, dropping blanks.
#[must_use]
pub fn parse_state_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// States requested through [`STATES_ENV_VAR`], if set and non-empty.
#[must_use]
pub fn states_from_env() -> Option<Vec<String>> {
    let value = std::env::var(STATES_ENV_VAR).ok()?;
    let states = parse_state_list(&value);
    if states.is_empty() { None } else { Some(states) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[states]]
state = "AZ"
name = "Arizona"

[[states.activities]]
name = "Grazing Lease"
location = "AZ/grazing.geojson"
rights_type = "surface"
use_name_as_activity = true

[[states.activities]]
name = "Mineral Lease"
location = "AZ/minerals.geojson"
rights_type = "needs_lookup"
keep_cols = ["LESSEE", "STATUS"]

[[states]]
state = "WI"
name = "Wisconsin"

[[states.activities]]
name = "Forest Crop"
location = "WI/forest.geojson"
rights_type = "universal"
use_name_as_activity = true
activity_name_appendage_col = "TYPE"
"#;

    #[test]
    fn parses_sources() {
        let sources = ActivitySources::parse(SAMPLE).unwrap();
        assert_eq!(sources.states.len(), 2);
        assert_eq!(sources.source_count(), 3);

        let az = sources.for_state("az").unwrap();
        assert_eq!(az.activities[0].rights_type, ActivityRightsType::Surface);
        assert!(az.activities[0].use_name_as_activity);
        assert!(az.activities[0].keep_cols.is_empty());
        assert_eq!(az.activities[1].rights_type, ActivityRightsType::NeedsLookup);
        assert_eq!(az.activities[1].keep_cols, vec!["LESSEE", "STATUS"]);

        let wi = sources.for_state("WI").unwrap();
        assert_eq!(
            wi.activities[0].activity_name_appendage_col.as_deref(),
            Some("TYPE")
        );
    }

    #[test]
    fn rejects_unknown_rights_type() {
        let bad = r#"
[[states]]
state = "AZ"
[[states.activities]]
name = "X"
location = "x.geojson"
rights_type = "aerial"
"#;
        assert!(matches!(
            ActivitySources::parse(bad),
            Err(SourceError::Toml(_))
        ));
    }

    #[test]
    fn selects_requested_states() {
        let sources = ActivitySources::parse(SAMPLE).unwrap();
        assert_eq!(sources.select(None).unwrap().len(), 2);

        let only_wi = sources.select(Some(&["wi".to_string()])).unwrap();
        assert_eq!(only_wi.len(), 1);
        assert_eq!(only_wi[0].state, "WI");

        assert!(matches!(
            sources.select(Some(&["MT".to_string()])),
            Err(SourceError::UnknownState { .. })
        ));
    }

    #[test]
    fn parses_state_lists() {
        assert_eq!(parse_state_list(" az, wi ,,"), vec!["AZ", "WI"]);
        assert!(parse_state_list(" , ").is_empty());
    }
}
