//! Domain rules for activity filtering.
//!
//! The default table is embedded at compile time from
//! `rules/domain.toml`; [`DomainRules::load`] reads a replacement.

use std::{collections::BTreeMap, path::Path};

use parcel_fusion_parcel_models::ActivityRightsType;
use serde::{Deserialize, Serialize};

/// Embedded default rules.
const DEFAULT_RULES: &str = include_str!("../rules/domain.toml");

/// Errors from loading a rules file.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid rules table.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A (state, parcel rights type) pair that never receives activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsTypeExclusion {
    /// State abbreviation.
    pub state: String,
    /// Parcel rights type.
    pub rights_type: String,
}

/// Hard-coded domain tables used while filtering matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRules {
    /// Status value that marks an activity as active.
    #[serde(default = "default_active_status")]
    pub active_status: String,
    /// States whose appendage value is code-translated instead of the name.
    #[serde(default)]
    pub translate_appendage_states: Vec<String>,
    /// Excluded (state, rights type) pairs.
    #[serde(default)]
    pub exclusions: Vec<RightsTypeExclusion>,
    /// Final activity-name rewrites.
    #[serde(default)]
    pub name_rewrites: BTreeMap<String, String>,
    /// Rights type per activity name, for `needs_lookup` sources.
    #[serde(default)]
    pub activity_rights_type: BTreeMap<String, ActivityRightsType>,
    /// Status column per state.
    #[serde(default)]
    pub status_columns: BTreeMap<String, String>,
    /// Activity code tables per state.
    #[serde(default)]
    pub code_translations: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_active_status() -> String {
    "Active".to_string()
}

impl Default for DomainRules {
    fn default() -> Self {
        Self::parse(DEFAULT_RULES)
            .unwrap_or_else(|e| panic!("Failed to parse embedded domain rules: {e}"))
    }
}

impl DomainRules {
    /// Parses a rules table.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Toml`] if the table is malformed.
    pub fn parse(toml_str: &str) -> Result<Self, RulesError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads a rules table from disk.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the table is malformed
    pub async fn load(path: &Path) -> Result<Self, RulesError> {
        let text = tokio::fs::read_to_string(path).await?;
        let rules = Self::parse(&text)?;
        log::info!("Loaded domain rules from {}", path.display());
        Ok(rules)
    }

    /// Whether parcels of `rights_type` in `state` are excluded outright.
    #[must_use]
    pub fn is_excluded(&self, state: &str, rights_type: &str) -> bool {
        self.exclusions.iter().any(|e| {
            e.state.eq_ignore_ascii_case(state.trim())
                && e.rights_type.eq_ignore_ascii_case(rights_type.trim())
        })
    }

    /// Applies the name rewrite table.
    #[must_use]
    pub fn rewrite_name(&self, name: String) -> String {
        self.name_rewrites.get(&name).cloned().unwrap_or(name)
    }

    /// Rights type of an activity name, defaulting to universal.
    #[must_use]
    pub fn lookup_rights_type(&self, activity_name: &str) -> ActivityRightsType {
        self.activity_rights_type
            .get(activity_name)
            .copied()
            .unwrap_or(ActivityRightsType::Universal)
    }

    /// Status column configured for `state`.
    #[must_use]
    pub fn status_column(&self, state: &str) -> Option<&str> {
        state_entry(&self.status_columns, state).map(String::as_str)
    }

    /// Whether `state` translates the appendage rather than the name.
    #[must_use]
    pub fn translates_appendage(&self, state: &str) -> bool {
        self.translate_appendage_states
            .iter()
            .any(|s| s.eq_ignore_ascii_case(state.trim()))
    }

    /// Human-readable form of an activity code.
    ///
    /// Fractional numeric codes are truncated to their integer part first.
    /// Unknown codes come back unchanged.
    #[must_use]
    pub fn translate_code(&self, state: &str, code: &str) -> String {
        let code = integer_code(code.trim());
        state_entry(&self.code_translations, state)
            .and_then(|table| table.get(&code))
            .cloned()
            .unwrap_or(code)
    }
}

fn state_entry<'a, V>(map: &'a BTreeMap<String, V>, state: &str) -> Option<&'a V> {
    map.iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(state.trim()))
        .map(|(_, v)| v)
}

#[allow(clippy::cast_possible_truncation)]
fn integer_code(code: &str) -> String {
    if !code.contains('.') {
        return code.to_string();
    }
    match code.parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{}", value.trunc() as i64),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_rules_parse() {
        let rules = DomainRules::default();
        assert_eq!(rules.active_status, "Active");
        assert!(rules.translates_appendage("wi"));
        assert!(!rules.translates_appendage("NM"));
        assert_eq!(rules.status_column("mt"), Some("status"));
        assert_eq!(rules.status_column("AZ"), None);
    }

    #[test]
    fn washington_timber_is_excluded() {
        let rules = DomainRules::default();
        assert!(rules.is_excluded("WA", "Timber"));
        assert!(!rules.is_excluded("WA", "surface"));
        assert!(!rules.is_excluded("OR", "timber"));
    }

    #[test]
    fn rewrites_known_names() {
        let rules = DomainRules::default();
        assert_eq!(rules.rewrite_name("OilGas".to_string()), "Oil & Gas");
        assert_eq!(rules.rewrite_name("OtherMin".to_string()), "Other Minerals");
        assert_eq!(rules.rewrite_name("Grazing".to_string()), "Grazing");
    }

    #[test]
    fn unknown_activities_are_universal() {
        let rules = DomainRules::default();
        assert_eq!(rules.lookup_rights_type("Oil & Gas"), ActivityRightsType::Subsurface);
        assert_eq!(rules.lookup_rights_type("Grazing"), ActivityRightsType::Surface);
        assert_eq!(rules.lookup_rights_type("Beekeeping"), ActivityRightsType::Universal);
    }

    #[test]
    fn translates_codes() {
        let rules = DomainRules::default();
        assert_eq!(rules.translate_code("NM", "1"), "Oil & Gas");
        assert_eq!(rules.translate_code("nm", "3.0"), "Grazing");
        assert_eq!(rules.translate_code("NM", "2.7"), "Other Minerals");
        assert_eq!(rules.translate_code("NM", "99"), "99");
        assert_eq!(rules.translate_code("AZ", "12.9"), "12");
        assert_eq!(rules.translate_code("AZ", "Grazing"), "Grazing");
    }

    #[test]
    fn partial_tables_use_defaults() {
        let rules = DomainRules::parse("[status_columns]\nMT = \"lease_stat\"\n").unwrap();
        assert_eq!(rules.active_status, "Active");
        assert!(rules.exclusions.is_empty());
        assert_eq!(rules.status_column("MT"), Some("lease_stat"));
    }
}
