//! Column rename rules.
//!
//! A JSON document keyed `state -> activity name -> {raw_column: canonical}`
//! maps the raw columns of each activity layer onto canonical output names
//! (`activity`, `lessee`, `lease_status`, ...).

use std::{collections::BTreeMap, fmt, path::Path};

use parcel_fusion_parcel_models::columns;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap as _,
};

use crate::SourceError;

/// Raw column to canonical output name, for one activity source.
///
/// Entries keep the order they have in the document; when several raw
/// columns map to the same canonical name, that order decides which wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap(Vec<(String, String)>);

impl RenameMap {
    /// Canonical name of a raw column.
    #[must_use]
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(column, _)| column == raw)
            .map(|(_, canonical)| canonical.as_str())
    }

    /// `(raw, canonical)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(raw, canonical)| (raw.as_str(), canonical.as_str()))
    }
}

impl<'de> Deserialize<'de> for RenameMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RenameMapVisitor;

        impl<'de> Visitor<'de> for RenameMapVisitor {
            type Value = RenameMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of raw column names to canonical names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RenameMap, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or_default());
                while let Some(pair) = access.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(RenameMap(pairs))
            }
        }

        deserializer.deserialize_map(RenameMapVisitor)
    }
}

impl Serialize for RenameMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (raw, canonical) in &self.0 {
            map.serialize_entry(raw, canonical)?;
        }
        map.end()
    }
}

/// The full rename table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnRenameRules(BTreeMap<String, BTreeMap<String, RenameMap>>);

impl ColumnRenameRules {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Json`] if the document is malformed.
    pub fn parse(json: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the document is malformed
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let text = tokio::fs::read_to_string(path).await?;
        let rules = Self::parse(&text)?;
        log::debug!("Loaded rename rules for {} states", rules.0.len());
        Ok(rules)
    }

    /// Rename map of one activity source.
    ///
    /// The state matches case-insensitively. The activity name is looked up
    /// lowercased first, then exactly as given.
    #[must_use]
    pub fn rules_for(&self, state: &str, activity: &str) -> Option<&RenameMap> {
        let by_activity = self
            .0
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(state.trim()))
            .map(|(_, v)| v)?;

        by_activity
            .get(&activity.to_lowercase())
            .or_else(|| by_activity.get(activity))
    }

    /// Raw columns renamed to `canonical` (case-insensitive) for one source,
    /// in document order.
    #[must_use]
    pub fn columns_for(&self, state: &str, activity: &str, canonical: &str) -> Vec<&str> {
        self.rules_for(state, activity)
            .map(|map| {
                map.iter()
                    .filter(|(_, target)| target.eq_ignore_ascii_case(canonical))
                    .map(|(raw, _)| raw)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raw columns holding the activity name for one source.
    #[must_use]
    pub fn activity_columns(&self, state: &str, activity: &str) -> Vec<&str> {
        self.columns_for(state, activity, columns::ACTIVITY)
    }

    /// First raw column renamed to `canonical` for one source.
    #[must_use]
    pub fn column_for(&self, state: &str, activity: &str, canonical: &str) -> Option<&str> {
        self.columns_for(state, activity, canonical).into_iter().next()
    }

    /// Number of states with rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "NM": {
            "oil gas": {"LEASE_TYPE": "activity", "LESSEE_NAME": "lessee", "STATUS": "lease_status"},
            "Grazing": {"LEASE_NO": "lease_number"}
        },
        "az": {
            "Mineral Lease": {"COMMODITY": "Activity", "SUBTYPE": "activity"}
        }
    }"#;

    #[test]
    fn state_lookup_ignores_case() {
        let rules = ColumnRenameRules::parse(SAMPLE).unwrap();
        assert!(rules.rules_for("nm", "Grazing").is_some());
        assert!(rules.rules_for("AZ", "Mineral Lease").is_some());
        assert!(rules.rules_for("WY", "Grazing").is_none());
    }

    #[test]
    fn activity_lookup_prefers_lowercase_key() {
        let rules = ColumnRenameRules::parse(SAMPLE).unwrap();
        let map = rules.rules_for("NM", "Oil Gas").unwrap();
        assert_eq!(map.get("LESSEE_NAME"), Some("lessee"));
        assert!(rules.rules_for("NM", "grazing").is_none());
    }

    #[test]
    fn finds_activity_columns() {
        let rules = ColumnRenameRules::parse(SAMPLE).unwrap();
        assert_eq!(rules.activity_columns("AZ", "Mineral Lease"), vec!["COMMODITY", "SUBTYPE"]);
        assert_eq!(rules.column_for("NM", "Oil Gas", "lessee"), Some("LESSEE_NAME"));
        assert_eq!(rules.column_for("NM", "Grazing", "lessee"), None);
        assert!(rules.activity_columns("WY", "Anything").is_empty());
    }

    #[test]
    fn columns_keep_document_order() {
        let rules = ColumnRenameRules::parse(
            r#"{"WY": {"Leases": {"ZONE_ACT": "activity", "ALT_ACT": "activity", "LEASE": "x"}}}"#,
        )
        .unwrap();
        assert_eq!(rules.activity_columns("WY", "Leases"), vec!["ZONE_ACT", "ALT_ACT"]);

        let text = serde_json::to_string(&rules).unwrap();
        assert_eq!(ColumnRenameRules::parse(&text).unwrap(), rules);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ColumnRenameRules::parse("{\"NM\": [1, 2]}"),
            Err(SourceError::Json(_))
        ));
    }
}
