//! Activity name resolution for one matched activity record.

use parcel_fusion_fusion::is_empty_value;
use parcel_fusion_parcel_models::ActivityRecord;
use parcel_fusion_source::{ActivitySourceDefinition, ColumnRenameRules};

use crate::rules::DomainRules;

/// Human-readable activity name of `record`.
///
/// Sources that use their own name as the activity and carry a non-empty
/// appendage column produce `"{source name} - {appendage}"`. Otherwise the
/// first usable value of a column the rename rules map to `activity` is
/// code-translated and used. Falls back to the source name, and always
/// passes through the rewrite table last.
#[must_use]
pub fn resolve_activity_name(
    state: &str,
    source: &ActivitySourceDefinition,
    record: &ActivityRecord,
    rename_rules: &ColumnRenameRules,
    rules: &DomainRules,
) -> String {
    let mut name: Option<String> = None;
    let mut appendage: Option<String> = None;

    if source.use_name_as_activity {
        let value = source
            .activity_name_appendage_col
            .as_deref()
            .and_then(|column| record.get(column))
            .filter(|value| !is_empty_value(value));
        if let Some(value) = value {
            name = Some(source.name.clone());
            appendage = Some(value.trim().to_string());
        }
    }

    if name.is_none() {
        name = rename_rules
            .activity_columns(state, &source.name)
            .into_iter()
            .filter_map(|column| record.get(column))
            .map(str::trim)
            .find(|value| !value.contains("None") && !is_empty_value(value))
            .map(ToString::to_string);
    }

    if let Some(resolved) = name.as_mut() {
        if rules.translates_appendage(state) {
            appendage = appendage.map(|value| rules.translate_code(state, &value));
        } else {
            *resolved = rules.translate_code(state, resolved);
        }
    }

    let name = match (name, appendage) {
        (Some(name), Some(appendage)) => format!("{name} - {appendage}"),
        (Some(name), None) if !name.trim().is_empty() => name,
        _ => source.name.clone(),
    };

    rules.rewrite_name(name)
}

#[cfg(test)]
mod tests {
    use parcel_fusion_parcel_models::{ActivityRightsType, AttributeMap};

    use super::*;

    fn source(name: &str, use_name: bool, appendage: Option<&str>) -> ActivitySourceDefinition {
        ActivitySourceDefinition {
            name: name.to_string(),
            location: format!("{name}.geojson"),
            rights_type: ActivityRightsType::NeedsLookup,
            use_name_as_activity: use_name,
            keep_cols: vec![],
            activity_name_appendage_col: appendage.map(ToString::to_string),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> ActivityRecord {
        let attributes: AttributeMap = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ActivityRecord::new(None, attributes)
    }

    fn rename_rules() -> ColumnRenameRules {
        ColumnRenameRules::parse(
            r#"{
                "NM": {"mineral leases": {"NONE_COL": "activity", "LEASE_TYPE": "activity"}},
                "AZ": {"Leases": {"USE": "activity"}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn source_name_is_used_by_default() {
        let name = resolve_activity_name(
            "AZ",
            &source("Grazing Lease", true, None),
            &record(&[]),
            &ColumnRenameRules::default(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Grazing Lease");
    }

    #[test]
    fn appendage_column_extends_source_name() {
        let name = resolve_activity_name(
            "AZ",
            &source("Commercial Lease", true, Some("SUBTYPE")),
            &record(&[("SUBTYPE", "Solar")]),
            &ColumnRenameRules::default(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Commercial Lease - Solar");
    }

    #[test]
    fn wisconsin_translates_the_appendage() {
        let name = resolve_activity_name(
            "WI",
            &source("Forest Program", true, Some("PROGRAM")),
            &record(&[("PROGRAM", "MFL")]),
            &ColumnRenameRules::default(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Forest Program - Managed Forest Law");
    }

    #[test]
    fn activity_column_values_are_translated() {
        let name = resolve_activity_name(
            "NM",
            &source("Mineral Leases", false, None),
            &record(&[("NONE_COL", "None"), ("LEASE_TYPE", "1.0")]),
            &rename_rules(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Oil & Gas");
    }

    #[test]
    fn rewrite_table_applies_last() {
        let name = resolve_activity_name(
            "AZ",
            &source("Leases", false, None),
            &record(&[("USE", "OilGas")]),
            &rename_rules(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Oil & Gas");
    }

    #[test]
    fn empty_column_values_fall_back_to_source_name() {
        let name = resolve_activity_name(
            "AZ",
            &source("Leases", false, None),
            &record(&[("USE", "nan")]),
            &rename_rules(),
            &DomainRules::default(),
        );
        assert_eq!(name, "Leases");
    }
}
