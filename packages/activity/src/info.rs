//! Formatting of `activity_info` blocks.

use parcel_fusion_parcel_models::{ActivityRecord, columns};
use parcel_fusion_source::{ActivitySourceDefinition, ColumnRenameRules};

/// Info block for one accepted match, or `None` when the source has no
/// rename rules.
///
/// The block reads
/// `layer_index: {state}-{source} activity: {name} lease_status: {status} lessee: {lessee}`;
/// status and lessee come from the columns the rules map to `lease_status`
/// and `lessee`, and are empty when unmapped. When several mapped columns
/// are present, the one listed last in the rules wins.
#[must_use]
pub fn format_activity_info(
    state: &str,
    source: &ActivitySourceDefinition,
    record: &ActivityRecord,
    activity_name: &str,
    rename_rules: &ColumnRenameRules,
) -> Option<String> {
    rename_rules.rules_for(state, &source.name)?;

    let value_of = |canonical: &str| {
        rename_rules
            .columns_for(state, &source.name, canonical)
            .into_iter()
            .filter_map(|column| record.get(column))
            .next_back()
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    Some(format!(
        "layer_index: {state}-{} activity: {activity_name} lease_status: {} lessee: {}",
        source.name,
        value_of(columns::LEASE_STATUS),
        value_of(columns::LESSEE),
    ))
}
