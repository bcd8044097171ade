//! Domain compatibility between a parcel and a matched activity.

use parcel_fusion_parcel_models::{ActivityRecord, ActivityRightsType, Parcel};
use parcel_fusion_source::ActivitySourceDefinition;

use crate::rules::DomainRules;

/// Rights type an activity applies to, resolving `needs_lookup` through the
/// rules table.
#[must_use]
pub fn effective_rights_type(
    source: &ActivitySourceDefinition,
    activity_name: &str,
    rules: &DomainRules,
) -> ActivityRightsType {
    match source.rights_type {
        ActivityRightsType::NeedsLookup => rules.lookup_rights_type(activity_name),
        other => other,
    }
}

/// Whether `parcel` may receive the activity.
///
/// The parcel must be in `state` and not excluded by rights type. Universal
/// activities then apply to anything; others need the parcel's rights type
/// to match.
#[must_use]
pub fn is_compatible_activity(
    parcel: &Parcel,
    state: &str,
    source: &ActivitySourceDefinition,
    activity_name: &str,
    rules: &DomainRules,
) -> bool {
    if !parcel.is_in_state(state) {
        return false;
    }
    if rules.is_excluded(&parcel.state, &parcel.rights_type) {
        return false;
    }

    match effective_rights_type(source, activity_name, rules) {
        ActivityRightsType::Universal => true,
        rights_type => parcel
            .rights_type
            .trim()
            .eq_ignore_ascii_case(rights_type.as_ref()),
    }
}

/// Whether `record` is flagged inactive by its state's status column.
///
/// Only states with a configured status column are checked; a record
/// without that column is kept.
#[must_use]
pub fn is_inactive(state: &str, record: &ActivityRecord, rules: &DomainRules) -> bool {
    let Some(column) = rules.status_column(state) else {
        return false;
    };

    record
        .attributes
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .is_some_and(|(_, status)| status.trim() != rules.active_status)
}

#[cfg(test)]
mod tests {
    use parcel_fusion_parcel_models::AttributeMap;

    use super::*;

    fn source(rights_type: ActivityRightsType) -> ActivitySourceDefinition {
        ActivitySourceDefinition {
            name: "Leases".to_string(),
            location: "leases.geojson".to_string(),
            rights_type,
            use_name_as_activity: true,
            keep_cols: vec![],
            activity_name_appendage_col: None,
        }
    }

    #[test]
    fn rights_types_must_agree() {
        let rules = DomainRules::default();
        let surface = Parcel::new("1", "AZ", "Surface", None);
        let subsurface = Parcel::new("2", "AZ", "subsurface", None);
        let grazing = source(ActivityRightsType::Surface);

        assert!(is_compatible_activity(&surface, "AZ", &grazing, "Grazing", &rules));
        assert!(!is_compatible_activity(&subsurface, "AZ", &grazing, "Grazing", &rules));
    }

    #[test]
    fn universal_applies_to_any_rights_type() {
        let rules = DomainRules::default();
        let parcel = Parcel::new("1", "AZ", "surface+subsurface", None);
        let easement = source(ActivityRightsType::Universal);
        assert!(is_compatible_activity(&parcel, "AZ", &easement, "Easement", &rules));
    }

    #[test]
    fn lookup_resolves_by_activity_name() {
        let rules = DomainRules::default();
        let parcel = Parcel::new("1", "NM", "subsurface", None);
        let lookup = source(ActivityRightsType::NeedsLookup);

        assert!(is_compatible_activity(&parcel, "NM", &lookup, "Oil & Gas", &rules));
        assert!(!is_compatible_activity(&parcel, "NM", &lookup, "Grazing", &rules));
        assert!(is_compatible_activity(&parcel, "NM", &lookup, "Beekeeping", &rules));
    }

    #[test]
    fn other_states_never_match() {
        let rules = DomainRules::default();
        let parcel = Parcel::new("1", "NM", "surface", None);
        let any = source(ActivityRightsType::Universal);
        assert!(!is_compatible_activity(&parcel, "AZ", &any, "Easement", &rules));
        assert!(is_compatible_activity(&parcel, "nm", &any, "Easement", &rules));
    }

    #[test]
    fn washington_timber_never_matches() {
        let rules = DomainRules::default();
        let parcel = Parcel::new("1", "WA", "timber", None);
        let any = source(ActivityRightsType::Universal);
        assert!(!is_compatible_activity(&parcel, "WA", &any, "Easement", &rules));
    }

    #[test]
    fn status_column_flags_inactive_rows() {
        let rules = DomainRules::default();
        let mut attributes = AttributeMap::new();
        attributes.insert("Status".to_string(), "Cancelled".to_string());
        let cancelled = ActivityRecord::new(None, attributes.clone());
        attributes.insert("Status".to_string(), "Active".to_string());
        let active = ActivityRecord::new(None, attributes);

        assert!(is_inactive("MT", &cancelled, &rules));
        assert!(!is_inactive("MT", &active, &rules));
        assert!(!is_inactive("AZ", &cancelled, &rules));
        assert!(!is_inactive("ID", &ActivityRecord::default(), &rules));
    }
}
