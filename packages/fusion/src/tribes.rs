//! Tribe-name and cession-number list fusion for summary reports.

use std::collections::BTreeSet;

use crate::is_empty_value;

/// Separator of tribe lists and cession-number lists in reports.
pub const LIST_SEPARATOR: &str = ";";

/// Known alternate spellings of tribal names and their canonical form.
pub const TRIBE_ALIASES: &[(&str, &str)] = &[
    (
        "Bridgeport Indian Colony, California",
        "Bridgeport Paiute Indian Colony of California",
    ),
    (
        "Burns Paiute Tribe, Oregon",
        "Burns Paiute Tribe of the Burns Paiute Indian Colony of Oregon",
    ),
    (
        "Confederated Tribes and Bands of the Yakama Nation",
        "Confederated Tribes and Bands of the Yakama Nation, Washington",
    ),
    ("Nez Perce Tribe, Idaho", "Nez Perce Tribe of Idaho"),
    (
        "Quinault Indian Nation, Washington",
        "Quinault Tribe of the Quinault Reservation, Washington",
    ),
    (
        "Confederated Tribes of the Umatilla Reservation, Oregon",
        "Confederated Tribes of the Umatilla Indian Reservation, Oregon",
    ),
    (
        "Shoshone-Bannock Tribes of the Fort Hall Reservation, Idaho",
        "Shoshone-Bannock Tribes of the Fort Hall Reservation of Idaho",
    ),
];

/// Canonical spelling of a tribe name.
#[must_use]
pub fn canonical_tribe_name(name: &str) -> &str {
    let name = name.trim();
    TRIBE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| canonical)
}

/// Canonical tribe names in a `;`-separated field.
#[must_use]
pub fn extract_tribe_list(value: &str) -> BTreeSet<String> {
    if is_empty_value(value) {
        return BTreeSet::new();
    }
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| canonical_tribe_name(name).to_string())
        .collect()
}

/// Joins a tribe set for output.
#[must_use]
pub fn join_list(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Unions two tribe fields after canonicalization.
#[must_use]
pub fn combine_tribe_names(existing: &str, update: &str) -> String {
    let mut tribes = extract_tribe_list(existing);
    tribes.extend(extract_tribe_list(update));
    join_list(&tribes)
}

/// Cession numbers in a field separated by commas, semicolons or spaces.
#[must_use]
pub fn split_cession_numbers(value: &str) -> BTreeSet<String> {
    if is_empty_value(value) {
        return BTreeSet::new();
    }
    value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|number| !number.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Unions two cession-number fields.
#[must_use]
pub fn combine_cession_numbers(existing: &str, update: &str) -> String {
    let mut numbers = split_cession_numbers(existing);
    numbers.extend(split_cession_numbers(update));
    join_list(&numbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_collapse_to_canonical() {
        let merged = combine_tribe_names(
            "Burns Paiute Tribe, Oregon",
            "Burns Paiute Tribe of the Burns Paiute Indian Colony of Oregon",
        );
        assert_eq!(
            merged,
            "Burns Paiute Tribe of the Burns Paiute Indian Colony of Oregon"
        );
    }

    #[test]
    fn unknown_names_pass_through() {
        assert_eq!(canonical_tribe_name("  Hopi Tribe of Arizona "), "Hopi Tribe of Arizona");
    }

    #[test]
    fn tribe_lists_are_sorted_sets() {
        let tribes = extract_tribe_list("Zuni Tribe; Hopi Tribe;;Zuni Tribe");
        assert_eq!(join_list(&tribes), "Hopi Tribe;Zuni Tribe");
        assert!(extract_tribe_list("nan").is_empty());
    }

    #[test]
    fn cession_numbers_split_on_any_separator() {
        assert_eq!(combine_cession_numbers("371, 372", "372 373"), "371;372;373");
        assert_eq!(combine_cession_numbers("371;372", ""), "371;372");
        assert_eq!(combine_cession_numbers("", "None"), "");
    }

    #[test]
    fn combining_is_idempotent() {
        let once = combine_tribe_names("Nez Perce Tribe, Idaho", "Hopi Tribe");
        assert_eq!(combine_tribe_names(&once, "Hopi Tribe"), once);
    }
}
