//! Cleaning passes applied to the fused parcel dataset.

use parcel_fusion_fusion::lessee::{concatenate_activity_info, parse_lessee};
use parcel_fusion_parcel_models::{Parcel, columns};

/// Column carrying the object id used to recognise river slivers.
pub const RIVER_SLIVER_ID_COLUMN: &str = "object_id_LAST";

/// Object ids of sliver parcels along state-line rivers.
pub const RIVER_SLIVER_OBJECT_IDS: &[u32] = &[
    12031, 11931, 11799, 12096, 12099, 11937, 11824, 12098, 11930, 11934, 11936, 12097, 11933,
    11932, 11926, 11927, 11836, 12084, 11830, 11829, 11834, 11833, 11832, 589, 588, 594, 33924,
    34346, 34350, 34355, 34352, 34348, 34117, 34345, 34121,
];

/// Smallest clipped acreage kept by [`filter_parcels_by_acreage`].
pub const MIN_CLIPPED_ACRES: f64 = 10.0;

/// Column holding a second activity info field to fold into `activity_info`.
pub const SECONDARY_ACTIVITY_INFO_COLUMN: &str = "activity_info_2";

/// (state, reservation) pairs always dropped by the acreage filter.
const EXCLUDED_RESERVATIONS: &[(&str, &str)] = &[("WY", "Crow")];

/// Drops parcels whose rights type is timber.
#[must_use]
pub fn remove_timber_rows(parcels: Vec<Parcel>) -> Vec<Parcel> {
    retain_logged(parcels, "timber", |parcel| {
        !parcel.rights_type.trim().eq_ignore_ascii_case("timber")
    })
}

/// Drops the known river sliver parcels.
///
/// Ids are read from [`RIVER_SLIVER_ID_COLUMN`]; parcels without it are kept.
#[must_use]
pub fn remove_river_slivers(parcels: Vec<Parcel>) -> Vec<Parcel> {
    retain_logged(parcels, "river sliver", |parcel| {
        !parcel
            .attribute(RIVER_SLIVER_ID_COLUMN)
            .and_then(parse_object_id)
            .is_some_and(|id| RIVER_SLIVER_OBJECT_IDS.contains(&id))
    })
}

/// Keeps parcels with at least `min_acres` clipped acres, minus the excluded
/// reservations.
#[must_use]
pub fn filter_parcels_by_acreage(parcels: Vec<Parcel>, min_acres: f64) -> Vec<Parcel> {
    retain_logged(parcels, "small or excluded", |parcel| {
        let large_enough = parcel.clipped_acres.is_some_and(|acres| acres >= min_acres);
        let excluded = parcel.reservation_name.as_deref().is_some_and(|name| {
            EXCLUDED_RESERVATIONS
                .iter()
                .any(|(state, reservation)| parcel.is_in_state(state) && name == *reservation)
        });
        large_enough && !excluded
    })
}

/// Folds [`SECONDARY_ACTIVITY_INFO_COLUMN`] into `activity_info` and removes
/// the column.
pub fn join_activity_info(parcels: &mut [Parcel]) {
    for parcel in parcels {
        if let Some(secondary) = parcel.attributes.remove(SECONDARY_ACTIVITY_INFO_COLUMN) {
            parcel.activity_info = concatenate_activity_info(&parcel.activity_info, &secondary);
        }
    }
}

/// Sets the `lessee` attribute from the active blocks of `activity_info`.
pub fn fill_lessees(parcels: &mut [Parcel]) {
    for parcel in parcels {
        let lessee = parse_lessee(&parcel.activity_info);
        if lessee.is_empty() {
            parcel.attributes.remove(columns::LESSEE);
        } else {
            parcel.attributes.insert(columns::LESSEE.to_string(), lessee);
        }
    }
}

/// Forced casing of a keyword in [`pascal_case`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordCase {
    Lower,
    Upper,
}

/// Capitalizes each space-separated word of `value`.
///
/// Keywords (matched lowercase) get their forced casing. A leading `(` is
/// kept and the rest capitalized; hyphenated and slash-separated parts are
/// capitalized individually.
#[must_use]
pub fn pascal_case(value: &str, keywords: &[(&str, KeywordCase)]) -> String {
    value
        .split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            if let Some((_, case)) = keywords.iter().find(|(keyword, _)| *keyword == lower) {
                return match case {
                    KeywordCase::Lower => lower,
                    KeywordCase::Upper => word.to_uppercase(),
                };
            }
            if let Some(rest) = word.strip_prefix('(') {
                format!("({}", capitalize(rest))
            } else if word.contains('-') {
                word.split('-').map(capitalize).collect::<Vec<_>>().join("-")
            } else if word.contains('/') {
                word.split('/').map(capitalize).collect::<Vec<_>>().join("/")
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes trust names for the states whose sources publish them in
/// inconsistent casing.
pub fn fix_trust_names(parcels: &mut [Parcel]) {
    for parcel in parcels {
        let state = parcel.state.trim().to_ascii_uppercase();
        let Some(trust_name) = parcel.trust_name.take() else {
            continue;
        };

        let fixed = match state.as_str() {
            "ND" => {
                let name = pascal_case(
                    &trust_name.replace("ÔøΩ", " "),
                    &[
                        ("of", KeywordCase::Lower),
                        ("the", KeywordCase::Lower),
                        ("for", KeywordCase::Lower),
                        ("nd", KeywordCase::Upper),
                    ],
                );
                if name == "Bank of North Dakota" {
                    "Strategic Investment and Improvement Fund".to_string()
                } else {
                    name
                }
            }
            "MN" => pascal_case(&trust_name, &[]),
            "AZ" => pascal_case(&trust_name, &[("of", KeywordCase::Lower)]),
            _ => trust_name,
        };

        parcel.trust_name = Some(fixed);
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_object_id(value: &str) -> Option<u32> {
    let value = value.trim();
    value.parse::<u32>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|id| id.is_finite() && *id >= 0.0 && id.fract() == 0.0)
            .map(|id| id as u32)
    })
}

fn retain_logged(
    parcels: Vec<Parcel>,
    label: &str,
    keep: impl Fn(&Parcel) -> bool,
) -> Vec<Parcel> {
    let before = parcels.len();
    let kept: Vec<Parcel> = parcels.into_iter().filter(|parcel| keep(parcel)).collect();
    log::info!("Removed {} {label} parcels", before - kept.len());
    kept
}
