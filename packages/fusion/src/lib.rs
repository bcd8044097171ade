#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Folding matched attributes into parcel records.
//!
//! Every merge here is a set union followed by a deterministic join, so the
//! order in which parallel batches or activity sources finish never shows
//! up in the output.

pub mod lessee;
pub mod tribes;

use std::collections::{BTreeMap, BTreeSet};

use parcel_fusion_parcel_models::Parcel;
use thiserror::Error;

/// Separator of the `activity` field.
pub const ACTIVITY_SEPARATOR: &str = ",";

/// Separator of the `activity_info` field.
pub const ACTIVITY_INFO_SEPARATOR: &str = "\n";

/// Whole-field values that mean "no data".
const EMPTY_SENTINELS: &[&str] = &["nan", "none", "null"];

/// Errors that abort fusion for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FusionError {
    /// A bundle entry has no activity name. Signals a broken mapping table.
    #[error("Undefined activity name for parcel row {row} in {state}")]
    UndefinedActivityName {
        /// Parcel row.
        row: usize,
        /// State being matched.
        state: String,
    },

    /// A bundle refers to a parcel row that does not exist.
    #[error("Bundle refers to unknown parcel row {row} ({len} parcels)")]
    UnknownRow {
        /// Parcel row.
        row: usize,
        /// Number of parcels.
        len: usize,
    },
}

/// How [`combine_delimited_list_with`] orders the merged tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Lexicographic order.
    #[default]
    Sorted,
    /// First appearance, `existing` before `update`.
    Insertion,
}

/// Whether a whole field value stands for "no data".
#[must_use]
pub fn is_empty_value(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || EMPTY_SENTINELS.iter().any(|s| value.eq_ignore_ascii_case(s))
}

/// Non-empty, trimmed tokens of a delimited field.
pub fn split_tokens<'a>(value: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    let value = if is_empty_value(value) { "" } else { value };
    value
        .split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Unions the tokens of `existing` and `update` and joins them sorted.
///
/// ```
/// use parcel_fusion_fusion::combine_delimited_list;
///
/// assert_eq!(
///     combine_delimited_list("Oil & Gas", "Grazing Lease,Oil & Gas", ","),
///     "Grazing Lease,Oil & Gas"
/// );
/// assert_eq!(combine_delimited_list("nan", "", ","), "");
/// ```
#[must_use]
pub fn combine_delimited_list(existing: &str, update: &str, separator: &str) -> String {
    combine_delimited_list_with(existing, update, separator, SortOrder::Sorted)
}

/// [`combine_delimited_list`] with an explicit ordering.
#[must_use]
pub fn combine_delimited_list_with(
    existing: &str,
    update: &str,
    separator: &str,
    order: SortOrder,
) -> String {
    let tokens = split_tokens(existing, separator).chain(split_tokens(update, separator));

    match order {
        SortOrder::Sorted => tokens
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(separator),
        SortOrder::Insertion => {
            let mut seen = BTreeSet::new();
            tokens
                .filter(|token| seen.insert(*token))
                .collect::<Vec<_>>()
                .join(separator)
        }
    }
}

/// One (activity name, formatted info) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityEntry {
    /// Resolved activity name.
    pub name: String,
    /// Formatted info block, when the source has lessee/status columns.
    pub info: Option<String>,
}

impl ActivityEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, info: Option<String>) -> Self {
        Self {
            name: name.into(),
            info,
        }
    }
}

/// Set of activity entries for one parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityBundle(BTreeSet<ActivityEntry>);

impl ActivityBundle {
    /// Adds an entry. Duplicates collapse.
    pub fn insert(&mut self, entry: ActivityEntry) -> bool {
        self.0.insert(entry)
    }

    /// Unions `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.0.iter()
    }

    /// Activity names joined for the `activity` field.
    #[must_use]
    pub fn joined_names(&self) -> String {
        let names: BTreeSet<&str> = self.0.iter().map(|e| e.name.trim()).collect();
        names.into_iter().collect::<Vec<_>>().join(ACTIVITY_SEPARATOR)
    }

    /// Info blocks joined for the `activity_info` field.
    #[must_use]
    pub fn joined_info(&self) -> String {
        let infos: BTreeSet<&str> = self
            .0
            .iter()
            .filter_map(|e| e.info.as_deref())
            .map(str::trim)
            .filter(|info| !info.is_empty())
            .collect();
        infos
            .into_iter()
            .collect::<Vec<_>>()
            .join(ACTIVITY_INFO_SEPARATOR)
    }
}

impl FromIterator<ActivityEntry> for ActivityBundle {
    fn from_iter<I: IntoIterator<Item = ActivityEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Activity bundles keyed by parcel row.
///
/// [`BundleMap::merge`] is associative and commutative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMap(BTreeMap<usize, ActivityBundle>);

impl BundleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one entry for `row`.
    pub fn insert(&mut self, row: usize, entry: ActivityEntry) {
        self.0.entry(row).or_default().insert(entry);
    }

    /// Unions every bundle of `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        for (row, bundle) in other.0 {
            self.0.entry(row).or_default().merge(bundle);
        }
    }

    /// Bundle for `row`, if any.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<&ActivityBundle> {
        self.0.get(&row)
    }

    /// Number of parcels with a bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ActivityBundle)> {
        self.0.iter().map(|(row, bundle)| (*row, bundle))
    }
}

/// Writes accumulated bundles into the parcels they belong to.
///
/// Validates every bundle before touching any parcel, so a failure leaves
/// `parcels` unchanged. Returns the number of parcels updated.
///
/// # Errors
///
/// * [`FusionError::UnknownRow`] if a bundle row is out of range
/// * [`FusionError::UndefinedActivityName`] if an entry name is blank
pub fn apply_bundles(parcels: &mut [Parcel], bundles: &BundleMap) -> Result<usize, FusionError> {
    for (row, bundle) in bundles.iter() {
        if row >= parcels.len() {
            return Err(FusionError::UnknownRow {
                row,
                len: parcels.len(),
            });
        }
        if bundle.iter().any(|entry| entry.name.trim().is_empty()) {
            return Err(FusionError::UndefinedActivityName {
                row,
                state: parcels[row].state.clone(),
            });
        }
    }

    let mut updated = 0;
    for (row, bundle) in bundles.iter() {
        if bundle.is_empty() {
            continue;
        }
        let parcel = &mut parcels[row];

        parcel.activity =
            combine_delimited_list(&parcel.activity, &bundle.joined_names(), ACTIVITY_SEPARATOR);
        parcel.activity_info = combine_delimited_list(
            &parcel.activity_info,
            &bundle.joined_info(),
            ACTIVITY_INFO_SEPARATOR,
        );
        updated += 1;
    }

    log::debug!("Applied activity bundles to {updated} parcels");

    Ok(updated)
}

/// Clears `activity_info` ahead of a full matching pass.
///
/// Info blocks are always rebuilt from scratch; activity names are kept and
/// extended.
pub fn reset_activity_info(parcels: &mut [Parcel]) {
    for parcel in parcels {
        parcel.activity_info.clear();
    }
}
