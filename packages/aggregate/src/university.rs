//! Per-university summary of parcels attributed to land-grant universities.

use std::collections::{BTreeMap, BTreeSet};

use parcel_fusion_fusion::tribes::{extract_tribe_list, join_list, split_cession_numbers};
use parcel_fusion_parcel_models::Parcel;

use crate::round2;

/// Attribute naming the beneficiary university.
pub const UNIVERSITY_COLUMN: &str = "university";
/// Attribute holding the price paid for a parcel.
pub const PRICE_PAID_COLUMN: &str = "price_paid_for_parcel";
/// Attribute holding the parcel's land cession numbers.
pub const CESSION_NUMBERS_COLUMN: &str = "all_cession_numbers";
/// Suffix of attributes listing present-day tribes.
pub const PRESENT_DAY_TRIBE_SUFFIX: &str = "present_day_tribe";
/// Infix of attributes listing tribes named in land cessions.
pub const CESSION_TRIBE_INFIX: &str = "tribe_named_in_land_cessions";

/// One row of the by-university report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniversitySummary {
    pub university: String,
    /// GIS acres keyed by [`acres_column`] of the rights type.
    pub acres_by_rights_type: BTreeMap<String, f64>,
    pub price_paid: f64,
    pub present_day_tribes: BTreeSet<String>,
    pub tribes_named_in_cession: BTreeSet<String>,
    pub cessions: BTreeSet<String>,
}

impl UniversitySummary {
    fn new(university: &str) -> Self {
        Self {
            university: university.to_string(),
            ..Self::default()
        }
    }

    fn add(&mut self, parcel: &Parcel) {
        let acres = parcel.gis_acres.or(parcel.acres).unwrap_or_default();
        *self
            .acres_by_rights_type
            .entry(acres_column(&parcel.rights_type))
            .or_default() += acres;

        if let Some(price) = parcel
            .attribute(PRICE_PAID_COLUMN)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|price| price.is_finite())
        {
            self.price_paid += price;
        }

        for (column, value) in &parcel.attributes {
            if column.ends_with(PRESENT_DAY_TRIBE_SUFFIX) {
                self.present_day_tribes.extend(extract_tribe_list(value));
            }
            if column.contains(CESSION_TRIBE_INFIX) {
                self.tribes_named_in_cession.extend(extract_tribe_list(value));
            }
        }

        if let Some(numbers) = parcel.attribute(CESSION_NUMBERS_COLUMN) {
            self.cessions.extend(split_cession_numbers(numbers));
        }
    }

    fn finish(mut self) -> Self {
        for acres in self.acres_by_rights_type.values_mut() {
            *acres = round2(*acres);
        }
        self.price_paid = round2(self.price_paid);
        self
    }

    /// Present-day tribes joined with `;`.
    #[must_use]
    pub fn present_day_tribe(&self) -> String {
        join_list(&self.present_day_tribes)
    }

    /// Tribes named in cessions joined with `;`.
    #[must_use]
    pub fn tribes_named_in_cession_list(&self) -> String {
        join_list(&self.tribes_named_in_cession)
    }

    /// Cession numbers joined with `;`.
    #[must_use]
    pub fn all_cessions(&self) -> String {
        join_list(&self.cessions)
    }
}

/// Report column for acres of `rights_type`.
///
/// `+` becomes `_and_`; a blank rights type is `unknown_rights_type_acres`.
#[must_use]
pub fn acres_column(rights_type: &str) -> String {
    let rights_type = rights_type.trim();
    if rights_type.is_empty() {
        "unknown_rights_type_acres".to_string()
    } else {
        format!("{}_acres", rights_type.replace('+', "_and_"))
    }
}

/// Groups parcels by the university attribute and totals each group.
///
/// Parcels without a university are left out. Rows come back sorted by
/// university.
#[must_use]
pub fn summarize_universities(parcels: &[Parcel]) -> Vec<UniversitySummary> {
    let mut groups: BTreeMap<&str, UniversitySummary> = BTreeMap::new();

    for parcel in parcels {
        let Some(university) = parcel.attribute(UNIVERSITY_COLUMN) else {
            continue;
        };
        groups
            .entry(university)
            .or_insert_with(|| UniversitySummary::new(university))
            .add(parcel);
    }

    log::info!("Universities with parcels: {}", groups.len());

    groups.into_values().map(UniversitySummary::finish).collect()
}

/// Sorted union of every acres column used across `summaries`.
#[must_use]
pub fn acres_columns(summaries: &[UniversitySummary]) -> Vec<String> {
    summaries
        .iter()
        .flat_map(|summary| summary.acres_by_rights_type.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcel(
        university: Option<&str>,
        rights_type: &str,
        acres: f64,
        extra: &[(&str, &str)],
    ) -> Parcel {
        let mut parcel = Parcel::new("1", "WA", rights_type, None);
        parcel.gis_acres = Some(acres);
        if let Some(university) = university {
            parcel
                .attributes
                .insert(UNIVERSITY_COLUMN.to_string(), university.to_string());
        }
        for (column, value) in extra {
            parcel.attributes.insert((*column).to_string(), (*value).to_string());
        }
        parcel
    }

    #[test]
    fn acres_columns_are_named_by_rights_type() {
        assert_eq!(acres_column("surface"), "surface_acres");
        assert_eq!(acres_column("surface+subsurface"), "surface_and_subsurface_acres");
        assert_eq!(acres_column("  "), "unknown_rights_type_acres");
    }

    #[test]
    fn summarizes_per_university() {
        let parcels = vec![
            parcel(
                Some("Washington State University"),
                "surface",
                10.004,
                &[
                    ("present_day_tribe", "Nez Perce Tribe, Idaho;Spokane Tribe"),
                    ("tribe_named_in_land_cessions_1", "Nez Perce"),
                    (CESSION_NUMBERS_COLUMN, "364, 371"),
                    (PRICE_PAID_COLUMN, "12.5"),
                ],
            ),
            parcel(
                Some("Washington State University"),
                "surface",
                5.0,
                &[
                    ("tribe_2_present_day_tribe", "Nez Perce Tribe of Idaho"),
                    ("tribe_named_in_land_cessions_2", "Palouse"),
                    (CESSION_NUMBERS_COLUMN, "371 372"),
                    (PRICE_PAID_COLUMN, "n/a"),
                ],
            ),
            parcel(
                Some("Washington State University"),
                "",
                1.0,
                &[(PRICE_PAID_COLUMN, "7.254")],
            ),
            parcel(Some("University of Idaho"), "surface+subsurface", 3.0, &[]),
            parcel(None, "surface", 100.0, &[]),
        ];

        let summaries = summarize_universities(&parcels);
        assert_eq!(summaries.len(), 2);

        let idaho = &summaries[0];
        assert_eq!(idaho.university, "University of Idaho");
        assert_eq!(idaho.acres_by_rights_type["surface_and_subsurface_acres"], 3.0);
        assert_eq!(idaho.all_cessions(), "");

        let wsu = &summaries[1];
        assert_eq!(wsu.acres_by_rights_type["surface_acres"], 15.0);
        assert_eq!(wsu.acres_by_rights_type["unknown_rights_type_acres"], 1.0);
        assert_eq!(wsu.price_paid, 19.75);
        assert_eq!(wsu.present_day_tribe(), "Nez Perce Tribe of Idaho;Spokane Tribe");
        assert_eq!(wsu.present_day_tribes.len(), 2);
        assert_eq!(wsu.tribes_named_in_cession_list(), "Nez Perce;Palouse");
        assert_eq!(wsu.all_cessions(), "364;371;372");

        assert_eq!(
            acres_columns(&summaries),
            [
                "surface_acres",
                "surface_and_subsurface_acres",
                "unknown_rights_type_acres"
            ]
        );
    }
}
