//! `GeoJSON` reading and writing for activity layers and parcel collections.
//!
//! Property values are normalized to strings on the way in: integral
//! numbers lose their trailing `.0`, nulls are dropped and nested values
//! keep their JSON text. The collection CRS comes from the legacy `crs`
//! foreign member and defaults to WGS 84.

use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use parcel_fusion_parcel_models::{
    ActivityLayer, ActivityRecord, AttributeMap, Crs, Parcel, PlssLocation, columns,
};

use crate::SourceError;

const CRS_MEMBER: &str = "crs";

/// A parcel collection with its CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelCollection {
    /// CRS of every parcel geometry.
    pub crs: Crs,
    /// Parcels in file order.
    pub parcels: Vec<Parcel>,
}

/// Parses a feature collection into an activity layer.
///
/// # Errors
///
/// * If the text is not valid `GeoJSON`
/// * If the document is not a feature collection
/// * If a feature geometry cannot be converted
pub fn layer_from_geojson(
    text: &str,
    state: &str,
    source_name: &str,
) -> Result<ActivityLayer, SourceError> {
    let collection = parse_collection(text, source_name)?;
    let crs = collection_crs(&collection);

    let records = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let (geometry, attributes) = split_feature(index, feature)?;
            Ok(ActivityRecord::new(geometry, attributes))
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(ActivityLayer {
        state: state.to_string(),
        source_name: source_name.to_string(),
        crs,
        records,
    })
}

/// Serializes an activity layer as a feature collection.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if serialization fails.
pub fn layer_to_geojson(layer: &ActivityLayer) -> Result<String, SourceError> {
    let features = layer
        .records
        .iter()
        .map(|record| {
            let properties = record
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect();
            build_feature(record.geometry.as_ref(), properties)
        })
        .collect();

    Ok(serde_json::to_string(&build_collection(features, &layer.crs))?)
}

/// Parses a feature collection of parcels.
///
/// Canonical columns populate the typed fields, everything else lands in
/// [`Parcel::attributes`]. A feature without `object_id` gets its position
/// as identifier.
///
/// # Errors
///
/// * If the text is not valid `GeoJSON`
/// * If the document is not a feature collection
/// * If a feature geometry cannot be converted
pub fn parcels_from_geojson(text: &str) -> Result<ParcelCollection, SourceError> {
    let collection = parse_collection(text, "parcels")?;
    let crs = collection_crs(&collection);

    let parcels = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let (geometry, attributes) = split_feature(index, feature)?;
            Ok(parcel_from_attributes(index, geometry, attributes))
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(ParcelCollection { crs, parcels })
}

/// Serializes parcels as a feature collection.
///
/// `activity` and `activity_info` are always written as strings.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if serialization fails.
pub fn parcels_to_geojson(parcels: &[Parcel], crs: &Crs) -> Result<String, SourceError> {
    let features = parcels
        .iter()
        .map(|parcel| build_feature(parcel.geometry.as_ref(), parcel_properties(parcel)))
        .collect();

    Ok(serde_json::to_string(&build_collection(features, crs))?)
}

/// Reads a parcel `GeoJSON` file.
///
/// # Errors
///
/// * If the file cannot be read
/// * If the document cannot be parsed
pub async fn read_parcels_geojson(path: &Path) -> Result<ParcelCollection, SourceError> {
    let text = tokio::fs::read_to_string(path).await?;
    let collection = parcels_from_geojson(&text)?;
    log::info!(
        "Read {} parcels ({}) from {}",
        collection.parcels.len(),
        collection.crs,
        path.display(),
    );
    Ok(collection)
}

/// Writes parcels to a `GeoJSON` file, creating parent directories.
///
/// # Errors
///
/// * If serialization fails
/// * If the file cannot be written
pub async fn write_parcels_geojson(
    path: &Path,
    parcels: &[Parcel],
    crs: &Crs,
) -> Result<(), SourceError> {
    let text = parcels_to_geojson(parcels, crs)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    log::info!("Wrote {} parcels to {}", parcels.len(), path.display());
    Ok(())
}

/// String form of a `GeoJSON` property value; `None` for null.
#[must_use]
pub fn property_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(number_string(n)),
        JsonValue::Array(_) | JsonValue::Object(_) => Some(value.to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn parse_collection(text: &str, location: &str) -> Result<FeatureCollection, SourceError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(SourceError::NotAFeatureCollection {
            location: location.to_string(),
        }),
    }
}

fn collection_crs(collection: &FeatureCollection) -> Crs {
    collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get(CRS_MEMBER))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str)
        .map_or_else(Crs::wgs84, Crs::new)
}

fn split_feature(
    index: usize,
    feature: Feature,
) -> Result<(Option<geo::Geometry<f64>>, AttributeMap), SourceError> {
    let geometry = feature
        .geometry
        .map(geo::Geometry::<f64>::try_from)
        .transpose()
        .map_err(|e| SourceError::InvalidFeature {
            index,
            message: e.to_string(),
        })?;

    let attributes = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| property_string(&v).map(|v| (k, v)))
        .collect();

    Ok((geometry, attributes))
}

fn build_feature(geometry: Option<&geo::Geometry<f64>>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: geometry.map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn build_collection(features: Vec<Feature>, crs: &Crs) -> FeatureCollection {
    let mut members = JsonObject::new();
    members.insert(
        CRS_MEMBER.to_string(),
        serde_json::json!({ "type": "name", "properties": { "name": crs.as_str() } }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    }
}

fn parcel_from_attributes(
    index: usize,
    geometry: Option<geo::Geometry<f64>>,
    mut attributes: AttributeMap,
) -> Parcel {
    let mut take = |column: &str| {
        attributes
            .remove(column)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let object_id = take(columns::OBJECT_ID).unwrap_or_else(|| index.to_string());
    let state = take(columns::STATE).unwrap_or_default();
    let rights_type = take(columns::RIGHTS_TYPE).unwrap_or_default();
    let mut parcel = Parcel::new(object_id, state, rights_type, geometry);

    parcel.managing_agency = take(columns::MANAGING_AGENCY);
    parcel.state_enabling_act = take(columns::STATE_ENABLING_ACT);
    parcel.trust_name = take(columns::TRUST_NAME);
    parcel.reservation_name = take(columns::RESERVATION_NAME);
    parcel.rights_type_info = take(columns::RIGHTS_TYPE_INFO);
    parcel.acres = take(columns::ACRES).and_then(|v| v.parse().ok());
    parcel.gis_acres = take(columns::GIS_ACRES).and_then(|v| v.parse().ok());
    parcel.net_acres = take(columns::NET_ACRES).and_then(|v| v.parse().ok());
    parcel.clipped_acres = take(columns::CLIPPED_ACRES).and_then(|v| v.parse().ok());
    parcel.location = PlssLocation {
        county: take(columns::COUNTY),
        meridian: take(columns::MERIDIAN),
        township: take(columns::TOWNSHIP),
        range: take(columns::RANGE),
        section: take(columns::SECTION),
        aliquot: take(columns::ALIQUOT),
    };
    parcel.activity = take(columns::ACTIVITY).unwrap_or_default();
    parcel.activity_info = take(columns::ACTIVITY_INFO).unwrap_or_default();
    parcel.attributes = attributes;

    parcel
}

fn parcel_properties(parcel: &Parcel) -> JsonObject {
    fn text(value: Option<&String>) -> JsonValue {
        value.map_or(JsonValue::Null, |v| JsonValue::String(v.clone()))
    }
    fn number(value: Option<f64>) -> JsonValue {
        value
            .and_then(serde_json::Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number)
    }

    let mut properties: JsonObject = parcel
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();

    let location = &parcel.location;
    let canonical = [
        (columns::OBJECT_ID, JsonValue::String(parcel.object_id.clone())),
        (columns::STATE, JsonValue::String(parcel.state.clone())),
        (columns::MANAGING_AGENCY, text(parcel.managing_agency.as_ref())),
        (columns::STATE_ENABLING_ACT, text(parcel.state_enabling_act.as_ref())),
        (columns::TRUST_NAME, text(parcel.trust_name.as_ref())),
        (columns::RESERVATION_NAME, text(parcel.reservation_name.as_ref())),
        (columns::RIGHTS_TYPE, JsonValue::String(parcel.rights_type.clone())),
        (columns::RIGHTS_TYPE_INFO, text(parcel.rights_type_info.as_ref())),
        (columns::ACRES, number(parcel.acres)),
        (columns::GIS_ACRES, number(parcel.gis_acres)),
        (columns::NET_ACRES, number(parcel.net_acres)),
        (columns::CLIPPED_ACRES, number(parcel.clipped_acres)),
        (columns::ACTIVITY, JsonValue::String(parcel.activity.clone())),
        (columns::ACTIVITY_INFO, JsonValue::String(parcel.activity_info.clone())),
        (columns::COUNTY, text(location.county.as_ref())),
        (columns::MERIDIAN, text(location.meridian.as_ref())),
        (columns::TOWNSHIP, text(location.township.as_ref())),
        (columns::RANGE, text(location.range.as_ref())),
        (columns::SECTION, text(location.section.as_ref())),
        (columns::ALIQUOT, text(location.aliquot.as_ref())),
    ];
    for (column, value) in canonical {
        properties.insert(column.to_string(), value);
    }

    properties
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, polygon};
    use serde_json::json;

    use super::*;

    fn square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ])
    }

    #[test]
    fn normalizes_property_values() {
        assert_eq!(property_string(&json!(null)), None);
        assert_eq!(property_string(&json!("Active")).as_deref(), Some("Active"));
        assert_eq!(property_string(&json!(12)).as_deref(), Some("12"));
        assert_eq!(property_string(&json!(12.0)).as_deref(), Some("12"));
        assert_eq!(property_string(&json!(12.5)).as_deref(), Some("12.5"));
        assert_eq!(property_string(&json!(true)).as_deref(), Some("true"));
    }

    #[test]
    fn reads_layer_with_crs_member() {
        let text = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::5070" } },
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                    "properties": { "STATUS": "Active", "CODE": 3.0, "EMPTY": null }
                },
                { "type": "Feature", "geometry": null, "properties": null }
            ]
        })
        .to_string();

        let layer = layer_from_geojson(&text, "MT", "Oil and Gas").unwrap();
        assert_eq!(layer.len(), 2);
        assert!(layer.crs.same_as(&Crs::conus_albers()));
        assert_eq!(layer.records[0].get("CODE"), Some("3"));
        assert!(!layer.records[0].attributes.contains_key("EMPTY"));
        assert!(layer.records[1].geometry.is_none());
    }

    #[test]
    fn missing_crs_defaults_to_wgs84() {
        let text = r#"{"type": "FeatureCollection", "features": []}"#;
        let layer = layer_from_geojson(text, "AZ", "Grazing").unwrap();
        assert!(layer.is_empty());
        assert!(layer.crs.same_as(&Crs::wgs84()));
    }

    #[test]
    fn rejects_non_collections() {
        let text = r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#;
        assert!(matches!(
            layer_from_geojson(text, "AZ", "Grazing"),
            Err(SourceError::NotAFeatureCollection { .. })
        ));
    }

    #[test]
    fn parcels_survive_a_write_and_read() {
        let mut parcel = Parcel::new("P1", "AZ", "surface", Some(square()));
        parcel.trust_name = Some("Common Schools".to_string());
        parcel.gis_acres = Some(640.0);
        parcel.location.township = Some("T12N".to_string());
        parcel.activity = "Grazing".to_string();
        parcel.attributes.insert("LEGACY_ID".to_string(), "A-77".to_string());

        let text = parcels_to_geojson(std::slice::from_ref(&parcel), &Crs::conus_albers()).unwrap();
        let collection = parcels_from_geojson(&text).unwrap();

        assert!(collection.crs.same_as(&Crs::conus_albers()));
        assert_eq!(collection.parcels, vec![parcel]);
    }

    #[test]
    fn parcel_without_object_id_uses_position() {
        let text = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null, "properties": { "state": "NM", "acres": "40.5" } }
            ]
        })
        .to_string();

        let collection = parcels_from_geojson(&text).unwrap();
        let parcel = &collection.parcels[0];
        assert_eq!(parcel.object_id, "0");
        assert_eq!(parcel.state, "NM");
        assert_eq!(parcel.acres, Some(40.5));
        assert!(parcel.attributes.is_empty());
    }

    #[tokio::test]
    async fn writes_and_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("parcels.geojson");
        let parcels = vec![Parcel::new("P9", "WI", "surface", Some(square()))];

        write_parcels_geojson(&path, &parcels, &Crs::wgs84()).await.unwrap();
        let collection = read_parcels_geojson(&path).await.unwrap();
        assert_eq!(collection.parcels, parcels);
    }
}
