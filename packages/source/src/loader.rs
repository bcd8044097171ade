//! Activity layer loaders.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parcel_fusion_parcel_models::ActivityLayer;

use crate::{SourceError, config::ActivitySourceDefinition, geojson_io::layer_from_geojson};

/// Materializes the features of one activity source.
///
/// Implementations may read local files, call remote services or serve
/// from a cache. A returned layer always has at least one feature.
#[async_trait]
pub trait ActivitySourceLoader: Send + Sync {
    /// Loads `source` for `state`.
    ///
    /// # Errors
    ///
    /// * If the source cannot be read or parsed
    /// * If the source has no features
    async fn load(
        &self,
        state: &str,
        source: &ActivitySourceDefinition,
    ) -> Result<ActivityLayer, SourceError>;
}

/// Reads `GeoJSON` layers relative to an activities directory.
#[derive(Debug, Clone)]
pub struct GeoJsonFileLoader {
    base_dir: PathBuf,
}

impl GeoJsonFileLoader {
    /// Creates a loader rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory source locations are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Full path of a source location.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedLocation`] for URLs.
    pub fn resolve(&self, location: &str) -> Result<PathBuf, SourceError> {
        if is_remote(location) {
            return Err(SourceError::UnsupportedLocation {
                location: location.to_string(),
            });
        }
        Ok(self.base_dir.join(location))
    }
}

#[async_trait]
impl ActivitySourceLoader for GeoJsonFileLoader {
    async fn load(
        &self,
        state: &str,
        source: &ActivitySourceDefinition,
    ) -> Result<ActivityLayer, SourceError> {
        let path = self.resolve(&source.location)?;
        log::debug!("[{state}] Reading {} from {}", source.name, path.display());

        let text = tokio::fs::read_to_string(&path).await?;
        let layer = layer_from_geojson(&text, state, &source.name)?;
        if layer.is_empty() {
            return Err(SourceError::MissingFeatures {
                location: path.display().to_string(),
            });
        }

        log::info!(
            "[{state}] Loaded {} features for {} ({})",
            layer.len(),
            source.name,
            layer.crs,
        );
        Ok(layer)
    }
}

fn is_remote(location: &str) -> bool {
    let lower = location.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use parcel_fusion_parcel_models::ActivityRightsType;

    use super::*;

    fn definition(location: &str) -> ActivitySourceDefinition {
        ActivitySourceDefinition {
            name: "Grazing Lease".to_string(),
            location: location.to_string(),
            rights_type: ActivityRightsType::Surface,
            use_name_as_activity: true,
            keep_cols: vec![],
            activity_name_appendage_col: None,
        }
    }

    #[tokio::test]
    async fn loads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("AZ")).unwrap();
        std::fs::write(
            dir.path().join("AZ").join("grazing.geojson"),
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]},
                 "properties": {"LESSEE": "Ranch Co"}}
            ]}"#,
        )
        .unwrap();

        let loader = GeoJsonFileLoader::new(dir.path());
        let layer = loader
            .load("AZ", &definition("AZ/grazing.geojson"))
            .await
            .unwrap();

        assert_eq!(layer.state, "AZ");
        assert_eq!(layer.source_name, "Grazing Lease");
        assert_eq!(layer.records[0].get("LESSEE"), Some("Ranch Co"));
    }

    #[tokio::test]
    async fn empty_layers_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("empty.geojson"),
            r#"{"type": "FeatureCollection", "features": []}"#,
        )
        .unwrap();

        let loader = GeoJsonFileLoader::new(dir.path());
        let result = loader.load("AZ", &definition("empty.geojson")).await;
        assert!(matches!(result, Err(SourceError::MissingFeatures { .. })));
    }

    #[tokio::test]
    async fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = GeoJsonFileLoader::new(dir.path());
        let result = loader.load("AZ", &definition("nope.geojson")).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    #[test]
    fn urls_are_unsupported() {
        let loader = GeoJsonFileLoader::new("/data");
        assert!(matches!(
            loader.resolve("HTTPS://example.com/layer.geojson"),
            Err(SourceError::UnsupportedLocation { .. })
        ));
        assert_eq!(
            loader.resolve("AZ/a.geojson").unwrap(),
            PathBuf::from("/data/AZ/a.geojson")
        );
    }
}
