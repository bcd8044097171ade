//! Caching of loaded activity layers.
//!
//! Layers are stored as serialized `GeoJSON` under the hex SHA-256 digest
//! of their source location.

use std::{collections::BTreeMap, path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use parcel_fusion_parcel_models::ActivityLayer;
use sha2::{Digest, Sha256};

use crate::{
    SourceError,
    config::ActivitySourceDefinition,
    geojson_io::{layer_from_geojson, layer_to_geojson},
    loader::ActivitySourceLoader,
};

/// Cache key of a source location.
#[must_use]
pub fn cache_key(location: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(location.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Key/value store of serialized layers.
#[async_trait]
pub trait ActivityCache: Send + Sync {
    /// Returns the stored layer text, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, SourceError>;

    /// Stores layer text under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), SourceError>;
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ActivityCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, SourceError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("memory cache lock poisoned"))?
            .get(key)
            .cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), SourceError> {
        self.entries
            .lock()
            .map_err(|_| std::io::Error::other("memory cache lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.geojson` file per layer in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    /// Creates a cache in `dir`; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.geojson"))
    }
}

#[async_trait]
impl ActivityCache for DirectoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, SourceError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), SourceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }
}

/// Serves layers from a cache, falling back to an inner loader.
///
/// Cache failures are logged and never fail a load.
pub struct CachedLoader<L> {
    inner: L,
    cache: Box<dyn ActivityCache>,
}

impl<L: ActivitySourceLoader> CachedLoader<L> {
    /// Wraps `inner` with `cache`.
    pub fn new(inner: L, cache: impl ActivityCache + 'static) -> Self {
        Self {
            inner,
            cache: Box::new(cache),
        }
    }
}

#[async_trait]
impl<L: ActivitySourceLoader> ActivitySourceLoader for CachedLoader<L> {
    async fn load(
        &self,
        state: &str,
        source: &ActivitySourceDefinition,
    ) -> Result<ActivityLayer, SourceError> {
        let key = cache_key(&source.location);

        match self.cache.get(&key).await {
            Ok(Some(text)) => match layer_from_geojson(&text, state, &source.name) {
                Ok(layer) if !layer.is_empty() => {
                    log::debug!("[{state}] Cache hit for {} ({key})", source.name);
                    return Ok(layer);
                }
                Ok(_) => log::warn!("[{state}] Ignoring empty cached layer for {}", source.name),
                Err(e) => log::warn!("[{state}] Ignoring unreadable cache entry {key}: {e}"),
            },
            Ok(None) => log::debug!("[{state}] Cache miss for {} ({key})", source.name),
            Err(e) => log::warn!("[{state}] Cache read failed for {}: {e}", source.name),
        }

        let layer = self.inner.load(state, source).await?;

        match layer_to_geojson(&layer) {
            Ok(text) => {
                if let Err(e) = self.cache.put(&key, &text).await {
                    log::warn!("[{state}] Cache write failed for {}: {e}", source.name);
                }
            }
            Err(e) => log::warn!("[{state}] Could not serialize {} for caching: {e}", source.name),
        }

        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use geo::{Geometry, Point};
    use parcel_fusion_parcel_models::{ActivityRecord, ActivityRightsType, AttributeMap, Crs};

    use super::*;

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActivitySourceLoader for CountingLoader {
        async fn load(
            &self,
            state: &str,
            source: &ActivitySourceDefinition,
        ) -> Result<ActivityLayer, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut attributes = AttributeMap::new();
            attributes.insert("STATUS".to_string(), "Active".to_string());
            Ok(ActivityLayer {
                state: state.to_string(),
                source_name: source.name.clone(),
                crs: Crs::conus_albers(),
                records: vec![ActivityRecord::new(
                    Some(Geometry::Point(Point::new(1.5, 2.5))),
                    attributes,
                )],
            })
        }
    }

    fn definition() -> ActivitySourceDefinition {
        ActivitySourceDefinition {
            name: "Oil and Gas".to_string(),
            location: "MT/oil_gas.geojson".to_string(),
            rights_type: ActivityRightsType::Subsurface,
            use_name_as_activity: true,
            keep_cols: vec![],
            activity_name_appendage_col: None,
        }
    }

    #[test]
    fn keys_are_stable_hex_digests() {
        let key = cache_key("MT/oil_gas.geojson");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key(" MT/oil_gas.geojson "));
        assert_ne!(key, cache_key("MT/coal.geojson"));
    }

    #[tokio::test]
    async fn second_load_is_served_from_memory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CachedLoader::new(
            CountingLoader {
                calls: calls.clone(),
            },
            MemoryCache::new(),
        );

        let first = loader.load("MT", &definition()).await.unwrap();
        let second = loader.load("MT", &definition()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn directory_cache_persists_layers() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let loader = CachedLoader::new(
                CountingLoader {
                    calls: calls.clone(),
                },
                DirectoryCache::new(dir.path().join("cache")),
            );
            let layer = loader.load("MT", &definition()).await.unwrap();
            assert!(layer.crs.same_as(&Crs::conus_albers()));
            assert_eq!(layer.records[0].get("STATUS"), Some("Active"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let cached = dir
            .path()
            .join("cache")
            .join(format!("{}.geojson", cache_key("MT/oil_gas.geojson")));
        assert!(cached.exists());
    }

    #[tokio::test]
    async fn directory_cache_misses_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path());
        assert_eq!(cache.get("absent").await.unwrap(), None);
        cache.put("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
