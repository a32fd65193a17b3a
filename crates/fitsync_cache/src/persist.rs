//! Cache persistence.
//!
//! A cache image is one canonical CBOR document:
//!
//! ```text
//! { "version": 1,
//!   "entries": [ { "key": [root, parts...], "data": <JSON bytes>, "age_ms": n } ] }
//! ```
//!
//! Hydrated entries are marked invalidated: they can be shown while the
//! first read after startup refetches them.

use crate::cache::QueryCache;
use crate::entry::CacheEntry;
use crate::error::{CacheError, CacheResult};
use crate::key::QueryKey;
use fitsync_codec::{from_cbor, to_canonical_cbor, Value};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current cache image version.
pub const IMAGE_VERSION: i64 = 1;

/// Stores and loads cache images.
pub trait CachePersister: Send + Sync {
    /// Replaces the stored image.
    fn save(&self, image: &[u8]) -> CacheResult<()>;

    /// Loads the stored image, if any.
    fn load(&self) -> CacheResult<Option<Vec<u8>>>;

    /// Deletes the stored image.
    fn clear(&self) -> CacheResult<()>;
}

/// Keeps the image in a file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    /// Persists to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Image file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CachePersister for FilePersister {
    fn save(&self, image: &[u8]) -> CacheResult<()> {
        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(image)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> CacheResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> CacheResult<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Keeps the image in memory.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    image: Mutex<Option<Vec<u8>>>,
}

impl MemoryPersister {
    /// Creates an empty persister.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachePersister for MemoryPersister {
    fn save(&self, image: &[u8]) -> CacheResult<()> {
        *self.image.lock() = Some(image.to_vec());
        Ok(())
    }

    fn load(&self) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.image.lock().clone())
    }

    fn clear(&self) -> CacheResult<()> {
        *self.image.lock() = None;
        Ok(())
    }
}

impl QueryCache {
    /// Encodes every entry into a cache image.
    pub fn dehydrate(&self) -> CacheResult<Vec<u8>> {
        let mut entries = Vec::new();
        for (key, entry) in self.export() {
            let age_ms = i64::try_from(entry.age().as_millis()).unwrap_or(i64::MAX);
            entries.push(Value::map(vec![
                (Value::text("key"), key.to_value()),
                (
                    Value::text("data"),
                    Value::Bytes(serde_json::to_vec(&entry.data)?),
                ),
                (Value::text("age_ms"), Value::Integer(age_ms)),
            ]));
        }
        // keep the image deterministic regardless of map iteration order
        entries.sort_by(Value::cmp_canonical);
        let image = Value::map(vec![
            (Value::text("version"), Value::Integer(IMAGE_VERSION)),
            (Value::text("entries"), Value::Array(entries)),
        ]);
        Ok(to_canonical_cbor(&image))
    }

    /// Loads a cache image, skipping keys already cached.
    ///
    /// Returns the number of entries added.
    pub fn hydrate(&self, image: &[u8]) -> CacheResult<usize> {
        let root = from_cbor(image)?;
        let version = root
            .get("version")
            .and_then(Value::as_integer)
            .ok_or_else(|| CacheError::corrupt_image("missing version"))?;
        if version != IMAGE_VERSION {
            return Err(CacheError::UnsupportedVersion(version));
        }
        let items = root
            .get("entries")
            .and_then(Value::as_array)
            .ok_or_else(|| CacheError::corrupt_image("missing entries"))?;

        let now = Instant::now();
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let key = item
                .get("key")
                .ok_or_else(|| CacheError::corrupt_image("entry without key"))
                .and_then(QueryKey::from_value)?;
            let data = item
                .get("data")
                .and_then(Value::as_bytes)
                .ok_or_else(|| CacheError::corrupt_image("entry without data"))?;
            let age_ms = item.get("age_ms").and_then(Value::as_integer).unwrap_or(0);
            let age = Duration::from_millis(u64::try_from(age_ms).unwrap_or(0));
            entries.push((
                key,
                CacheEntry {
                    data: serde_json::from_slice(data)?,
                    updated_at: now.checked_sub(age).unwrap_or(now),
                    invalidated: true,
                },
            ));
        }
        let added = self.import(entries);
        tracing::debug!(added, "hydrated cache image");
        Ok(added)
    }

    /// Dehydrates into a persister.
    pub fn persist_to(&self, persister: &dyn CachePersister) -> CacheResult<()> {
        persister.save(&self.dehydrate()?)
    }

    /// Hydrates from a persister. Returns 0 if it holds no image.
    pub fn restore_from(&self, persister: &dyn CachePersister) -> CacheResult<usize> {
        match persister.load()? {
            Some(image) => self.hydrate(&image),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lookup;
    use fitsync_protocol::{EntityId, EntityKind};
    use serde_json::json;

    fn populated() -> QueryCache {
        let cache = QueryCache::default();
        for (key, data) in [
            (
                QueryKey::root(EntityKind::Post).segment("feed"),
                json!({"count": 1, "results": [{"id": 1}]}),
            ),
            (
                QueryKey::detail(EntityKind::User, &EntityId::Int(3)),
                json!({"id": 3, "username": "ana"}),
            ),
        ] {
            let ticket = cache.begin_fetch(&key);
            cache.complete_fetch(&ticket, data);
        }
        cache
    }

    #[test]
    fn hydrated_entries_are_invalidated() {
        let image = populated().dehydrate().unwrap();
        let fresh = QueryCache::default();
        assert_eq!(fresh.hydrate(&image).unwrap(), 2);
        let key = QueryKey::detail(EntityKind::User, &EntityId::Int(3));
        assert_eq!(
            fresh.lookup(&key, Duration::from_secs(600)),
            Lookup::Stale(json!({"id": 3, "username": "ana"}))
        );
    }

    #[test]
    fn hydrate_keeps_live_entries() {
        let cache = populated();
        let image = cache.dehydrate().unwrap();
        assert_eq!(cache.hydrate(&image).unwrap(), 0);
    }

    #[test]
    fn rejects_unknown_version() {
        let image = to_canonical_cbor(&Value::map(vec![
            (Value::text("version"), Value::Integer(9)),
            (Value::text("entries"), Value::Array(vec![])),
        ]));
        assert!(matches!(
            QueryCache::default().hydrate(&image),
            Err(CacheError::UnsupportedVersion(9))
        ));
        assert!(QueryCache::default().hydrate(b"\xff").is_err());
    }

    #[test]
    fn file_persister_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let persister = FilePersister::new(dir.path().join("cache.cbor"));
        assert_eq!(persister.load().unwrap(), None);

        populated().persist_to(&persister).unwrap();
        let restored = QueryCache::default();
        assert_eq!(restored.restore_from(&persister).unwrap(), 2);

        persister.clear().unwrap();
        persister.clear().unwrap();
        assert_eq!(persister.load().unwrap(), None);
    }

    #[test]
    fn memory_persister_roundtrip() {
        let persister = MemoryPersister::new();
        assert_eq!(QueryCache::default().restore_from(&persister).unwrap(), 0);
        populated().persist_to(&persister).unwrap();
        assert_eq!(QueryCache::default().restore_from(&persister).unwrap(), 2);
    }
}
