//! Compilation cache for the cached AOT variant.
//!
//! [`CompilationCache`] stores serialized Wasmtime artifacts keyed by module
//! content and engine compatibility:
//! - **In-memory**: lives as long as the factory that owns it (the process)
//! - **Directory**: `<dir>/<key>.cwasm`, reused across process invocations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info};

use wasm_bench_common::BenchError;

/// File extension of persisted artifacts.
const ARTIFACT_EXTENSION: &str = "cwasm";

/// Storage for compiled artifacts.
pub struct CompilationCache {
    storage: Storage,
    hits: AtomicU64,
    misses: AtomicU64,
}

enum Storage {
    InMemory(DashMap<String, Arc<[u8]>>),
    Directory(PathBuf),
}

impl CompilationCache {
    /// A cache that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self::with_storage(Storage::InMemory(DashMap::new()))
    }

    /// A cache persisted under `dir`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dir` does not exist or is not a
    /// directory. The directory is never created implicitly.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, BenchError> {
        let dir = dir.as_ref();
        let metadata = std::fs::metadata(dir).map_err(|e| {
            BenchError::configuration(format!(
                "compilation cache directory '{}' is not accessible: {e}",
                dir.display()
            ))
        })?;

        if !metadata.is_dir() {
            return Err(BenchError::configuration(format!(
                "compilation cache path '{}' is not a directory",
                dir.display()
            )));
        }

        info!(cache_dir = %dir.display(), "Persistent compilation cache enabled");
        Ok(Self::with_storage(Storage::Directory(dir.to_path_buf())))
    }

    /// Directory-backed cache if `dir` is given, in-memory otherwise.
    pub fn from_dir(dir: Option<&Path>) -> Result<Self, BenchError> {
        match dir {
            Some(dir) => Self::open(dir),
            None => Ok(Self::in_memory()),
        }
    }

    fn with_storage(storage: Storage) -> Self {
        Self {
            storage,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Directory backing this cache, if persistent.
    pub fn location(&self) -> Option<&Path> {
        match &self.storage {
            Storage::InMemory(_) => None,
            Storage::Directory(dir) => Some(dir),
        }
    }

    /// Look up a serialized artifact.
    ///
    /// An unreadable file is treated as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        match &self.storage {
            Storage::InMemory(map) => map.get(key).map(|entry| Arc::clone(entry.value())),
            Storage::Directory(dir) => {
                let path = artifact_path(dir, key);
                match std::fs::read(&path) {
                    Ok(bytes) => Some(bytes.into()),
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            debug!(path = %path.display(), error = %e, "Cached artifact unreadable");
                        }
                        None
                    }
                }
            }
        }
    }

    /// Store a serialized artifact.
    ///
    /// Persistent entries are written to a temporary file and renamed into
    /// place, so readers never observe a partial artifact.
    pub fn insert(&self, key: &str, artifact: &[u8]) -> Result<(), BenchError> {
        match &self.storage {
            Storage::InMemory(map) => {
                map.insert(key.to_string(), artifact.into());
            }
            Storage::Directory(dir) => {
                let path = artifact_path(dir, key);
                let tmp = path.with_extension(format!("{ARTIFACT_EXTENSION}.tmp"));
                std::fs::write(&tmp, artifact)?;
                std::fs::rename(&tmp, &path)?;
                debug!(path = %path.display(), size = artifact.len(), "Artifact persisted");
            }
        }
        Ok(())
    }

    /// Drop an entry, e.g. after it failed to deserialize.
    pub fn remove(&self, key: &str) {
        match &self.storage {
            Storage::InMemory(map) => {
                map.remove(key);
            }
            Storage::Directory(dir) => {
                let path = artifact_path(dir, key);
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        debug!(path = %path.display(), error = %e, "Failed to remove cached artifact");
                    }
                }
            }
        }
    }

    /// Count a lookup that produced a usable artifact.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a lookup that required compilation.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of hits so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of misses so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationCache")
            .field("location", &self.location())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish_non_exhaustive()
    }
}

fn artifact_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{ARTIFACT_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let cache = CompilationCache::in_memory();
        assert!(cache.get("abc").is_none());

        cache.insert("abc", &[1, 2, 3]).unwrap();
        assert_eq!(cache.get("abc").as_deref(), Some(&[1u8, 2, 3][..]));

        cache.remove("abc");
        assert!(cache.get("abc").is_none());
        assert!(cache.location().is_none());
    }

    #[test]
    fn test_directory_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let first = CompilationCache::open(dir.path()).unwrap();
        first.insert("key", b"artifact").unwrap();
        assert!(dir.path().join("key.cwasm").exists());
        assert!(!dir.path().join("key.cwasm.tmp").exists());

        let second = CompilationCache::open(dir.path()).unwrap();
        assert_eq!(second.get("key").as_deref(), Some(&b"artifact"[..]));
    }

    #[test]
    fn test_directory_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CompilationCache::open(dir.path()).unwrap();

        cache.insert("stale", b"artifact").unwrap();
        cache.remove("stale");
        assert!(!dir.path().join("stale.cwasm").exists());
        assert!(cache.get("stale").is_none());

        // Removing an absent entry is a no-op.
        cache.remove("stale");
        assert!(cache.get("stale").is_none());
    }

    #[test]
    fn test_remove_failure_keeps_cache_usable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CompilationCache::open(dir.path()).unwrap();

        // A directory where the artifact file should be cannot be removed as a file.
        std::fs::create_dir(dir.path().join("blocked.cwasm")).unwrap();
        cache.remove("blocked");
        assert!(dir.path().join("blocked.cwasm").is_dir());

        cache.insert("other", b"ok").unwrap();
        assert_eq!(cache.get("other").as_deref(), Some(&b"ok"[..]));
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = CompilationCache::open(&missing).unwrap_err();
        assert!(err.is_fatal());
        assert!(!missing.exists());
    }

    #[test]
    fn test_open_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let err = CompilationCache::open(file.path()).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_counters() {
        let cache = CompilationCache::in_memory();
        cache.record_miss();
        cache.record_hit();
        cache.record_hit();

        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }
}
