//! File-backed entry store partitioned by retention class.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/session/<key>          raw payload bytes
//! <root>/session/<key>.json     EntryMeta sidecar
//! <root>/permanent/<key>
//! <root>/permanent/<key>.json
//! ```
//!
//! Writes land in a temp file in the same directory and are renamed into
//! place, so a reader sees either the previous payload or the new one.
//! Purging renames the class directory to a tombstone before deleting it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

use super::key::{CacheKey, RetentionClass, is_digest};
use crate::Error;

const META_SUFFIX: &str = ".json";
const TEMP_MARKER: &str = ".tmp-";
const TOMBSTONE_MARKER: &str = ".purging-";

static UNIQUE: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> String {
    format!("{}-{}", std::process::id(), UNIQUE.fetch_add(1, Ordering::Relaxed))
}

/// Sidecar metadata persisted next to each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub url: String,
    pub class: RetentionClass,
    pub len: u64,
    pub stored_at: DateTime<Utc>,
}

/// A persisted payload together with what is known about its source.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: Bytes,
    /// `None` when the sidecar is missing or unreadable.
    pub meta: Option<EntryMeta>,
}

impl CacheEntry {
    pub fn class(&self) -> RetentionClass {
        self.key.class()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.url.as_str())
    }
}

/// Entry count and payload size of one retention class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoreStats {
    pub entries: u64,
    pub bytes: u64,
}

/// Persists opaque byte blobs by cache key.
///
/// The store does not lock per key: the fetch coordinator guarantees a single
/// writer per key, and temp-file renames keep readers safe regardless.
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
    #[cfg(test)]
    fail_reads: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl EntryStore {
    /// Open a store rooted at `root`, creating both class directories.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let store = Self {
            root: root.as_ref().to_path_buf(),
            #[cfg(test)]
            fail_reads: Default::default(),
        };
        for class in RetentionClass::ALL {
            let dir = store.class_dir(class);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::io(format!("create {}", dir.display()), e))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_dir(&self, class: RetentionClass) -> PathBuf {
        self.root.join(class.dir_name())
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.class_dir(key.class()).join(key.as_str())
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.class_dir(key.class()).join(format!("{}{META_SUFFIX}", key.as_str()))
    }

    /// Whether a payload is stored under `key`.
    ///
    /// Never fails. An entry that exists but cannot be inspected is reported
    /// as absent and logged at warn level.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        match fs::metadata(self.blob_path(key)).await {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache entry inaccessible");
                false
            }
        }
    }

    /// Make every `read` fail with an I/O error while `exists` keeps working.
    #[cfg(test)]
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Read the payload stored under `key`.
    pub async fn read(&self, key: &CacheKey) -> Result<Bytes, Error> {
        #[cfg(test)]
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::io(format!("read entry {key}"), std::io::Error::other("read failure")));
        }

        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(key.to_string())),
            Err(e) => Err(Error::io(format!("read entry {key}"), e)),
        }
    }

    /// Read the payload and its sidecar metadata.
    pub async fn read_entry(&self, key: &CacheKey) -> Result<CacheEntry, Error> {
        let bytes = self.read(key).await?;
        let meta = match fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice::<EntryMeta>(&raw)
                .inspect_err(|e| tracing::warn!(%key, error = %e, "unreadable entry metadata"))
                .ok(),
            Err(_) => None,
        };
        Ok(CacheEntry { key: key.clone(), bytes, meta })
    }

    /// Persist `bytes` under `key`, replacing any previous payload.
    pub async fn write(&self, key: &CacheKey, url: &Url, bytes: &Bytes) -> Result<(), Error> {
        let meta = EntryMeta { url: url.to_string(), class: key.class(), len: bytes.len() as u64, stored_at: Utc::now() };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| Error::io("encode entry metadata", std::io::Error::other(e)))?;

        write_atomic(&self.blob_path(key), bytes).await?;
        write_atomic(&self.meta_path(key), &meta_json).await?;

        tracing::debug!(%key, bytes = bytes.len(), "stored cache entry");
        Ok(())
    }

    /// Delete every entry of `class`.
    ///
    /// The class directory is swapped for an empty one before anything is
    /// deleted, so concurrent readers get either the old bytes or `NotFound`.
    pub async fn purge_class(&self, class: RetentionClass) -> Result<(), Error> {
        let dir = self.class_dir(class);
        let tombstone = self.root.join(format!("{}{TOMBSTONE_MARKER}{}", class.dir_name(), unique_suffix()));

        match fs::rename(&dir, &tombstone).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| Error::io(format!("create {}", dir.display()), e))?;
                return Ok(());
            }
            Err(e) => return Err(Error::io(format!("purge {class}"), e)),
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(format!("create {}", dir.display()), e))?;
        fs::remove_dir_all(&tombstone)
            .await
            .map_err(|e| Error::io(format!("purge {class}"), e))?;

        tracing::info!(%class, "purged cache class");
        Ok(())
    }

    /// Remove tombstones left behind by a purge that was interrupted.
    pub async fn sweep_tombstones(&self) -> Result<usize, Error> {
        let mut swept = 0;
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::io(format!("list {}", self.root.display()), e))?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::io("list cache root", e))? {
            if entry.file_name().to_string_lossy().contains(TOMBSTONE_MARKER) {
                fs::remove_dir_all(entry.path())
                    .await
                    .map_err(|e| Error::io("remove purge tombstone", e))?;
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Count stored payloads and their total size.
    pub async fn stats(&self, class: RetentionClass) -> Result<StoreStats, Error> {
        let mut stats = StoreStats::default();
        let mut dir = match fs::read_dir(self.class_dir(class)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(Error::io(format!("list {class}"), e)),
        };

        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::io(format!("list {class}"), e))? {
            let name = entry.file_name();
            if !is_digest(&name.to_string_lossy()) {
                continue;
            }
            // Entries can vanish mid-scan when a write replaces them.
            if let Ok(meta) = entry.metadata().await
                && meta.is_file()
            {
                stats.entries += 1;
                stats.bytes += meta.len();
            }
        }
        Ok(stats)
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), Error> {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let temp = path.with_file_name(format!("{file_name}{TEMP_MARKER}{}", unique_suffix()));

    if let Err(e) = fs::write(&temp, data).await {
        return Err(Error::io(format!("write {}", temp.display()), e));
    }
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(Error::io(format!("commit {}", path.display()), e));
    }
    Ok(())
}
