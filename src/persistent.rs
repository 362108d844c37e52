//! Durable file-backed tier.
//!
//! One file per key inside a box directory. File names are the URL-safe
//! base64 of the key, so enumeration recovers the original keys without a
//! separate index; file contents are the JSON envelope. Writes go through a
//! temp file plus rename so a crash never leaves a half-written entry under
//! a live name.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use tokio::fs;

use crate::entry::{CacheEntry, now_ms};
use crate::error::CacheError;
use crate::lock::{rw_read, rw_write};
use crate::tier::{CacheTier, TierStats, TierType};

const SOURCE: &str = "strati::persistent";
const ENTRY_SUFFIX: &str = ".entry";

/// Durable key-value tier backed by one file per entry.
///
/// Must be opened with [`PersistentTier::init`] before use; operations before
/// that fail with [`CacheError::NotInitialized`].
pub struct PersistentTier {
    dir: PathBuf,
    // Some(root) once init() has created the box directory.
    open_root: RwLock<Option<PathBuf>>,
}

impl PersistentTier {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            open_root: RwLock::new(None),
        }
    }

    /// Create the box directory and mark the tier usable.
    pub async fn init(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| CacheError::backend(TierType::Persistent, err.to_string()))?;
        *rw_write(&self.open_root, SOURCE, "init") = Some(self.dir.clone());
        Ok(())
    }

    /// Release the box. Subsequent operations fail until `init` runs again.
    pub async fn close(&self) -> Result<(), CacheError> {
        *rw_write(&self.open_root, SOURCE, "close") = None;
        Ok(())
    }

    fn root(&self) -> Result<PathBuf, CacheError> {
        rw_read(&self.open_root, SOURCE, "root")
            .clone()
            .ok_or_else(|| CacheError::not_initialized(TierType::Persistent))
    }

    fn file_name_for(key: &str) -> String {
        format!("{}{ENTRY_SUFFIX}", URL_SAFE_NO_PAD.encode(key))
    }

    fn key_from_file_name(name: &str) -> Option<String> {
        let encoded = name.strip_suffix(ENTRY_SUFFIX)?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Read and decode the envelope at `path`. Corrupt files are deleted and
    /// read as absent, matching the miss-plus-delete contract.
    async fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match CacheEntry::decode(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(_) => {
                let _ = fs::remove_file(path).await;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CacheTier for PersistentTier {
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let root = self.root()?;
        let encoded = entry.encode()?;
        let name = Self::file_name_for(key);
        let tmp = root.join(format!("{name}.tmp"));
        let path = root.join(name);
        fs::write(&tmp, encoded.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let root = self.root()?;
        let path = root.join(Self::file_name_for(key));
        match self.read_entry(&path).await? {
            Some(entry) if entry.is_expired(now_ms()) => {
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let root = self.root()?;
        let path = root.join(Self::file_name_for(key));
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let root = self.root()?;
        let mut dir = fs::read_dir(&root).await?;
        while let Some(file) = dir.next_entry().await? {
            let name = file.file_name();
            if name.to_string_lossy().ends_with(ENTRY_SUFFIX) {
                let _ = fs::remove_file(file.path()).await;
            }
        }
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn clean_expired(&self) -> Result<usize, CacheError> {
        let root = self.root()?;
        let now = now_ms();
        let mut removed = 0;
        let mut dir = fs::read_dir(&root).await?;
        while let Some(file) = dir.next_entry().await? {
            let name = file.file_name();
            if !name.to_string_lossy().ends_with(ENTRY_SUFFIX) {
                continue;
            }
            let path = file.path();
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            // Undecodable envelopes are swept along with expired ones.
            let drop = match CacheEntry::decode(&raw) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => true,
            };
            if drop {
                let _ = fs::remove_file(&path).await;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<TierStats, CacheError> {
        let root = self.root()?;
        let now = now_ms();
        let mut stats = TierStats::default();
        let mut dir = fs::read_dir(&root).await?;
        while let Some(file) = dir.next_entry().await? {
            let name = file.file_name();
            let name = name.to_string_lossy();
            let Some(key) = Self::key_from_file_name(&name) else {
                continue;
            };
            let raw = match fs::read_to_string(file.path()).await {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            match CacheEntry::decode(&raw) {
                Ok(entry) if entry.is_expired(now) => stats.expired_count += 1,
                Ok(_) => {
                    stats.count += 1;
                    stats.keys.insert(key);
                }
                Err(_) => stats.expired_count += 1,
            }
        }
        Ok(stats)
    }
}
