// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressed bundle cache and alias table.
//!
//! Layout under the cache root:
//!
//! ```text
//! bundles/<sha256>.tar.gz   archives, named by content hash
//! index.json                url -> {sha256, size, stored_at}
//! aliases.json              name -> {url}
//! aliases.lock              writer lock for alias mutation
//! ```
//!
//! All writes are atomic (temp file + rename), so a crash mid-download never
//! leaves a half-file masquerading as cached.

use chrono::{DateTime, Utc};
use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::agent_ref::is_alias_name;

/// One cached download, as recorded in `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source URL the archive was fetched from.
    pub url: String,
    /// Content hash of the archive.
    pub sha256: String,
    /// Archive size in bytes.
    pub size: u64,
    /// When the archive was stored.
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AliasEntry {
    url: String,
}

/// Persistent bundle store rooted at `$HOLON_CACHE_DIR` or the platform
/// cache directory.
#[derive(Debug, Clone)]
pub struct BundleCache {
    root: PathBuf,
}

impl BundleCache {
    /// Open (creating if needed) a cache at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, HolonError> {
        let root = root.into();
        fs::create_dir_all(root.join("bundles")).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to create cache directory")
                .with_context("root", root.display().to_string())
                .with_source(e)
        })?;
        Ok(Self { root })
    }

    /// Open the default cache: `$HOLON_CACHE_DIR`, the platform cache dir,
    /// or the system temp dir as a last resort.
    pub fn open_default() -> Result<Self, HolonError> {
        let root = std::env::var_os(holon_core::env::vars::CACHE_DIR)
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|d| d.join("holon")))
            .unwrap_or_else(|| std::env::temp_dir().join("holon-cache"));
        Self::open(root)
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an archive with `sha256` would live at.
    pub fn archive_path(&self, sha256: &str) -> PathBuf {
        self.root.join("bundles").join(format!("{sha256}.tar.gz"))
    }

    /// Look up a cached archive by `(url, expected_sha256)`.
    ///
    /// With an expected hash the lookup is purely content-addressed; without
    /// one the URL index decides. Either way the archive file must exist.
    pub fn get_by_url(&self, url: &str, expected_sha256: Option<&str>) -> Option<PathBuf> {
        if let Some(sha) = expected_sha256 {
            let path = self.archive_path(sha);
            return path.is_file().then_some(path);
        }
        let index = self.read_index();
        let entry = index.entries.iter().find(|e| e.url == url)?;
        let path = self.archive_path(&entry.sha256);
        path.is_file().then_some(path)
    }

    /// Look up a cached archive by content hash alone.
    pub fn get_by_sha256(&self, sha256: &str) -> Option<PathBuf> {
        let path = self.archive_path(sha256);
        path.is_file().then_some(path)
    }

    /// Store `source` as the archive for `sha256`, recording `url` in the
    /// index. Returns the final archive path.
    ///
    /// Two URLs with the same body share one file; re-storing an existing
    /// hash only refreshes the index row.
    pub fn store(
        &self,
        source: &Path,
        url: &str,
        sha256: &str,
        size: u64,
    ) -> Result<PathBuf, HolonError> {
        let target = self.archive_path(sha256);
        if !target.is_file() {
            let tmp = tempfile::NamedTempFile::new_in(self.root.join("bundles")).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to create cache temp file")
                    .with_source(e)
            })?;
            fs::copy(source, tmp.path()).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to copy archive into cache")
                    .with_source(e)
            })?;
            tmp.persist(&target).map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to persist cache archive")
                    .with_source(e)
            })?;
            debug!(target: "holon.bundle", "stored bundle {sha256} ({size} bytes)");
        }

        let mut index = self.read_index();
        index.entries.retain(|e| e.url != url);
        index.entries.push(CacheEntry {
            url: url.to_string(),
            sha256: sha256.to_string(),
            size,
            stored_at: Utc::now(),
        });
        self.write_index(&index)?;
        Ok(target)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn read_index(&self) -> Index {
        fs::read_to_string(self.index_path())
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn write_index(&self, index: &Index) -> Result<(), HolonError> {
        let text = serde_json::to_string_pretty(index).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to serialise cache index").with_source(e)
        })?;
        atomic_write(&self.index_path(), text.as_bytes())
    }

    // -- Alias table ------------------------------------------------------

    fn aliases_path(&self) -> PathBuf {
        self.root.join("aliases.json")
    }

    fn read_aliases(&self) -> BTreeMap<String, AliasEntry> {
        fs::read_to_string(self.aliases_path())
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    /// Mutate the alias table under the writer lock.
    fn with_alias_lock<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, AliasEntry>) -> T,
    ) -> Result<T, HolonError> {
        let lock_path = self.root.join("aliases.lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                HolonError::new(ErrorKind::Internal, "failed to open alias lock file")
                    .with_source(e)
            })?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write().map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to take alias write lock")
                .with_source(e)
        })?;

        let mut aliases = self.read_aliases();
        let result = f(&mut aliases);
        let text = serde_json::to_string_pretty(&aliases).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to serialise alias table")
                .with_source(e)
        })?;
        atomic_write(&self.aliases_path(), text.as_bytes())?;
        Ok(result)
    }

    /// Resolve an alias to its URL.
    pub fn get_alias(&self, name: &str) -> Option<String> {
        self.read_aliases().get(name).map(|e| e.url.clone())
    }

    /// Register or replace an alias.
    pub fn set_alias(&self, name: &str, url: &str) -> Result<(), HolonError> {
        if !is_alias_name(name) {
            return Err(HolonError::new(ErrorKind::RefInvalid, "illegal alias name")
                .with_context("name", name));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(
                HolonError::new(ErrorKind::RefInvalid, "alias URL must be http(s)")
                    .with_context("url", url),
            );
        }
        self.with_alias_lock(|aliases| {
            aliases.insert(name.to_string(), AliasEntry { url: url.to_string() });
        })
    }

    /// Remove an alias. Removing an alias never removes a bundle.
    ///
    /// Returns `true` when the alias existed.
    pub fn remove_alias(&self, name: &str) -> Result<bool, HolonError> {
        self.with_alias_lock(|aliases| aliases.remove(name).is_some())
    }

    /// All registered aliases as `(name, url)` pairs, sorted by name.
    pub fn list_aliases(&self) -> Vec<(String, String)> {
        self.read_aliases()
            .into_iter()
            .map(|(name, entry)| (name, entry.url))
            .collect()
    }
}

/// Write `data` to `path` atomically via a sibling temp file.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), HolonError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to create temp file").with_source(e)
    })?;
    tmp.write_all(data).map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to write temp file").with_source(e)
    })?;
    tmp.persist(path).map_err(|e| {
        HolonError::new(ErrorKind::Internal, "failed to persist file").with_source(e)
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
