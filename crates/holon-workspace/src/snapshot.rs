// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host workspace snapshotting.
//!
//! The snapshot is a full file copy, VCS state included, into a scratch
//! directory under `$HOLON_SNAPSHOT_BASE` (or a platform default). The host
//! path is read, never written.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// An isolated copy of the host workspace.
///
/// The backing directory is removed when this value is dropped.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    _temp: TempDir,
}

impl Snapshot {
    /// Snapshot `workspace` under the default scratch base.
    ///
    /// The base is `$HOLON_SNAPSHOT_BASE`, else the platform cache dir,
    /// else the system temp dir.
    pub fn create(workspace: &Path) -> Result<Self> {
        Self::create_in(workspace, &default_base()?)
    }

    /// Snapshot `workspace` under an explicit scratch `base`.
    pub fn create_in(workspace: &Path, base: &Path) -> Result<Self> {
        fs::create_dir_all(base)
            .with_context(|| format!("create snapshot base {}", base.display()))?;
        let temp = tempfile::Builder::new()
            .prefix("holon-snapshot-")
            .tempdir_in(base)
            .context("create snapshot directory")?;

        let dest = temp.path().to_path_buf();
        copy_tree(workspace, &dest)?;

        debug!(
            target: "holon.workspace",
            "snapshotted {} into {}",
            workspace.display(),
            dest.display()
        );
        Ok(Self {
            path: dest,
            _temp: temp,
        })
    }

    /// Root of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolve the default snapshot scratch base.
pub fn default_base() -> Result<PathBuf> {
    if let Some(base) = std::env::var_os(holon_core::env::vars::SNAPSHOT_BASE) {
        return Ok(PathBuf::from(base));
    }
    Ok(dirs::cache_dir()
        .map(|d| d.join("holon").join("snapshots"))
        .unwrap_or_else(|| std::env::temp_dir().join("holon-snapshots")))
}

/// Copy the whole tree at `src` into `dest`, following nothing.
///
/// Unlike staged-workspace copies, snapshots keep `.git` so the runner can
/// diff against the workspace's real history.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let src = src
        .canonicalize()
        .with_context(|| format!("canonicalize {}", src.display()))?;

    for entry in WalkDir::new(&src).follow_links(false) {
        let entry = entry.context("walk workspace")?;
        let rel = entry.path().strip_prefix(&src).unwrap_or(entry.path());
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let link = fs::read_link(src).with_context(|| format!("read link {}", src.display()))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(&link, dest)
        .with_context(|| format!("recreate link {}", dest.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dest: &Path) -> Result<()> {
    tracing::warn!(
        target: "holon.workspace",
        "skipping symlink {} on this platform",
        src.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
