// SPDX-License-Identifier: MIT OR Apache-2.0
//! Post-run output re-ownership.
//!
//! Containers often run as root, leaving `/holon/output` unreadable for the
//! invoking host user. When `HOST_UID`/`HOST_GID` are supplied the runner
//! re-owns the tree after the agent exits. Individual failures are logged
//! and skipped, never fatal.

use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Recursively chown `root` (inclusive) to `uid:gid`.
///
/// Returns the number of paths successfully re-owned. On non-Unix platforms
/// this is a no-op returning zero.
pub fn reown_tree(root: &Path, uid: u32, gid: u32) -> usize {
    reown_tree_impl(root, uid, gid)
}

#[cfg(unix)]
fn reown_tree_impl(root: &Path, uid: u32, gid: u32) -> usize {
    let mut changed = 0usize;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(target: "holon.workspace", "skipping unreadable path during reown: {e}");
                continue;
            }
        };
        match std::os::unix::fs::chown(entry.path(), Some(uid), Some(gid)) {
            Ok(()) => changed += 1,
            Err(e) => {
                warn!(
                    target: "holon.workspace",
                    "failed to chown {}: {e}",
                    entry.path().display()
                );
            }
        }
    }
    changed
}

#[cfg(not(unix))]
fn reown_tree_impl(_root: &Path, _uid: u32, _gid: u32) -> usize {
    0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
