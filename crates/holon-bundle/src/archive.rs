// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bundle archive inspection.
//!
//! A bundle is a `.tar.gz` containing at least `bin/agent` (the entrypoint),
//! `dist/` (runtime sources), and a `manifest.json` describing the bundle.

use flate2::read::GzDecoder;
use holon_error::{ErrorKind, HolonError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Relative path of the entrypoint inside a bundle.
pub const ENTRYPOINT: &str = "bin/agent";

/// Relative path of the bundle manifest inside a bundle.
pub const MANIFEST_PATH: &str = "manifest.json";

/// The engine block of a bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    /// Engine name (e.g. `claude`).
    pub name: String,
    /// SDK package identifier.
    pub sdk: String,
    /// SDK version string.
    pub sdk_version: String,
}

/// The runtime block of a bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// Runtime kind (e.g. `node`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Pinned runtime version the image composer installs.
    pub version: String,
}

/// The manifest embedded in a bundle archive at `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Manifest schema version.
    pub bundle_version: u32,
    /// Bundle name.
    pub name: String,
    /// Bundle version string.
    pub version: String,
    /// Entrypoint path, normally `bin/agent`.
    pub entry: String,
    /// Target platform (e.g. `linux`).
    pub platform: String,
    /// Target architecture (e.g. `x86_64`).
    pub arch: String,
    /// Target libc (e.g. `gnu`, `musl`).
    pub libc: String,
    /// Engine description.
    pub engine: EngineInfo,
    /// Runtime description.
    pub runtime: RuntimeInfo,
    /// Environment variables the bundle expects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Capability labels the bundle advertises.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// Hex-encoded SHA-256 of a file's bytes.
pub fn sha256_file(path: &Path) -> Result<String, HolonError> {
    let mut file = File::open(path).map_err(|e| {
        HolonError::new(ErrorKind::NotFound, "failed to open bundle archive")
            .with_context("path", path.display().to_string())
            .with_source(e)
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            HolonError::new(ErrorKind::Internal, "failed to read bundle archive").with_source(e)
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Read and parse `manifest.json` out of a bundle archive.
pub fn read_manifest(archive: &Path) -> Result<BundleManifest, HolonError> {
    let text = read_entry(archive, MANIFEST_PATH)?.ok_or_else(|| {
        HolonError::new(ErrorKind::BundleExtractFailed, "bundle has no manifest.json")
            .with_context("archive", archive.display().to_string())
    })?;
    serde_json::from_str(&text).map_err(|e| {
        HolonError::new(ErrorKind::BundleExtractFailed, "bundle manifest.json is malformed")
            .with_source(e)
    })
}

/// Verify that the archive contains the `bin/agent` entrypoint.
pub fn verify_entrypoint(archive: &Path) -> Result<(), HolonError> {
    if entry_exists(archive, ENTRYPOINT)? {
        Ok(())
    } else {
        Err(HolonError::new(
            ErrorKind::BundleExtractFailed,
            "bundle has no bin/agent entrypoint",
        )
        .with_context("archive", archive.display().to_string()))
    }
}

fn open_entries(
    archive: &Path,
) -> Result<tar::Archive<GzDecoder<File>>, HolonError> {
    let file = File::open(archive).map_err(|e| {
        HolonError::new(ErrorKind::NotFound, "failed to open bundle archive")
            .with_context("path", archive.display().to_string())
            .with_source(e)
    })?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

fn entry_matches(entry_path: &Path, wanted: &str) -> bool {
    entry_path == Path::new(wanted) || entry_path == Path::new(".").join(wanted)
}

fn read_entry(archive: &Path, wanted: &str) -> Result<Option<String>, HolonError> {
    let mut ar = open_entries(archive)?;
    let entries = ar.entries().map_err(|e| {
        HolonError::new(ErrorKind::BundleExtractFailed, "failed to read bundle archive")
            .with_source(e)
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| {
            HolonError::new(ErrorKind::BundleExtractFailed, "corrupt bundle archive entry")
                .with_source(e)
        })?;
        let path = entry.path().map_err(|e| {
            HolonError::new(ErrorKind::BundleExtractFailed, "corrupt bundle entry path")
                .with_source(e)
        })?;
        if entry_matches(&path, wanted) {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(|e| {
                HolonError::new(ErrorKind::BundleExtractFailed, "failed to read bundle entry")
                    .with_source(e)
            })?;
            return Ok(Some(text));
        }
    }
    Ok(None)
}

fn entry_exists(archive: &Path, wanted: &str) -> Result<bool, HolonError> {
    let mut ar = open_entries(archive)?;
    let entries = ar.entries().map_err(|e| {
        HolonError::new(ErrorKind::BundleExtractFailed, "failed to read bundle archive")
            .with_source(e)
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            HolonError::new(ErrorKind::BundleExtractFailed, "corrupt bundle archive entry")
                .with_source(e)
        })?;
        let path = entry.path().map_err(|e| {
            HolonError::new(ErrorKind::BundleExtractFailed, "corrupt bundle entry path")
                .with_source(e)
        })?;
        if entry_matches(&path, wanted) {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    const SAMPLE_MANIFEST: &str = r#"{
        "bundleVersion": 1,
        "name": "holon-agent",
        "version": "0.4.2",
        "entry": "bin/agent",
        "platform": "linux",
        "arch": "x86_64",
        "libc": "gnu",
        "engine": {"name": "claude", "sdk": "@anthropic-ai/claude-agent-sdk", "sdkVersion": "0.9.1"},
        "runtime": {"type": "node", "version": "22.11.0"},
        "env": {"AGENT_LOG": "info"},
        "capabilities": ["patch", "summary"]
    }"#;

    /// Build a minimal bundle archive on disk.
    pub(crate) fn write_bundle(dir: &Path, with_entrypoint: bool) -> std::path::PathBuf {
        let path = dir.join("bundle.tar.gz");
        let file = File::create(&path).unwrap();
        let enc = GzEncoder::new(file, flate2::Compression::fast());
        let mut tar = tar::Builder::new(enc);

        let mut add = |name: &str, data: &[u8]| {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            tar.append_data(&mut header, name, data).unwrap();
        };

        add(MANIFEST_PATH, SAMPLE_MANIFEST.as_bytes());
        add("dist/index.js", b"// runtime\n");
        if with_entrypoint {
            add(ENTRYPOINT, b"#!/bin/sh\nexec node /holon/agent/dist/index.js\n");
        }

        let enc = tar.into_inner().unwrap();
        enc.finish().unwrap().sync_all().unwrap();
        path
    }

    #[test]
    fn reads_manifest() {
        let dir = TempDir::new().unwrap();
        let archive = write_bundle(dir.path(), true);
        let manifest = read_manifest(&archive).expect("manifest");
        assert_eq!(manifest.name, "holon-agent");
        assert_eq!(manifest.engine.sdk_version, "0.9.1");
        assert_eq!(manifest.runtime.kind, "node");
        assert_eq!(manifest.env.get("AGENT_LOG").map(String::as_str), Some("info"));
    }

    #[test]
    fn manifest_roundtrips_camel_case() {
        let dir = TempDir::new().unwrap();
        let archive = write_bundle(dir.path(), true);
        let manifest = read_manifest(&archive).unwrap();
        let text = serde_json::to_string(&manifest).unwrap();
        assert!(text.contains("\"bundleVersion\""));
        assert!(text.contains("\"sdkVersion\""));
        assert!(text.contains("\"type\":\"node\""));
        let back: BundleManifest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn entrypoint_present() {
        let dir = TempDir::new().unwrap();
        let archive = write_bundle(dir.path(), true);
        verify_entrypoint(&archive).expect("entrypoint");
    }

    #[test]
    fn entrypoint_missing() {
        let dir = TempDir::new().unwrap();
        let archive = write_bundle(dir.path(), false);
        let err = verify_entrypoint(&archive).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BundleExtractFailed);
    }

    #[test]
    fn sha256_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"holon").unwrap();
        let a = sha256_file(&path).unwrap();
        let b = sha256_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn missing_archive_is_not_found() {
        let err = read_manifest(Path::new("/no/such/archive.tgz")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn garbage_archive_is_extract_failed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.tgz");
        std::fs::write(&path, b"definitely not gzip").unwrap();
        let err = read_manifest(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BundleExtractFailed);
    }
}
