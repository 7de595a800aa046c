// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classification of agent reference strings.

use holon_error::{ErrorKind, HolonError};
use std::path::{Path, PathBuf};

/// A classified agent reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRef {
    /// An existing regular file, absolutised.
    File(PathBuf),
    /// An `http(s)://` URL with an optional expected SHA-256.
    Http {
        /// Download URL with any `#sha256=` fragment stripped.
        url: String,
        /// Lowercase hex digest extracted from the fragment, when present.
        expected_sha256: Option<String>,
    },
    /// A bare alias name to look up in the alias table.
    Alias(String),
    /// The sentinel `default`: the compiled-in bundle.
    Default,
}

/// Whether `name` is a legal alias: `[A-Za-z0-9_.-]+`, no separators.
pub fn is_alias_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Split a `#sha256=<hex>` fragment off a URL.
///
/// Returns the fragment-free URL and the lowercased digest. URLs with no
/// fragment, or with an unrelated fragment, pass through unchanged.
pub fn split_sha256_fragment(url: &str) -> Result<(String, Option<String>), HolonError> {
    let Some((base, fragment)) = url.split_once('#') else {
        return Ok((url.to_string(), None));
    };
    let Some(hex) = fragment.strip_prefix("sha256=") else {
        return Ok((url.to_string(), None));
    };
    let hex = hex.to_ascii_lowercase();
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(
            HolonError::new(ErrorKind::RefInvalid, "malformed sha256 fragment")
                .with_context("fragment", fragment),
        );
    }
    Ok((base.to_string(), Some(hex)))
}

impl AgentRef {
    /// Classify a reference string.
    ///
    /// First match wins: the `default` sentinel, an `http(s)` scheme, an
    /// existing file path, then a bare alias name. Anything else is
    /// `REF_INVALID` (or `NOT_FOUND` for path-like refs that do not exist).
    pub fn classify(reference: &str) -> Result<Self, HolonError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(HolonError::new(ErrorKind::RefInvalid, "empty agent reference"));
        }
        if reference == "default" {
            return Ok(Self::Default);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let (url, expected_sha256) = split_sha256_fragment(reference)?;
            return Ok(Self::Http {
                url,
                expected_sha256,
            });
        }
        if reference.contains("://") {
            return Err(
                HolonError::new(ErrorKind::RefInvalid, "unsupported URL scheme")
                    .with_context("ref", reference),
            );
        }

        let path = Path::new(reference);
        if path.exists() {
            if path.is_dir() {
                return Err(HolonError::new(
                    ErrorKind::RefInvalid,
                    "agent reference is a directory, expected a bundle archive",
                )
                .with_context("ref", reference));
            }
            let abs = std::fs::canonicalize(path).map_err(|e| {
                HolonError::new(ErrorKind::RefInvalid, "failed to absolutise path")
                    .with_context("ref", reference)
                    .with_source(e)
            })?;
            return Ok(Self::File(abs));
        }

        if is_alias_name(reference) {
            return Ok(Self::Alias(reference.to_string()));
        }

        // Path-like but nothing on disk.
        if reference.contains('/') || reference.contains('\\') {
            return Err(
                HolonError::new(ErrorKind::NotFound, "agent bundle file does not exist")
                    .with_context("ref", reference),
            );
        }

        Err(HolonError::new(ErrorKind::RefInvalid, "unrecognised agent reference")
            .with_context("ref", reference))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_sentinel() {
        assert_eq!(AgentRef::classify("default").unwrap(), AgentRef::Default);
    }

    #[test]
    fn http_without_fragment() {
        let r = AgentRef::classify("https://example.com/agent.tgz").unwrap();
        assert_eq!(
            r,
            AgentRef::Http {
                url: "https://example.com/agent.tgz".into(),
                expected_sha256: None,
            }
        );
    }

    #[test]
    fn http_with_sha_fragment() {
        let hex = "a".repeat(64);
        let r = AgentRef::classify(&format!("https://example.com/a.tgz#sha256={hex}")).unwrap();
        match r {
            AgentRef::Http {
                url,
                expected_sha256,
            } => {
                assert_eq!(url, "https://example.com/a.tgz");
                assert_eq!(expected_sha256.as_deref(), Some(hex.as_str()));
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn sha_fragment_is_lowercased() {
        let r = AgentRef::classify(&format!(
            "https://example.com/a.tgz#sha256={}",
            "ABCDEF0123456789".repeat(4)
        ))
        .unwrap();
        match r {
            AgentRef::Http {
                expected_sha256, ..
            } => {
                assert_eq!(
                    expected_sha256.as_deref(),
                    Some("abcdef0123456789".repeat(4).as_str())
                );
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn short_sha_fragment_rejected() {
        let err = AgentRef::classify("https://example.com/a.tgz#sha256=dead").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RefInvalid);
    }

    #[test]
    fn unrelated_fragment_passes_through() {
        let (url, sha) = split_sha256_fragment("https://example.com/a.tgz#section").unwrap();
        assert_eq!(url, "https://example.com/a.tgz#section");
        assert!(sha.is_none());
    }

    #[test]
    fn ftp_scheme_rejected() {
        let err = AgentRef::classify("ftp://example.com/a.tgz").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RefInvalid);
    }

    #[test]
    fn existing_file_wins_over_alias() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bundle.tgz");
        fs::write(&file, b"x").unwrap();
        let r = AgentRef::classify(file.to_str().unwrap()).unwrap();
        match r {
            AgentRef::File(p) => assert!(p.is_absolute()),
            other => panic!("expected File, got {other:?}"),
        }
    }

    #[test]
    fn directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = AgentRef::classify(dir.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RefInvalid);
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = AgentRef::classify("/no/such/bundle.tgz").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn bare_name_is_alias() {
        assert_eq!(
            AgentRef::classify("nightly").unwrap(),
            AgentRef::Alias("nightly".into())
        );
        assert_eq!(
            AgentRef::classify("claude-v1.2").unwrap(),
            AgentRef::Alias("claude-v1.2".into())
        );
    }

    #[test]
    fn alias_charset() {
        assert!(is_alias_name("agent_1.beta-2"));
        assert!(!is_alias_name("a/b"));
        assert!(!is_alias_name("a b"));
        assert!(!is_alias_name(""));
    }

    #[test]
    fn empty_ref_rejected() {
        let err = AgentRef::classify("  ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RefInvalid);
    }
}
