// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-bundle
//!
//! Agent bundle resolution and caching.
//!
//! The resolver maps an agent reference string to a local, verified
//! `.tar.gz` path:
//!
//! - **File refs** resolve to existing regular files.
//! - **HTTP refs** are downloaded with a running SHA-256 and verified
//!   against the `#sha256=<hex>` fragment when one is present.
//! - **Alias refs** look up a registered name and re-enter the HTTP path.
//! - **`default`** resolves the compiled-in bundle, with a best-effort,
//!   non-blocking staleness probe against the upstream releases endpoint.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Agent reference classification.
pub mod agent_ref;
/// Bundle archive inspection (`manifest.json`, entrypoint).
pub mod archive;
/// Content-addressed cache and alias table.
pub mod cache;
/// HTTP download with integrity verification.
pub mod http;
/// The resolver facade and the built-in bundle.
pub mod resolver;

pub use agent_ref::AgentRef;
pub use archive::BundleManifest;
pub use cache::{BundleCache, CacheEntry};
pub use http::{HttpClient, HttpOptions};
pub use resolver::{BuiltinBundle, Resolver};
