// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-workspace
//!
//! Host workspace snapshots, the canonical run layout, and post-run output
//! re-ownership.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The fixed input/output directory shape bound into the container.
pub mod layout;
/// Post-run `chown` of the output tree.
pub mod ownership;
/// Host workspace snapshotting.
pub mod snapshot;

pub use layout::RunLayout;
pub use ownership::reown_tree;
pub use snapshot::Snapshot;
