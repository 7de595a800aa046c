// SPDX-License-Identifier: MIT OR Apache-2.0
//! holon-image
//!
//! Deterministic image composition.
//!
//! The composed image is `<base>` plus the extracted agent bundle plus a
//! small, versioned runtime installation layer. Its identity is a pure
//! function of `(base_digest, bundle_sha256, recipe_version)`; a second
//! composition with the same inputs reuses the existing image.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The container engine seam and the `docker` subprocess driver.
pub mod cli;
/// The composer and its build-context recipe.
pub mod composer;

pub use cli::{ContainerCli, DockerCli};
pub use composer::{ComposeRequest, ComposedImage, ImageComposer, RECIPE_VERSION};
