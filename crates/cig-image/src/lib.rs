//! Image provider and metadata store.
//!
//! Pulls images from OCI registries, unpacks their layers under the
//! images directory, and maintains the `images.json` database mapping
//! `name -> tag -> hash`. The image hash is the first 12 hex chars of
//! the image's config digest, which also names the image directory:
//! `<images>/<hash>/<layer-digest[..12]>/fs` per layer, plus
//! `manifest.json` and `<hash>.json` (the runtime config).

pub mod hash;
pub mod layer;
pub mod manifest;
pub mod metadata;
pub mod pull;

use std::path::{Path, PathBuf};

/// Directory holding a stored image's layers and metadata.
#[must_use]
pub fn image_base_path(images_root: &Path, image_hash: &str) -> PathBuf {
    images_root.join(image_hash)
}

/// Path of a stored image's `manifest.json`.
#[must_use]
pub fn image_manifest_path(images_root: &Path, image_hash: &str) -> PathBuf {
    image_base_path(images_root, image_hash).join("manifest.json")
}

/// Path of a stored image's runtime config file.
#[must_use]
pub fn image_config_path(images_root: &Path, image_hash: &str) -> PathBuf {
    image_base_path(images_root, image_hash).join(format!("{image_hash}.json"))
}

/// Path of one extracted layer's root filesystem fragment. The layer
/// is identified by the first 12 chars of its digest.
#[must_use]
pub fn layer_fs_path(images_root: &Path, image_hash: &str, layer: &str) -> PathBuf {
    let short = &layer[..layer.len().min(12)];
    image_base_path(images_root, image_hash)
        .join(short)
        .join("fs")
}
