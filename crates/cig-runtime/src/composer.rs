//! Overlay root filesystem composition.
//!
//! Builds a container's root from the stored image layers: the lower
//! chain comes from the image manifest, reversed so the most recently
//! applied layer sits first (overlay gives the first lower directory
//! highest precedence), with the container's own upper and work
//! directories on top.

use std::path::{Path, PathBuf};

use cig_common::constants::{CIG_CONTAINERS_PATH, CIG_IMAGES_PATH};
use cig_common::error::{CigError, Result};
use cig_common::types::ContainerId;
use cig_core::filesystem::overlay::{OverlayConfig, mount_overlay, unmount_overlay};
use cig_core::filesystem::create_dirs_if_missing;
use cig_image::manifest;

/// A container's directory under the containers root.
#[must_use]
pub fn container_home(id: &ContainerId) -> PathBuf {
    Path::new(CIG_CONTAINERS_PATH).join(id.as_str())
}

/// The `fs` subtree holding mnt, upperdir and workdir.
#[must_use]
pub fn container_fs_home(id: &ContainerId) -> PathBuf {
    container_home(id).join("fs")
}

/// The merged overlay mount point; the container's root once mounted.
#[must_use]
pub fn mount_path(id: &ContainerId) -> PathBuf {
    container_fs_home(id).join("mnt")
}

/// Creates the container's directory tree.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn create_container_tree(id: &ContainerId) -> Result<()> {
    let fs_home = container_fs_home(id);
    create_dirs_if_missing(&[
        fs_home.join("mnt"),
        fs_home.join("upperdir"),
        fs_home.join("workdir"),
    ])
}

/// Removes the container's directory tree. Failures are logged only;
/// the tree is on a tmpfs-backed runtime directory and disappears at
/// reboot regardless.
pub fn remove_container_tree(id: &ContainerId) {
    let home = container_home(id);
    if let Err(e) = std::fs::remove_dir_all(&home) {
        tracing::warn!(path = %home.display(), error = %e, "could not remove container directory");
    }
}

/// Builds the reversed lower-directory chain for an image from its
/// stored manifest.
///
/// # Errors
///
/// Returns an error if the manifest is missing, has anything other
/// than exactly one entry, or the entry has no layers.
pub fn lower_chain(images_root: &Path, image_hash: &str) -> Result<Vec<PathBuf>> {
    let stored = manifest::load_manifest(images_root, image_hash)?;
    let layers = manifest::validated_layers(&stored)?;
    let mut chain: Vec<PathBuf> = layers
        .iter()
        .map(|layer| cig_image::layer_fs_path(images_root, image_hash, layer))
        .collect();
    chain.reverse();
    Ok(chain)
}

/// Mounts the container's overlay root from the image's layers.
/// Fatal on any failure; nothing else may proceed on a bad root.
///
/// # Errors
///
/// Returns an error if the manifest is invalid or the mount fails.
pub fn mount_root(id: &ContainerId, image_hash: &str) -> Result<()> {
    let lower_dirs = lower_chain(Path::new(CIG_IMAGES_PATH), image_hash)?;
    let fs_home = container_fs_home(id);
    let config = OverlayConfig {
        lower_dirs,
        upper_dir: fs_home.join("upperdir"),
        work_dir: fs_home.join("workdir"),
        merged_dir: fs_home.join("mnt"),
    };
    mount_overlay(&config)
}

/// Unmounts the container's overlay root.
///
/// # Errors
///
/// Returns an error if the unmount fails; the merged directory cannot
/// be removed while it is still mounted.
pub fn unmount_root(id: &ContainerId) -> Result<()> {
    unmount_overlay(&mount_path(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cig_image::manifest::ManifestEntry;

    fn write_manifest(images_root: &Path, image_hash: &str, layers: &[&str]) {
        let entry = ManifestEntry {
            config: format!("{image_hash}.json"),
            repo_tags: vec!["alpine:latest".into()],
            layers: layers.iter().map(|l| (*l).to_owned()).collect(),
        };
        let base = cig_image::image_base_path(images_root, image_hash);
        std::fs::create_dir_all(&base).expect("mkdir");
        std::fs::write(
            cig_image::image_manifest_path(images_root, image_hash),
            serde_json::to_string(&vec![entry]).expect("serialize"),
        )
        .expect("write manifest");
    }

    #[test]
    fn lower_chain_is_reversed_topmost_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "0123456789ab",
            &["aaaaaaaaaaaa.tar.gz", "bbbbbbbbbbbb.tar.gz"],
        );

        let chain = lower_chain(dir.path(), "0123456789ab").expect("chain");
        assert_eq!(chain.len(), 2);
        assert!(chain[0].ends_with("0123456789ab/bbbbbbbbbbbb/fs"));
        assert!(chain[1].ends_with("0123456789ab/aaaaaaaaaaaa/fs"));
    }

    #[test]
    fn lower_chain_rejects_empty_layer_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(dir.path(), "0123456789ab", &[]);
        assert!(lower_chain(dir.path(), "0123456789ab").is_err());
    }

    #[test]
    fn lower_chain_fails_without_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(lower_chain(dir.path(), "0123456789ab").is_err());
    }

    #[test]
    fn container_paths_nest_under_the_id() {
        let id = ContainerId::parse("0123456789ab").expect("valid id");
        assert_eq!(
            mount_path(&id),
            Path::new("/var/run/cig/containers/0123456789ab/fs/mnt")
        );
    }
}
