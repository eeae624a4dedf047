//! Overlay mounts for layered container root filesystems.
//!
//! Combines read-only image layers with one writable upper directory
//! into a single merged view. The kernel grants the *first* listed
//! lower directory the highest precedence, so callers must order the
//! chain topmost-layer-first.

use std::path::{Path, PathBuf};

use cig_common::error::{CigError, Result};

/// Configuration for an overlay mount.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Read-only lower layers, highest precedence first.
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Scratch directory required by the overlay driver.
    pub work_dir: PathBuf,
    /// Merged mount target.
    pub merged_dir: PathBuf,
}

/// Renders the `lowerdir=..,upperdir=..,workdir=..` option string.
#[must_use]
pub fn overlay_options(config: &OverlayConfig) -> String {
    let lowers = config
        .lower_dirs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    format!(
        "lowerdir={},upperdir={},workdir={}",
        lowers,
        config.upper_dir.display(),
        config.work_dir.display()
    )
}

/// Mounts an overlay filesystem with the given configuration.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let opts = overlay_options(config);
    mount(
        Some("overlay"),
        &config.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| CigError::Syscall {
        op: "overlay mount",
        source: e.into(),
    })?;

    tracing::info!(merged = %config.merged_dir.display(), "overlay mounted");
    Ok(())
}

/// Unmounts the overlay at the given merged path.
///
/// Deliberately not lazy: a busy mount at teardown means somebody
/// still holds a reference into the container root, which must be
/// surfaced rather than detached and forgotten.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn unmount_overlay(merged_dir: &Path) -> Result<()> {
    nix::mount::umount2(merged_dir, nix::mount::MntFlags::empty()).map_err(|e| {
        CigError::Syscall {
            op: "overlay unmount",
            source: e.into(),
        }
    })?;
    tracing::info!(path = %merged_dir.display(), "overlay unmounted");
    Ok(())
}
