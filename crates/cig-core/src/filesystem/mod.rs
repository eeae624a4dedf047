//! Filesystem primitives: overlay composition, container virtual
//! filesystems, and root switching.

pub mod overlay;
pub mod vfs;

use std::path::Path;

use cig_common::error::{CigError, Result};

/// Creates every listed directory that does not already exist.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn create_dirs_if_missing<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| CigError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Chroots into `new_root` and changes directory to `/`.
///
/// # Errors
///
/// Returns an error if `chroot(2)` or the directory change fails.
pub fn enter_root(new_root: &Path) -> Result<()> {
    nix::unistd::chroot(new_root).map_err(|e| CigError::Syscall {
        op: "chroot",
        source: e.into(),
    })?;
    std::env::set_current_dir("/").map_err(|e| CigError::Io {
        path: "/".into(),
        source: e,
    })?;
    tracing::debug!(root = %new_root.display(), "entered container root");
    Ok(())
}
