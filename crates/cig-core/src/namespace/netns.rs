//! The bind-mounted network namespace handle protocol.
//!
//! A container's network namespace must outlive the short process that
//! creates it and be joinable later by name. The kernel keeps a
//! namespace alive as long as a bind mount of its `/proc/self/ns/net`
//! file exists, so each container gets a marker file at
//! `<netns-root>/<id>` holding the namespace open.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use cig_common::constants::CIG_NET_NS_PATH;
use cig_common::error::{CigError, Result};
use cig_common::types::ContainerId;
use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;

const SELF_NET_NS: &str = "/proc/self/ns/net";

/// Path of the bind-mounted namespace handle for a container.
#[must_use]
pub fn marker_path(id: &ContainerId) -> PathBuf {
    Path::new(CIG_NET_NS_PATH).join(id.as_str())
}

/// Creates a durable network namespace for the container and restores
/// the caller's original namespace.
///
/// Sequence: create the marker file, capture the current (host)
/// namespace fd, unshare a new network namespace, bind-mount the new
/// namespace onto the marker, then rejoin the captured host namespace.
/// The unshare applies to the calling process persistently, which is
/// why this function must only run in a dedicated short-lived re-exec
/// process, never in the orchestrator itself.
///
/// # Errors
///
/// Returns an error if any step of the sequence fails.
pub fn create(id: &ContainerId) -> Result<()> {
    crate::filesystem::create_dirs_if_missing(&[CIG_NET_NS_PATH])?;

    let marker = marker_path(id);
    let _marker_file = File::create_new(&marker).map_err(|e| CigError::Io {
        path: marker.clone(),
        source: e,
    })?;

    let host_ns = File::open(SELF_NET_NS).map_err(|e| CigError::Io {
        path: SELF_NET_NS.into(),
        source: e,
    })?;

    super::unshare_namespaces(CloneFlags::CLONE_NEWNET)?;

    nix::mount::mount(
        Some(SELF_NET_NS),
        &marker,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| CigError::Syscall {
        op: "bind mount network namespace",
        source: e.into(),
    })?;

    super::join_namespace_fd(host_ns.as_fd(), CloneFlags::CLONE_NEWNET)?;
    tracing::info!(id = %id, marker = %marker.display(), "network namespace created");
    Ok(())
}

/// Opens a container's namespace marker.
///
/// # Errors
///
/// Returns an error if the marker does not exist or cannot be opened.
pub fn open_marker(id: &ContainerId) -> Result<File> {
    let marker = marker_path(id);
    File::open(&marker).map_err(|e| CigError::Io {
        path: marker,
        source: e,
    })
}

/// Moves the calling process into the container's network namespace.
///
/// # Errors
///
/// Returns an error if the marker cannot be opened or joined.
pub fn join(id: &ContainerId) -> Result<()> {
    let marker = open_marker(id)?;
    super::join_namespace_fd(marker.as_fd(), CloneFlags::CLONE_NEWNET)?;
    tracing::debug!(id = %id, "joined network namespace");
    Ok(())
}

/// Unmounts the namespace marker, releasing the kernel namespace once
/// no process remains inside it.
///
/// # Errors
///
/// Returns an error if the unmount fails; the kernel namespace stays
/// pinned until the marker mount is gone.
pub fn unmount(id: &ContainerId) -> Result<()> {
    let marker = marker_path(id);
    nix::mount::umount2(&marker, MntFlags::empty()).map_err(|e| CigError::Syscall {
        op: "unmount network namespace",
        source: e.into(),
    })?;
    let _ = std::fs::remove_file(&marker);
    tracing::info!(id = %id, "network namespace released");
    Ok(())
}
