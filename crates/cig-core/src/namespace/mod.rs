//! Namespace transitions via `unshare(2)` and `setns(2)`.
//!
//! Namespace changes are irreversible for the calling process; callers
//! that must survive a transition (the long-lived orchestrator) spawn
//! a dedicated child process instead of calling these directly.

pub mod netns;

use std::fs::File;
use std::os::fd::AsFd;
use std::path::Path;

use cig_common::error::{CigError, Result};
use nix::sched::CloneFlags;
use nix::unistd::Pid;

/// The five namespaces joined when attaching to a running container,
/// keyed by their `/proc/<pid>/ns` entry names.
const JOINABLE_NAMESPACES: [(&str, CloneFlags); 5] = [
    ("ipc", CloneFlags::CLONE_NEWIPC),
    ("mnt", CloneFlags::CLONE_NEWNS),
    ("net", CloneFlags::CLONE_NEWNET),
    ("pid", CloneFlags::CLONE_NEWPID),
    ("uts", CloneFlags::CLONE_NEWUTS),
];

/// Detaches the calling process into new namespaces of the given kinds.
///
/// # Errors
///
/// Returns an error if `unshare(2)` fails.
pub fn unshare_namespaces(flags: CloneFlags) -> Result<()> {
    nix::sched::unshare(flags).map_err(|e| CigError::Syscall {
        op: "unshare",
        source: e.into(),
    })?;
    tracing::debug!(?flags, "unshared namespaces");
    Ok(())
}

/// Moves the calling process into the namespace behind `fd`.
///
/// # Errors
///
/// Returns an error if `setns(2)` fails.
pub fn join_namespace_fd<F: AsFd>(fd: F, kind: CloneFlags) -> Result<()> {
    nix::sched::setns(fd, kind).map_err(|e| CigError::Syscall {
        op: "setns",
        source: e.into(),
    })
}

/// Sets the hostname inside the current UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| CigError::Syscall {
        op: "sethostname",
        source: e.into(),
    })?;
    tracing::debug!(hostname, "hostname set");
    Ok(())
}

/// Joins all five of a running process's namespaces (IPC, mount,
/// network, PID, UTS) in the *calling* process.
///
/// Every namespace file is opened before any is joined, so a missing
/// file fails the whole attach instead of leaving the caller half
/// inside the container. Joining the PID namespace affects children of
/// the caller, not the caller itself.
///
/// # Errors
///
/// Returns an error if any namespace file cannot be opened or joined.
pub fn join_process_namespaces(pid: Pid) -> Result<()> {
    let base = format!("/proc/{pid}/ns");

    let mut handles = Vec::with_capacity(JOINABLE_NAMESPACES.len());
    for (name, kind) in JOINABLE_NAMESPACES {
        let path = Path::new(&base).join(name);
        let file = File::open(&path).map_err(|e| CigError::Io {
            path: path.clone(),
            source: e,
        })?;
        handles.push((file, kind));
    }

    for (file, kind) in &handles {
        join_namespace_fd(file.as_fd(), *kind)?;
    }
    tracing::debug!(%pid, "joined container namespaces");
    Ok(())
}
