//! Virtual filesystems inside the container root.
//!
//! Runs after `chroot`, so every path here is relative to the
//! container's own root. All operations are best-effort: the process
//! that calls them is either about to exec the user command (which
//! should run even with a degraded `/dev`) or about to exit.

use std::path::Path;

use cig_common::error::{CigError, Result, log_best_effort};
use nix::mount::{MntFlags, MsFlags, mount, umount2};

/// The virtual mounts a container receives, in mount order.
const MOUNTS: [(&str, &str, &str); 5] = [
    ("proc", "/proc", "proc"),
    ("tmpfs", "/tmp", "tmpfs"),
    ("tmpfs", "/dev", "tmpfs"),
    ("devpts", "/dev/pts", "devpts"),
    ("sysfs", "/sys", "sysfs"),
];

/// Unmount order for teardown; the reverse of dependency order so
/// `/dev/pts` goes before `/dev`.
const UNMOUNT_ORDER: [&str; 5] = ["/dev/pts", "/dev", "/sys", "/proc", "/tmp"];

/// Mounts proc, tmpfs (`/tmp`, `/dev`), devpts, and sysfs inside the
/// container root, creating mount points that the image lacks.
///
/// Each failure is logged and skipped.
pub fn mount_virtual_filesystems() {
    log_best_effort(
        super::create_dirs_if_missing(&["/proc", "/sys"]),
        "create /proc and /sys mount points",
    );
    for (source, target, fstype) in MOUNTS {
        if target == "/dev/pts" {
            // The tmpfs just mounted over /dev is empty.
            log_best_effort(
                super::create_dirs_if_missing(&["/dev/pts"]),
                "create /dev/pts mount point",
            );
        }
        log_best_effort(mount_one(source, target, fstype), "mount virtual filesystem");
    }
}

/// Unmounts the virtual filesystems in reverse order.
///
/// The caller is exiting regardless, so failures are logged only.
pub fn unmount_virtual_filesystems() {
    for target in UNMOUNT_ORDER {
        log_best_effort(
            umount2(target, MntFlags::empty()).map_err(|e| CigError::Syscall {
                op: "unmount virtual filesystem",
                source: e.into(),
            }),
            target,
        );
    }
}

fn mount_one(source: &str, target: &str, fstype: &str) -> Result<()> {
    mount(
        Some(source),
        Path::new(target),
        Some(fstype),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| CigError::Syscall {
        op: "mount",
        source: e.into(),
    })?;
    tracing::debug!(target, fstype, "mounted");
    Ok(())
}
