//! The container's init process (`child-mode` re-exec phase).
//!
//! Runs as pid 1 of the fresh PID namespace, already detached into
//! new mount/UTS/IPC namespaces by its clone flags. It finishes the
//! container setup from the inside, runs the user command to
//! completion, and cleans up its own mounts. Most steps are
//! best-effort: once this process exists the container should run
//! even degraded, and the orchestrator's teardown handles the rest.

use std::path::Path;
use std::process::Command;

use cig_common::constants::CIG_IMAGES_PATH;
use cig_common::error::{CigError, Result, log_best_effort};
use cig_common::types::{ContainerId, ResourceLimits};
use cig_core::cgroup::CgroupManager;
use cig_core::filesystem::{enter_root, vfs};
use cig_core::namespace::{netns, set_hostname};
use cig_image::manifest::load_image_config;
use cig_net::veth;

/// Host files considered for the container's DNS configuration, in
/// preference order.
const RESOLV_CANDIDATES: [&str; 3] = [
    "/var/run/systemd/resolve/resolv.conf",
    "/etc/cig/resolv.conf",
    "/etc/resolv.conf",
];

/// Everything `child-mode` needs, decoded from its argv.
#[derive(Debug)]
pub struct ChildSpec {
    /// The container being started.
    pub id: ContainerId,
    /// Stored image hash providing root filesystem and environment.
    pub image_hash: String,
    /// Limits to apply to the freshly created cgroups.
    pub limits: ResourceLimits,
    /// User command and arguments.
    pub command: Vec<String>,
}

/// Finishes container setup inside the cloned namespaces and runs the
/// user command.
///
/// # Errors
///
/// Returns an error for failures that make the container unusable:
/// a missing image config, a failed chroot, or a command that cannot
/// be spawned.
pub fn exec_container_command(spec: &ChildSpec) -> Result<()> {
    // Read before chroot; the config lives outside the container root.
    let config = load_image_config(Path::new(CIG_IMAGES_PATH), &spec.image_hash)?;

    log_best_effort(set_hostname(spec.id.as_str()), "set container hostname");
    log_best_effort(netns::join(&spec.id), "join container network namespace");

    let cgroups = CgroupManager::new(&spec.id);
    cgroups.create(true);
    cgroups.configure(&spec.limits);

    log_best_effort(
        copy_nameserver_config(&spec.id),
        "copy resolv.conf into container",
    );

    enter_root(&crate::composer::mount_path(&spec.id))?;
    vfs::mount_virtual_filesystems();
    veth::configure_loopback();

    let result = run_user_command(&spec.command, &config.config.env);

    vfs::unmount_virtual_filesystems();
    let _ = result?;
    Ok(())
}

/// Copies the first existing DNS candidate file to the container's
/// `/etc/resolv.conf`. Runs before chroot, against the mounted root.
fn copy_nameserver_config(id: &ContainerId) -> Result<()> {
    let Some(source) = RESOLV_CANDIDATES
        .iter()
        .find(|path| Path::new(path).exists())
    else {
        return Ok(());
    };
    let target = crate::composer::mount_path(id).join("etc/resolv.conf");
    let _ = std::fs::copy(source, &target).map_err(|e| CigError::Io {
        path: target,
        source: e,
    })?;
    Ok(())
}

/// Spawns the user command with the image's environment (replacing
/// the inherited one entirely) and waits for it. The command's own
/// exit status is reported, not treated as a failure.
fn run_user_command(command: &[String], env: &[String]) -> Result<std::process::ExitStatus> {
    let (program, args) = command.split_first().ok_or_else(|| CigError::Config {
        message: "no command to run".to_owned(),
    })?;

    let mut cmd = Command::new(program);
    let _ = cmd.args(args).env_clear();
    for pair in env {
        if let Some((key, value)) = pair.split_once('=') {
            let _ = cmd.env(key, value);
        }
    }

    let status = cmd.status().map_err(|e| CigError::Io {
        path: program.into(),
        source: e,
    })?;
    tracing::info!(command = program, %status, "user command finished");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_an_empty_command_is_a_config_error() {
        let result = run_user_command(&[], &[]);
        assert!(matches!(result, Err(CigError::Config { .. })));
    }

    #[test]
    fn user_command_receives_only_the_image_environment() {
        let env = vec!["CIG_TEST_MARKER=present".to_owned(), "malformed".to_owned()];
        let command = vec![
            "/bin/sh".to_owned(),
            "-c".to_owned(),
            "test \"$CIG_TEST_MARKER\" = present && test -z \"$CIG_ABSENT\"".to_owned(),
        ];
        let status = run_user_command(&command, &env).expect("spawn");
        assert!(status.success());
    }

    #[test]
    fn user_command_failure_status_is_still_ok() {
        let command = vec!["/bin/sh".to_owned(), "-c".to_owned(), "exit 3".to_owned()];
        let status = run_user_command(&command, &[]).expect("spawn");
        assert_eq!(status.code(), Some(3));
    }
}
