//! The one-shot container lifecycle.
//!
//! `run_container` is the orchestrator: it stays on the host side of
//! every namespace boundary and delegates each irreversible transition
//! to a short-lived re-exec of our own binary (`/proc/self/exe`). The
//! network phases communicate only through exit status; the final
//! child is created with `clone(2)` carrying the namespace flags so
//! that it, not a grandchild, becomes pid 1 of the new PID namespace.

use std::ffi::CString;
use std::process::Command;

use cig_common::error::{CigError, Result, absorb};
use cig_common::types::{ContainerId, ImageReference, ResourceLimits};
use cig_core::cgroup::CgroupManager;
use cig_core::namespace::netns;
use nix::sched::CloneFlags;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, waitpid};

use crate::composer;

const SELF_EXE: &str = "/proc/self/exe";
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Runs a container to completion: pulls the image, assembles the
/// isolated environment, executes the command, and tears everything
/// down. Teardown runs even when the child failed.
///
/// # Errors
///
/// Returns an error for any fatal phase: image pull, overlay mount,
/// network setup, or the teardown unmounts.
pub fn run_container(
    limits: &ResourceLimits,
    image: &ImageReference,
    command: &[String],
) -> Result<()> {
    let id = ContainerId::generate();
    tracing::info!(%id, %image, "starting container");

    let image_hash = cig_image::pull::pull_if_absent(image)?;
    composer::create_container_tree(&id)?;
    composer::mount_root(&id, &image_hash)?;

    cig_net::bridge::ensure_bridge()?;
    run_network_phase("setup-netns", &id)?;
    run_network_phase("setup-veth", &id)?;

    match spawn_child(limits, &id, &image_hash, command) {
        Ok(status) => tracing::info!(%id, ?status, "container finished"),
        Err(e) => tracing::error!(%id, error = %e, "container child failed"),
    }

    teardown(&id)
}

/// Runs one hidden network phase as a separate process and insists on
/// a clean exit.
fn run_network_phase(phase: &'static str, id: &ContainerId) -> Result<()> {
    let status = Command::new(SELF_EXE)
        .arg(phase)
        .arg(id.as_str())
        .status()
        .map_err(|e| CigError::Io {
            path: SELF_EXE.into(),
            source: e,
        })?;
    if !status.success() {
        return Err(CigError::Net {
            message: format!("{phase} phase exited with {status}"),
        });
    }
    tracing::debug!(%id, phase, "network phase complete");
    Ok(())
}

/// Clones the `child-mode` process into fresh PID, mount, UTS, and
/// IPC namespaces and waits for it. The network namespace is
/// deliberately absent from the flags; the child joins the prepared
/// one by marker instead.
#[allow(unsafe_code)]
fn spawn_child(
    limits: &ResourceLimits,
    id: &ContainerId,
    image_hash: &str,
    command: &[String],
) -> Result<WaitStatus> {
    let argv = child_argv(limits, id, image_hash, command)?;
    let exe = CString::new(SELF_EXE).map_err(|_| CigError::Config {
        message: "exe path contains NUL".to_owned(),
    })?;

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWIPC;

    // The callback runs in the cloned child and must only exec or
    // exit; 127 mirrors the shell's command-not-found convention.
    let cb = Box::new(|| match nix::unistd::execv(&exe, &argv) {
        Ok(infallible) => match infallible {},
        Err(_) => 127,
    });

    // SAFETY: the child immediately calls execv and never returns to
    // borrowed state; the stack buffer outlives the clone call.
    let child = unsafe { nix::sched::clone(cb, &mut stack, flags, Some(Signal::SIGCHLD as i32)) }
        .map_err(|e| CigError::Syscall {
            op: "clone",
            source: e.into(),
        })?;

    waitpid(child, None).map_err(|e| CigError::Syscall {
        op: "waitpid",
        source: e.into(),
    })
}

/// Builds the `child-mode` argument vector; only set limits travel as
/// flags.
fn child_argv(
    limits: &ResourceLimits,
    id: &ContainerId,
    image_hash: &str,
    command: &[String],
) -> Result<Vec<CString>> {
    let mut args = vec![SELF_EXE.to_owned(), "child-mode".to_owned()];
    if let Some(mem) = limits.memory_mb {
        args.push(format!("--mem={mem}"));
    }
    if let Some(swap) = limits.swap_mb {
        args.push(format!("--swap={swap}"));
    }
    if let Some(pids) = limits.pids {
        args.push(format!("--pids={pids}"));
    }
    if let Some(cpus) = limits.cpus {
        args.push(format!("--cpus={cpus}"));
    }
    args.push(format!("--img={image_hash}"));
    args.push(id.to_string());
    args.extend(command.iter().cloned());

    args.into_iter()
        .map(|arg| {
            CString::new(arg).map_err(|_| CigError::Config {
                message: "argument contains NUL".to_owned(),
            })
        })
        .collect()
}

/// Releases everything the lifecycle created, in reverse order of
/// creation. The namespace and overlay unmounts are fatal; leftover
/// cgroups and directories are not worth failing a finished container
/// for.
fn teardown(id: &ContainerId) -> Result<()> {
    tracing::info!(%id, "tearing down container");
    absorb(
        netns::unmount(id).map_err(CigError::fatal),
        "release network namespace",
    )?;
    absorb(
        composer::unmount_root(id).map_err(CigError::fatal),
        "unmount overlay root",
    )?;
    CgroupManager::new(id).remove();
    composer::remove_container_tree(id);
    tracing::info!(%id, "container torn down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use cig_common::constants::{CIG_IMAGES_PATH, required_dirs};
    use cig_core::filesystem::create_dirs_if_missing;
    use cig_image::manifest::ManifestEntry;

    use super::*;

    fn decode(argv: &[CString]) -> Vec<String> {
        argv.iter()
            .map(|a| a.to_str().expect("utf8").to_owned())
            .collect()
    }

    #[test]
    fn child_argv_carries_only_set_limits() {
        let id = ContainerId::parse("0123456789ab").expect("valid id");
        let limits = ResourceLimits {
            memory_mb: Some(100),
            cpus: Some(0.5),
            ..ResourceLimits::default()
        };
        let argv = child_argv(&limits, &id, "feedfacecafe", &["/bin/sh".to_owned()])
            .expect("argv");
        let args = decode(&argv);
        assert_eq!(
            args,
            vec![
                "/proc/self/exe",
                "child-mode",
                "--mem=100",
                "--cpus=0.5",
                "--img=feedfacecafe",
                "0123456789ab",
                "/bin/sh",
            ]
        );
    }

    fn store_test_image(images_root: &Path, image_hash: &str) {
        let layer = "aaaaaaaaaaaa.tar.gz";
        std::fs::create_dir_all(cig_image::layer_fs_path(images_root, image_hash, layer))
            .expect("layer dir");
        let entry = ManifestEntry {
            config: format!("{image_hash}.json"),
            repo_tags: vec!["teardown-check:latest".into()],
            layers: vec![layer.into()],
        };
        std::fs::write(
            cig_image::image_manifest_path(images_root, image_hash),
            serde_json::to_string(&vec![entry]).expect("serialize"),
        )
        .expect("write manifest");
    }

    #[test]
    fn teardown_releases_marker_mount_and_directories() {
        if !nix::unistd::geteuid().is_root() {
            eprintln!("skipping teardown_releases_marker_mount_and_directories: requires root");
            return;
        }
        create_dirs_if_missing(&required_dirs()).expect("runtime directories");

        let images_root = Path::new(CIG_IMAGES_PATH);
        let image_hash = "feedfacecafe";
        store_test_image(images_root, image_hash);

        let id = ContainerId::generate();
        composer::create_container_tree(&id).expect("container tree");
        if netns::create(&id).is_err() {
            eprintln!(
                "skipping teardown_releases_marker_mount_and_directories: \
                 cannot create network namespace"
            );
            composer::remove_container_tree(&id);
            return;
        }
        if composer::mount_root(&id, image_hash).is_err() {
            eprintln!(
                "skipping teardown_releases_marker_mount_and_directories: \
                 overlay mount unavailable"
            );
            let _ = netns::unmount(&id);
            composer::remove_container_tree(&id);
            return;
        }

        teardown(&id).expect("teardown");

        assert!(!netns::marker_path(&id).exists());
        assert!(!composer::container_home(&id).exists());

        let _ = std::fs::remove_dir_all(cig_image::image_base_path(images_root, image_hash));
    }

    #[test]
    fn child_argv_without_limits_has_no_limit_flags() {
        let id = ContainerId::parse("0123456789ab").expect("valid id");
        let argv = child_argv(
            &ResourceLimits::default(),
            &id,
            "feedfacecafe",
            &["/bin/true".to_owned()],
        )
        .expect("argv");
        let args = decode(&argv);
        assert!(!args.iter().any(|a| a.starts_with("--mem")));
        assert!(!args.iter().any(|a| a.starts_with("--swap")));
        assert!(args.contains(&"--img=feedfacecafe".to_owned()));
    }
}
