//! Attaching a new command to a running container.
//!
//! Joins all five of the leader process's namespaces in the calling
//! process, re-registers with the container's cgroups (without
//! creating them), chroots into the container root, and runs the
//! command under the image's environment. The whole CLI process is
//! consumed by the attach; it exits when the command does.

use std::path::Path;
use std::process::Command;

use cig_common::constants::CIG_IMAGES_PATH;
use cig_common::error::{CigError, Result};
use cig_common::types::{ContainerId, ImageReference};
use cig_core::cgroup::CgroupManager;
use cig_core::filesystem::enter_root;
use cig_core::namespace::join_process_namespaces;
use cig_image::manifest::load_image_config;
use cig_image::metadata::ImageDb;
use nix::unistd::Pid;

use crate::registry;

/// Runs `command` inside the running container `id`.
///
/// # Errors
///
/// Returns an error if the container is not running, any namespace
/// cannot be joined, or the command cannot be spawned.
pub fn join_running(id: &ContainerId, command: &[String]) -> Result<()> {
    let info = registry::Registry::new().inspect(id)?;
    let env = image_environment(&info.image)?;

    join_process_namespaces(Pid::from_raw(info.pid))?;
    CgroupManager::new(id).create(false);
    enter_root(&crate::composer::mount_path(id))?;

    let (program, args) = command.split_first().ok_or_else(|| CigError::Config {
        message: "no command to run".to_owned(),
    })?;
    let mut cmd = Command::new(program);
    let _ = cmd.args(args).env_clear();
    for pair in &env {
        if let Some((key, value)) = pair.split_once('=') {
            let _ = cmd.env(key, value);
        }
    }
    let status = cmd.status().map_err(|e| CigError::Io {
        path: program.into(),
        source: e,
    })?;
    tracing::info!(%id, command = program, %status, "attached command finished");
    Ok(())
}

/// Resolves the environment declared by the image a running container
/// was started from, going back through the metadata store.
fn image_environment(image: &str) -> Result<Vec<String>> {
    let reference = ImageReference::parse(image);
    let db = ImageDb::open(Path::new(CIG_IMAGES_PATH))?;
    let hash = db
        .hash_for_tag(&reference.name, &reference.tag)
        .ok_or_else(|| CigError::NotFound {
            kind: "image",
            id: image.to_owned(),
        })?;
    let config = load_image_config(Path::new(CIG_IMAGES_PATH), hash)?;
    Ok(config.config.env)
}
