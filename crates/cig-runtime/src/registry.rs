//! The running-container registry.
//!
//! Nothing about running containers is persisted. The set of live ids
//! is the set of directories under the cpu controller's `cig` group;
//! everything else is derived on demand from `cgroup.procs`, `/proc`,
//! and the overlay mount table. A container that cannot be fully
//! resolved is excluded from listings rather than failing them.

use std::path::{Path, PathBuf};

use cig_common::constants::{
    CGROUP_ROOT, CGROUP_SUBGROUP, CIG_CONTAINERS_PATH, CIG_IMAGES_PATH, IMAGE_HASH_LENGTH,
};
use cig_common::error::{CigError, Result};
use cig_common::types::ContainerId;
use cig_image::metadata::ImageDb;

/// A live container, as reconstructed from kernel state.
#[derive(Debug, Clone)]
pub struct RunningContainerInfo {
    /// The container's id.
    pub id: ContainerId,
    /// `name:tag` of the image the container was started from.
    pub image: String,
    /// Path of the running command, relative to the container root.
    pub command: String,
    /// The pid observed last in the container's cgroup.
    pub pid: i32,
}

/// Resolves running containers from the cgroup hierarchy, `/proc`, and
/// the mount table.
#[derive(Debug)]
pub struct Registry {
    cgroup_root: PathBuf,
    images_root: PathBuf,
    containers_root: PathBuf,
    mounts_file: PathBuf,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Builds the registry against the live system paths.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roots(
            CGROUP_ROOT,
            CIG_IMAGES_PATH,
            CIG_CONTAINERS_PATH,
            "/proc/mounts",
        )
    }

    /// Builds the registry against alternate roots.
    ///
    /// Used by tests to resolve containers from a plain directory tree
    /// and a synthetic mount table.
    #[must_use]
    pub fn with_roots(
        cgroup_root: impl Into<PathBuf>,
        images_root: impl Into<PathBuf>,
        containers_root: impl Into<PathBuf>,
        mounts_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            images_root: images_root.into(),
            containers_root: containers_root.into(),
            mounts_file: mounts_file.into(),
        }
    }

    /// Lists all running containers. A missing `cig` group means no
    /// container has ever run; that is an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the group directory exists but cannot
    /// be enumerated.
    pub fn list_running(&self) -> Result<Vec<RunningContainerInfo>> {
        let base = self.cpu_group_dir();
        if !base.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&base).map_err(|e| CigError::Io {
            path: base.clone(),
            source: e,
        })?;

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CigError::Io {
                path: base.clone(),
                source: e,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match ContainerId::parse(name).and_then(|id| self.inspect(&id)) {
                Ok(info) => containers.push(info),
                Err(e) => tracing::debug!(error = %e, "skipping unresolvable cgroup entry"),
            }
        }
        Ok(containers)
    }

    /// Resolves one running container's info from its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not running or any of its
    /// kernel state cannot be read.
    pub fn inspect(&self, id: &ContainerId) -> Result<RunningContainerInfo> {
        let procs_path = self
            .cpu_group_dir()
            .join(id.as_str())
            .join("cgroup.procs");
        let procs = std::fs::read_to_string(&procs_path).map_err(|e| CigError::Io {
            path: procs_path,
            source: e,
        })?;
        let pid = last_pid(&procs).ok_or_else(|| CigError::NotFound {
            kind: "container process",
            id: id.to_string(),
        })?;

        let exe_link = PathBuf::from(format!("/proc/{pid}/exe"));
        let exe = std::fs::read_link(&exe_link).map_err(|e| CigError::Io {
            path: exe_link,
            source: e,
        })?;

        // The mount point itself may sit behind symlinks (/var/run).
        let mnt = self.mount_path(id);
        let real_mnt = std::fs::canonicalize(&mnt).map_err(|e| CigError::Io {
            path: mnt,
            source: e,
        })?;
        let command = command_inside_root(&exe, &real_mnt);

        let mounts = std::fs::read_to_string(&self.mounts_file).map_err(|e| CigError::Io {
            path: self.mounts_file.clone(),
            source: e,
        })?;
        let image_hash =
            image_hash_from_mounts(&mounts, id.as_str(), &self.images_root.to_string_lossy())
                .ok_or_else(|| CigError::NotFound {
                    kind: "overlay mount",
                    id: id.to_string(),
                })?;

        let db = ImageDb::open(&self.images_root)?;
        let image = db
            .tag_for_hash(&image_hash)
            .map_or_else(|| image_hash.clone(), |(name, tag)| format!("{name}:{tag}"));

        Ok(RunningContainerInfo {
            id: id.clone(),
            image,
            command,
            pid,
        })
    }

    fn cpu_group_dir(&self) -> PathBuf {
        self.cgroup_root.join("cpu").join(CGROUP_SUBGROUP)
    }

    fn mount_path(&self, id: &ContainerId) -> PathBuf {
        self.containers_root
            .join(id.as_str())
            .join("fs")
            .join("mnt")
    }
}

/// Last pid listed in `cgroup.procs` content; the user command rather
/// than the container's init shim.
fn last_pid(procs: &str) -> Option<i32> {
    procs
        .lines()
        .filter(|line| !line.trim().is_empty())
        .next_back()
        .and_then(|line| line.trim().parse().ok())
}

/// The running command as a path inside the container root.
fn command_inside_root(exe: &Path, real_mnt: &Path) -> String {
    let exe = exe.to_string_lossy();
    let prefix = real_mnt.to_string_lossy();
    exe.strip_prefix(prefix.as_ref())
        .unwrap_or(exe.as_ref())
        .to_owned()
}

/// Extracts the 12-char image hash from the overlay mount entry whose
/// line references `container_id`, by peeling the `lowerdir=` option:
/// the first lower directory starts with `<images_root>/<hash>/`.
fn image_hash_from_mounts(mounts: &str, container_id: &str, images_root: &str) -> Option<String> {
    let leader = format!("lowerdir={images_root}/");
    for line in mounts.lines() {
        if !line.contains(container_id) {
            continue;
        }
        for field in line.split(' ') {
            if !field.contains("lowerdir=") {
                continue;
            }
            for option in field.split(',') {
                if let Some(rest) = option.strip_prefix(&leader) {
                    if rest.len() >= IMAGE_HASH_LENGTH {
                        return Some(rest[..IMAGE_HASH_LENGTH].to_owned());
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_pid_takes_the_final_line() {
        assert_eq!(last_pid("100\n101\n102\n"), Some(102));
        assert_eq!(last_pid("7"), Some(7));
    }

    #[test]
    fn empty_procs_content_has_no_pid() {
        assert_eq!(last_pid(""), None);
        assert_eq!(last_pid("\n\n"), None);
    }

    #[test]
    fn command_is_exe_minus_mount_prefix() {
        let cmd = command_inside_root(
            Path::new("/run/cig/containers/0123456789ab/fs/mnt/bin/sh"),
            Path::new("/run/cig/containers/0123456789ab/fs/mnt"),
        );
        assert_eq!(cmd, "/bin/sh");
    }

    #[test]
    fn foreign_exe_path_is_kept_verbatim() {
        let cmd = command_inside_root(Path::new("/usr/bin/true"), Path::new("/some/mnt"));
        assert_eq!(cmd, "/usr/bin/true");
    }

    #[test]
    fn image_hash_extracted_from_overlay_mount_line() {
        let mounts = "overlay /var/run/cig/containers/0123456789ab/fs/mnt overlay \
                      rw,lowerdir=/var/lib/cig/images/feedfacecafe/aaaaaaaaaaaa/fs:\
                      /var/lib/cig/images/feedfacecafe/bbbbbbbbbbbb/fs,\
                      upperdir=/var/run/cig/containers/0123456789ab/fs/upperdir,\
                      workdir=/var/run/cig/containers/0123456789ab/fs/workdir 0 0\n";
        assert_eq!(
            image_hash_from_mounts(mounts, "0123456789ab", "/var/lib/cig/images"),
            Some("feedfacecafe".to_owned())
        );
    }

    #[test]
    fn unrelated_mount_lines_yield_nothing() {
        let mounts = "proc /proc proc rw 0 0\ntmpfs /tmp tmpfs rw 0 0\n";
        assert_eq!(
            image_hash_from_mounts(mounts, "0123456789ab", "/var/lib/cig/images"),
            None
        );
    }

    #[test]
    fn container_with_empty_procs_is_excluded_without_failing_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cgroup_root = dir.path().join("cgroup");
        let images_root = dir.path().join("images");
        let containers_root = dir.path().join("containers");
        let mounts_file = dir.path().join("mounts");
        std::fs::create_dir_all(&images_root).expect("images root");

        let live = "0123456789ab";
        let dead = "ba9876543210";
        for id in [live, dead] {
            std::fs::create_dir_all(cgroup_root.join("cpu").join(CGROUP_SUBGROUP).join(id))
                .expect("cgroup dir");
        }
        let own_pid = std::process::id();
        std::fs::write(
            cgroup_root
                .join("cpu")
                .join(CGROUP_SUBGROUP)
                .join(live)
                .join("cgroup.procs"),
            format!("{own_pid}\n"),
        )
        .expect("live procs");
        std::fs::write(
            cgroup_root
                .join("cpu")
                .join(CGROUP_SUBGROUP)
                .join(dead)
                .join("cgroup.procs"),
            "",
        )
        .expect("dead procs");

        let mnt = containers_root.join(live).join("fs").join("mnt");
        std::fs::create_dir_all(&mnt).expect("mount point");
        std::fs::write(
            &mounts_file,
            format!(
                "overlay {} overlay rw,lowerdir={}/feedfacecafe/aaaaaaaaaaaa/fs,\
                 upperdir={}/{live}/fs/upperdir,workdir={}/{live}/fs/workdir 0 0\n",
                mnt.display(),
                images_root.display(),
                containers_root.display(),
                containers_root.display(),
            ),
        )
        .expect("mounts file");

        let registry = Registry::with_roots(&cgroup_root, &images_root, &containers_root, &mounts_file);
        let listed = registry.list_running().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.as_str(), live);
        assert_eq!(listed[0].image, "feedfacecafe");
        assert_eq!(listed[0].pid, i32::try_from(own_pid).expect("pid fits"));
    }

    #[test]
    fn missing_cpu_group_lists_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Registry::with_roots(
            dir.path().join("cgroup"),
            dir.path().join("images"),
            dir.path().join("containers"),
            dir.path().join("mounts"),
        );
        assert!(registry.list_running().expect("list").is_empty());
    }
}
