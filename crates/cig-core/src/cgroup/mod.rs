//! Cgroup v1 resource management.
//!
//! Each container owns one directory per controller under
//! `<cgroup-root>/<controller>/cig/<id>`. Every write here is
//! best-effort: by the time limits are applied the container process
//! already exists, so a failed control-file write degrades the
//! container instead of killing it.

pub mod cpu;
pub mod memory;
pub mod pids;

use std::path::{Path, PathBuf};

use cig_common::constants::{CGROUP_ROOT, CGROUP_SUBGROUP};
use cig_common::error::{CigError, Result, log_best_effort};
use cig_common::types::{ContainerId, ResourceLimits};

/// Controllers cig manages, in the order their directories are created.
pub const CONTROLLERS: [&str; 3] = ["memory", "pids", "cpu"];

/// Handle to the per-container cgroup hierarchy across all controllers.
#[derive(Debug)]
pub struct CgroupManager {
    id: ContainerId,
    root: PathBuf,
}

impl CgroupManager {
    /// Creates a manager for the given container against the system
    /// cgroup root.
    #[must_use]
    pub fn new(id: &ContainerId) -> Self {
        Self::with_root(id, CGROUP_ROOT)
    }

    /// Creates a manager against an alternate cgroup root.
    ///
    /// Used by tests to exercise control-file writes on a plain
    /// directory tree.
    #[must_use]
    pub fn with_root(id: &ContainerId, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.clone(),
            root: root.into(),
        }
    }

    /// Returns this container's directory under one controller root.
    #[must_use]
    pub fn controller_dir(&self, controller: &str) -> PathBuf {
        self.root
            .join(controller)
            .join(CGROUP_SUBGROUP)
            .join(self.id.as_str())
    }

    /// Creates (when `create_dirs` is set) and joins the per-controller
    /// hierarchies: tags each with `notify_on_release=1` and registers
    /// the calling process in `cgroup.procs`.
    ///
    /// `create_dirs` is false when attaching to an already-running
    /// container, whose directories must already exist. All failures
    /// are logged and absorbed.
    pub fn create(&self, create_dirs: bool) {
        let pid = std::process::id();
        for controller in CONTROLLERS {
            let dir = self.controller_dir(controller);
            if create_dirs {
                log_best_effort(create_dir(&dir), "create cgroup directory");
            }
            log_best_effort(
                write_control_file(&dir, "notify_on_release", "1"),
                "write cgroup notification file",
            );
            log_best_effort(
                write_control_file(&dir, "cgroup.procs", &pid.to_string()),
                "write cgroup procs file",
            );
        }
        tracing::debug!(id = %self.id, pid, "joined cgroup hierarchies");
    }

    /// Applies the limits that are set; unset limits leave their
    /// control files untouched.
    ///
    /// Individual write failures are logged, never fatal.
    pub fn configure(&self, limits: &ResourceLimits) {
        if let Some(mem) = limits.memory_mb {
            log_best_effort(
                memory::set_memory_limit(&self.controller_dir("memory"), mem, limits.swap_mb),
                "write memory limit",
            );
        }
        if let Some(cpus) = limits.cpus {
            log_best_effort(
                cpu::set_cpu_limit(&self.controller_dir("cpu"), cpus, host_cpu_count()),
                "write cpu limit",
            );
        }
        if let Some(pids) = limits.pids {
            log_best_effort(
                pids::set_pids_max(&self.controller_dir("pids"), pids),
                "write pids limit",
            );
        }
    }

    /// Best-effort removal of all three controller directories.
    ///
    /// A lingering cgroup directory must never block container
    /// teardown, so errors are logged and dropped.
    pub fn remove(&self) {
        for controller in CONTROLLERS {
            let dir = self.controller_dir(controller);
            if dir.exists() {
                log_best_effort(
                    std::fs::remove_dir(&dir).map_err(|e| CigError::Io {
                        path: dir.clone(),
                        source: e,
                    }),
                    "remove cgroup directory",
                );
            }
        }
        tracing::debug!(id = %self.id, "cgroup hierarchies removed");
    }
}

/// Number of logical CPUs on the host; limits above this are rejected.
fn host_cpu_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| CigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Writes a single cgroup control file under `dir`.
pub(crate) fn write_control_file(dir: &Path, name: &str, value: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, value).map_err(|e| CigError::Io { path, source: e })
}
