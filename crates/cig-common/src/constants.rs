//! System-wide constants and default paths.

/// Base directory for durable cig data (images, metadata).
pub const CIG_HOME_PATH: &str = "/var/lib/cig";

/// Scratch space for in-flight image downloads.
pub const CIG_TEMP_PATH: &str = "/var/lib/cig/tmp";

/// Unpacked image layers and image metadata.
pub const CIG_IMAGES_PATH: &str = "/var/lib/cig/images";

/// Per-container directory trees (`<id>/fs/{mnt,upperdir,workdir}`).
pub const CIG_CONTAINERS_PATH: &str = "/var/run/cig/containers";

/// Bind-mounted network namespace handles, one file per container.
pub const CIG_NET_NS_PATH: &str = "/var/run/cig/net-ns";

/// Cgroup v1 controller hierarchy root.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Subdirectory under each controller root that holds cig containers.
pub const CGROUP_SUBGROUP: &str = "cig";

/// CFS accounting period used when applying CPU quotas, in microseconds.
pub const CFS_PERIOD_US: u64 = 1_000_000;

/// Name of the host-level virtual switch shared by all containers.
pub const BRIDGE_NAME: &str = "cig0";

/// Address assigned to the bridge; also the containers' default gateway.
pub const BRIDGE_ADDRESS: [u8; 4] = [172, 29, 0, 1];

/// Prefix length of the container network.
pub const BRIDGE_PREFIX_LEN: u8 = 16;

/// Hex length of a full image content hash as stored on disk.
pub const IMAGE_HASH_LENGTH: usize = 12;

/// Application name used in logs and CLI output.
pub const APP_NAME: &str = "cig";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "cig";

/// Returns every directory the runtime expects to exist before any
/// operation runs.
#[must_use]
pub fn required_dirs() -> [&'static str; 5] {
    [
        CIG_HOME_PATH,
        CIG_TEMP_PATH,
        CIG_IMAGES_PATH,
        CIG_CONTAINERS_PATH,
        CIG_NET_NS_PATH,
    ]
}
