//! CPU bandwidth control via the CFS quota files.

use std::path::Path;

use cig_common::constants::CFS_PERIOD_US;
use cig_common::error::Result;

/// Computes the CFS quota in microseconds for a core-count request.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quota_for(cpus: f64, period_us: u64) -> u64 {
    (period_us as f64 * cpus) as u64
}

/// Writes the CFS period and quota expressing a limit of `cpus` cores.
///
/// Requests exceeding the host's logical core count are rejected with
/// a warning and no file is written; a container with an impossible
/// quota is worse than one with no quota.
///
/// # Errors
///
/// Returns an error if either control file cannot be written.
#[allow(clippy::cast_precision_loss)]
pub fn set_cpu_limit(cpu_dir: &Path, cpus: f64, host_cpus: usize) -> Result<()> {
    if cpus > host_cpus as f64 {
        tracing::warn!(
            requested = cpus,
            available = host_cpus,
            "ignoring CPU quota greater than available CPUs"
        );
        return Ok(());
    }

    super::write_control_file(cpu_dir, "cpu.cfs_period_us", &CFS_PERIOD_US.to_string())?;
    super::write_control_file(
        cpu_dir,
        "cpu.cfs_quota_us",
        &quota_for(cpus, CFS_PERIOD_US).to_string(),
    )?;
    tracing::debug!(cpus, "CPU quota set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_scales_with_period() {
        assert_eq!(quota_for(0.5, 1_000_000), 500_000);
        assert_eq!(quota_for(2.0, 1_000_000), 2_000_000);
        assert_eq!(quota_for(0.25, 100_000), 25_000);
    }

    #[test]
    fn request_above_host_count_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        set_cpu_limit(dir.path(), 3.0, 2).expect("rejection is not an error");
        assert!(!dir.path().join("cpu.cfs_quota_us").exists());
    }

    #[test]
    fn request_within_host_count_writes_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        set_cpu_limit(dir.path(), 1.5, 2).expect("set failed");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cpu.cfs_quota_us")).expect("quota"),
            "1500000"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cpu.cfs_period_us")).expect("period"),
            "1000000"
        );
    }
}
