//! Process-count limits via the v1 pids controller.

use std::path::Path;

use cig_common::error::Result;

/// Writes the maximum process count for the container.
///
/// # Errors
///
/// Returns an error if `pids.max` cannot be written.
pub fn set_pids_max(pids_dir: &Path, limit: u64) -> Result<()> {
    super::write_control_file(pids_dir, "pids.max", &limit.to_string())?;
    tracing::debug!(limit, "pids limit set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_written_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        set_pids_max(dir.path(), 128).expect("set failed");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pids.max")).expect("pids.max"),
            "128"
        );
    }
}
