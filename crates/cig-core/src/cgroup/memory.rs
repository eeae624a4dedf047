//! Memory limits via the v1 memory controller.

use std::path::Path;

use cig_common::error::Result;

const MIB: u64 = 1024 * 1024;

/// Writes the RAM ceiling and, when a swap allowance is supplied, the
/// combined memory+swap ceiling.
///
/// `memory.memsw.limit_in_bytes` holds the total the group may consume
/// across RAM and swap. Left untouched, a group with a RAM cap can
/// still consume unlimited swap, so any supplied swap value (zero
/// included) produces a memsw write of `mem + swap` bytes.
///
/// # Errors
///
/// Returns an error if a control file cannot be written.
pub fn set_memory_limit(memory_dir: &Path, limit_mb: u64, swap_mb: Option<u64>) -> Result<()> {
    // limit_mb comes straight from a CLI flag; saturate instead of
    // overflowing on absurd values.
    super::write_control_file(
        memory_dir,
        "memory.limit_in_bytes",
        &limit_mb.saturating_mul(MIB).to_string(),
    )?;

    if let Some(swap) = swap_mb {
        super::write_control_file(
            memory_dir,
            "memory.memsw.limit_in_bytes",
            &limit_mb.saturating_add(swap).saturating_mul(MIB).to_string(),
        )?;
    }
    tracing::debug!(limit_mb, ?swap_mb, "memory limit set");
    Ok(())
}
