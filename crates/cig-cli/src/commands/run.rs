//! `cig run`: start a container and run a command to completion.

use clap::Args;

use cig_common::types::{ImageReference, ResourceLimits};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Max RAM to allow, in megabytes.
    #[arg(long)]
    pub mem: Option<u64>,

    /// Max swap to allow, in megabytes; only honored together with --mem.
    #[arg(long)]
    pub swap: Option<u64>,

    /// Max number of processes.
    #[arg(long)]
    pub pids: Option<u64>,

    /// CPU cores to restrict to (fractions allowed, e.g. 0.5).
    #[arg(long)]
    pub cpus: Option<f64>,

    /// Image reference, `name[:tag]`; the tag defaults to `latest`.
    pub image: String,

    /// Command to run in the container, with its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if any fatal lifecycle phase fails.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let limits = ResourceLimits {
        memory_mb: args.mem,
        swap_mb: args.swap,
        pids: args.pids,
        cpus: args.cpus,
    };
    let image = ImageReference::parse(&args.image);
    cig_runtime::lifecycle::run_container(&limits, &image, &args.command)?;
    Ok(())
}
