//! `cig exec`: run a command inside a running container.

use clap::Args;

use cig_common::types::ContainerId;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Id of the running container.
    pub container_id: String,

    /// Command to run, with its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// # Errors
///
/// Returns an error if the container is not running or the attach
/// fails.
pub fn execute(args: ExecArgs) -> anyhow::Result<()> {
    let id = ContainerId::parse(args.container_id)?;
    cig_runtime::exec::join_running(&id, &args.command)?;
    Ok(())
}
