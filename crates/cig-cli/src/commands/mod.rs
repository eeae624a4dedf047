//! CLI command definitions and dispatch.
//!
//! Besides the public subcommands, three hidden ones exist solely for
//! the runtime to re-exec itself into: `setup-netns` and `setup-veth`
//! perform the irreversible network namespace transitions in dedicated
//! short-lived processes, and `child-mode` is the container's init.

pub mod exec;
pub mod images;
pub mod phases;
pub mod ps;
pub mod rmi;
pub mod run;

use clap::{Parser, Subcommand};

/// cig, a minimal one-shot container runtime.
#[derive(Parser, Debug)]
#[command(name = "cig", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command from an image in a new container.
    Run(run::RunArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// List running containers.
    Ps,
    /// List locally stored images.
    Images,
    /// Remove a stored image by hash.
    Rmi(rmi::RmiArgs),
    /// Internal: create a container's network namespace.
    #[command(hide = true)]
    SetupNetns(phases::PhaseArgs),
    /// Internal: wire a container's veth pair into its namespace.
    #[command(hide = true)]
    SetupVeth(phases::PhaseArgs),
    /// Internal: container init, runs inside the new namespaces.
    #[command(hide = true)]
    ChildMode(phases::ChildModeArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Exec(args) => exec::execute(args),
        Command::Ps => ps::execute(),
        Command::Images => images::execute(),
        Command::Rmi(args) => rmi::execute(args),
        Command::SetupNetns(args) => phases::setup_netns(&args),
        Command::SetupVeth(args) => phases::setup_veth(&args),
        Command::ChildMode(args) => phases::child_mode(args),
    }
}
