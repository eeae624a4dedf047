//! Hidden re-exec phases.
//!
//! These subcommands exist because namespace transitions are
//! irreversible for the process that makes them: the orchestrator
//! re-execs its own binary so that each transition happens in a
//! process built to either finish its one job or exit non-zero.

use clap::Args;

use cig_common::types::{ContainerId, ResourceLimits};
use cig_core::namespace::netns;
use cig_net::veth;
use cig_runtime::child::{ChildSpec, exec_container_command};

/// Arguments shared by the network setup phases.
#[derive(Args, Debug)]
pub struct PhaseArgs {
    /// Id of the container being set up.
    pub container_id: String,
}

/// `setup-netns`: creates the container's durable network namespace
/// behind its bind-mounted marker file.
///
/// # Errors
///
/// Returns an error if the namespace cannot be created.
pub fn setup_netns(args: &PhaseArgs) -> anyhow::Result<()> {
    let id = ContainerId::parse(&args.container_id)?;
    netns::create(&id)?;
    Ok(())
}

/// `setup-veth`: creates the container's veth pair, moves the peer
/// end into the namespace, and configures it from the inside. The
/// final step joins the namespace, which is why this runs in its own
/// process.
///
/// # Errors
///
/// Returns an error if any of the three steps fails.
pub fn setup_veth(args: &PhaseArgs) -> anyhow::Result<()> {
    let id = ContainerId::parse(&args.container_id)?;
    veth::attach_veth(&id)?;
    veth::move_into_namespace(&id)?;
    veth::configure_in_namespace(&id)?;
    Ok(())
}

/// Arguments for the `child-mode` phase, mirroring `run`'s limit
/// flags plus the resolved image hash.
#[derive(Args, Debug)]
pub struct ChildModeArgs {
    /// Max RAM in megabytes.
    #[arg(long)]
    pub mem: Option<u64>,

    /// Max swap in megabytes.
    #[arg(long)]
    pub swap: Option<u64>,

    /// Max number of processes.
    #[arg(long)]
    pub pids: Option<u64>,

    /// CPU cores to restrict to.
    #[arg(long)]
    pub cpus: Option<f64>,

    /// Hash of the stored image to run from.
    #[arg(long)]
    pub img: String,

    /// Id of the container being started.
    pub container_id: String,

    /// User command and arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// `child-mode`: the container's init process.
///
/// # Errors
///
/// Returns an error if container setup or the command spawn fails.
pub fn child_mode(args: ChildModeArgs) -> anyhow::Result<()> {
    let spec = ChildSpec {
        id: ContainerId::parse(args.container_id)?,
        image_hash: args.img,
        limits: ResourceLimits {
            memory_mb: args.mem,
            swap_mb: args.swap,
            pids: args.pids,
            cpus: args.cpus,
        },
        command: args.command,
    };
    exec_container_command(&spec)?;
    Ok(())
}
