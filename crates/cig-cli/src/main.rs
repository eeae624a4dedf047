//! # cig: a minimal one-shot container runtime
//!
//! Runs a single command in an isolated environment assembled from an
//! OCI image: fresh namespaces, an overlay root, a bridged veth pair,
//! and cgroup v1 limits. Everything is torn down when the command
//! exits.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Namespaces, chroot, and the cgroup hierarchy all need root.
    if !nix::unistd::geteuid().is_root() {
        anyhow::bail!("cig needs root privileges; re-run with sudo");
    }
    cig_core::filesystem::create_dirs_if_missing(&cig_common::constants::required_dirs())?;

    let cli = Cli::parse();
    commands::execute(cli)
}
