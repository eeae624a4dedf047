//! # cig-core
//!
//! Low-level Linux isolation primitives for the cig runtime.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups v1**: per-controller limit hierarchies for memory, CPU,
//!   and process count.
//! - **Filesystem**: overlay mounts, container virtual filesystems,
//!   and root switching.
//! - **Namespaces**: `unshare(2)`/`setns(2)` wrappers and the
//!   bind-mounted network namespace handle protocol.
//!
//! Everything here runs against the live kernel and requires root.

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
