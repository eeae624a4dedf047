//! Container lifecycle orchestration.
//!
//! Ties the lower crates together: composes the overlay root from
//! image layers, drives the namespace re-exec phases, runs the user
//! command in its isolated child, exposes the running-container
//! registry derived from cgroupfs and `/proc`, and attaches new
//! commands to running containers.

pub mod child;
pub mod composer;
pub mod exec;
pub mod lifecycle;
pub mod registry;
