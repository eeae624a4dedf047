//! Container network fabric.
//!
//! Containers share one bridge (`cig0`) on the host. Each container
//! gets a veth pair: the host end is enslaved to the bridge, the peer
//! end is moved into the container's network namespace and given a
//! random address from the bridge subnet. All link and address
//! manipulation goes through a small hand-rolled rtnetlink codec
//! rather than shelling out to `ip(8)`.

pub mod bridge;
pub mod netlink;
pub mod veth;
