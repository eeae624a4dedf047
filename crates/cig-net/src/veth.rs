//! Per-container veth pairs.
//!
//! Each container owns a pair named after its id: `veth0_<short>`
//! stays on the host enslaved to the bridge, `veth1_<short>` is moved
//! into the container's network namespace and addressed there. The
//! move and the in-namespace configuration run in separate re-exec
//! phases because configuring requires joining the namespace, which is
//! irreversible for the calling process.

use std::net::Ipv4Addr;
use std::os::fd::AsFd;

use cig_common::constants::{BRIDGE_NAME, BRIDGE_PREFIX_LEN};
use cig_common::error::{Result, log_best_effort};
use cig_common::types::{ContainerId, random_octets};
use cig_core::namespace::netns;

use crate::bridge;
use crate::netlink::{self, NetlinkSocket};

/// Name of the host-side end of a container's veth pair.
#[must_use]
pub fn host_interface_name(id: &ContainerId) -> String {
    format!("veth0_{}", id.short())
}

/// Name of the container-side end of a container's veth pair.
#[must_use]
pub fn container_interface_name(id: &ContainerId) -> String {
    format!("veth1_{}", id.short())
}

/// A random locally administered unicast MAC for the container end.
#[must_use]
pub fn random_mac() -> [u8; 6] {
    let octets = random_octets();
    [0x02, 0x42, octets[0], octets[1], octets[2], octets[3]]
}

/// A random address inside the bridge subnet for a container.
#[must_use]
pub fn random_container_address() -> Ipv4Addr {
    let octets = random_octets();
    Ipv4Addr::new(172, 29, octets[0] % 254, octets[1] % 254)
}

/// Creates the container's veth pair on the host. The host end is
/// enslaved to the bridge at creation and brought up; the peer end
/// stays down until it is configured inside the namespace.
///
/// # Errors
///
/// Returns an error if the bridge is missing or a netlink request
/// fails.
pub fn attach_veth(id: &ContainerId) -> Result<()> {
    let host_name = host_interface_name(id);
    let peer_name = container_interface_name(id);
    let bridge_index = netlink::interface_index(BRIDGE_NAME)?;

    let mut socket = NetlinkSocket::open()?;
    socket.create_veth_pair(&host_name, &peer_name, &random_mac(), bridge_index)?;
    socket.set_link_up(netlink::interface_index(&host_name)?)?;
    tracing::info!(id = %id, host = %host_name, peer = %peer_name, "veth pair attached");
    Ok(())
}

/// Moves the container-side end of the pair into the container's
/// network namespace, identified by its marker file.
///
/// # Errors
///
/// Returns an error if the marker is missing or the netlink request
/// fails.
pub fn move_into_namespace(id: &ContainerId) -> Result<()> {
    let peer_name = container_interface_name(id);
    let index = netlink::interface_index(&peer_name)?;
    let marker = netns::open_marker(id)?;

    let mut socket = NetlinkSocket::open()?;
    socket.move_link_to_namespace(index, marker.as_fd())?;
    tracing::debug!(id = %id, peer = %peer_name, "veth moved into namespace");
    Ok(())
}

/// Joins the container's network namespace and configures the veth
/// end inside it: a random subnet address, link up, and a default
/// route through the bridge.
///
/// Irreversibly moves the calling process into the namespace; run only
/// from a dedicated re-exec phase.
///
/// # Errors
///
/// Returns an error if joining the namespace or any netlink request
/// fails.
pub fn configure_in_namespace(id: &ContainerId) -> Result<()> {
    netns::join(id)?;

    let peer_name = container_interface_name(id);
    let index = netlink::interface_index(&peer_name)?;
    let address = random_container_address();

    let mut socket = NetlinkSocket::open()?;
    socket.add_address(index, address, BRIDGE_PREFIX_LEN)?;
    socket.set_link_up(index)?;
    socket.add_default_route(index, bridge::gateway_address())?;
    tracing::info!(id = %id, address = %address, "container network configured");
    Ok(())
}

/// Brings up the loopback interface in the current namespace. Failures
/// are logged only; the container command can still run without lo.
pub fn configure_loopback() {
    log_best_effort(configure_loopback_inner(), "configure loopback");
}

fn configure_loopback_inner() -> Result<()> {
    let index = netlink::interface_index("lo")?;
    let mut socket = NetlinkSocket::open()?;
    socket.add_address(index, Ipv4Addr::LOCALHOST, 32)?;
    socket.set_link_up(index)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> ContainerId {
        ContainerId::parse("0123456789ab").expect("valid id")
    }

    #[test]
    fn interface_names_embed_short_id() {
        let id = sample_id();
        assert_eq!(host_interface_name(&id), "veth0_012345");
        assert_eq!(container_interface_name(&id), "veth1_012345");
    }

    #[test]
    fn interface_names_fit_the_kernel_limit() {
        let id = sample_id();
        // IFNAMSIZ is 16 including the NUL terminator.
        assert!(host_interface_name(&id).len() < 16);
        assert!(container_interface_name(&id).len() < 16);
    }

    #[test]
    fn mac_is_locally_administered_unicast() {
        let mac = random_mac();
        assert_eq!(mac[0] & 0x02, 0x02); // locally administered
        assert_eq!(mac[0] & 0x01, 0x00); // unicast
    }

    #[test]
    fn container_address_stays_in_bridge_subnet() {
        for _ in 0..32 {
            let addr = random_container_address();
            let [a, b, c, d] = addr.octets();
            assert_eq!((a, b), (172, 29));
            assert!(c < 254);
            assert!(d < 254);
        }
    }
}
