//! The shared host bridge that all container veth pairs attach to.

use std::net::Ipv4Addr;

use cig_common::constants::{BRIDGE_ADDRESS, BRIDGE_NAME, BRIDGE_PREFIX_LEN};
use cig_common::error::Result;

use crate::netlink::{self, NetlinkSocket};

/// The gateway address containers route through.
#[must_use]
pub fn gateway_address() -> Ipv4Addr {
    Ipv4Addr::from(BRIDGE_ADDRESS)
}

/// Whether the bridge device already exists on the host.
#[must_use]
pub fn bridge_exists() -> bool {
    netlink::interface_exists(BRIDGE_NAME)
}

/// Creates the bridge, addresses it, and brings it up. Idempotent: an
/// existing bridge is left untouched, whatever state it is in.
///
/// # Errors
///
/// Returns an error if any netlink request fails.
pub fn ensure_bridge() -> Result<()> {
    if bridge_exists() {
        tracing::debug!(bridge = BRIDGE_NAME, "bridge already present");
        return Ok(());
    }

    let mut socket = NetlinkSocket::open()?;
    socket.create_bridge(BRIDGE_NAME)?;
    let index = netlink::interface_index(BRIDGE_NAME)?;
    socket.add_address(index, gateway_address(), BRIDGE_PREFIX_LEN)?;
    socket.set_link_up(index)?;
    tracing::info!(
        bridge = BRIDGE_NAME,
        address = %gateway_address(),
        prefix = BRIDGE_PREFIX_LEN,
        "bridge created"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_is_first_host_of_subnet() {
        assert_eq!(gateway_address(), Ipv4Addr::new(172, 29, 0, 1));
    }
}
