//! Minimal rtnetlink codec over a raw `AF_NETLINK` socket.
//!
//! Implements just the handful of `RTM_NEWLINK` / `RTM_NEWADDR` /
//! `RTM_NEWROUTE` requests the runtime needs. Every request carries
//! `NLM_F_ACK` and is confirmed by reading the kernel's `NLMSG_ERROR`
//! reply, so a failed operation surfaces as an errno instead of a
//! silently missing interface.

// Raw sockets and if_nametoindex have no safe wrapper in the stack.
#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use cig_common::error::{CigError, Result};

const RTM_NEWLINK: u16 = 16;
const RTM_NEWADDR: u16 = 20;
const RTM_NEWROUTE: u16 = 24;
const NLMSG_ERROR: u16 = 2;

const NLM_F_REQUEST: u16 = 0x0001;
const NLM_F_ACK: u16 = 0x0004;
const NLM_F_EXCL: u16 = 0x0200;
const NLM_F_CREATE: u16 = 0x0400;

const IFLA_ADDRESS: u16 = 1;
const IFLA_IFNAME: u16 = 3;
const IFLA_MASTER: u16 = 10;
const IFLA_LINKINFO: u16 = 18;
const IFLA_NET_NS_FD: u16 = 28;

const IFLA_INFO_KIND: u16 = 1;
const IFLA_INFO_DATA: u16 = 2;
const VETH_INFO_PEER: u16 = 1;

const IFA_ADDRESS: u16 = 1;
const IFA_LOCAL: u16 = 2;

const RTA_OIF: u16 = 4;
const RTA_GATEWAY: u16 = 5;

const RT_TABLE_MAIN: u8 = 254;
const RTPROT_BOOT: u8 = 3;
const RT_SCOPE_UNIVERSE: u8 = 0;
const RTN_UNICAST: u8 = 1;

const NLA_F_NESTED: u16 = 1 << 15;
const NLMSG_HDRLEN: usize = 16;
const NLATTR_HDRLEN: usize = 4;
const IFINFOMSG_LEN: usize = 16;

const IFF_UP: u32 = 0x1;

/// Looks up an interface index by name.
///
/// # Errors
///
/// Returns [`CigError::NotFound`] when no interface has that name.
pub fn interface_index(name: &str) -> Result<u32> {
    let c_name = CString::new(name).map_err(|_| CigError::Net {
        message: format!("interface name contains NUL: {name:?}"),
    })?;
    // SAFETY: c_name is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(CigError::NotFound {
            kind: "network interface",
            id: name.to_owned(),
        });
    }
    Ok(index)
}

/// Whether an interface with the given name exists.
#[must_use]
pub fn interface_exists(name: &str) -> bool {
    interface_index(name).is_ok()
}

/// An rtnetlink request under construction.
///
/// Attribute payloads are padded to the 4-byte netlink alignment as
/// they are appended; the total message length is patched into the
/// header by [`MessageBuilder::finish`].
struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    fn new(msg_type: u16, flags: u16, seq: u32) -> Self {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&0u32.to_ne_bytes()); // length, patched later
        buf.extend_from_slice(&msg_type.to_ne_bytes());
        buf.extend_from_slice(&(NLM_F_REQUEST | NLM_F_ACK | flags).to_ne_bytes());
        buf.extend_from_slice(&seq.to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes()); // port id, kernel fills this
        Self { buf }
    }

    /// Appends an `ifinfomsg` body.
    fn link_header(&mut self, index: u32, flags: u32, change: u32) -> &mut Self {
        self.buf.push(libc::AF_UNSPEC as u8);
        self.buf.push(0); // padding
        self.buf.extend_from_slice(&0u16.to_ne_bytes()); // device type
        self.buf.extend_from_slice(&index.to_ne_bytes());
        self.buf.extend_from_slice(&flags.to_ne_bytes());
        self.buf.extend_from_slice(&change.to_ne_bytes());
        self
    }

    /// Appends an `ifaddrmsg` body.
    fn addr_header(&mut self, prefix_len: u8, index: u32) -> &mut Self {
        self.buf.push(libc::AF_INET as u8);
        self.buf.push(prefix_len);
        self.buf.push(0); // flags
        self.buf.push(0); // scope
        self.buf.extend_from_slice(&index.to_ne_bytes());
        self
    }

    /// Appends an `rtmsg` body for a unicast route in the main table.
    fn route_header(&mut self, dst_len: u8) -> &mut Self {
        self.buf.push(libc::AF_INET as u8);
        self.buf.push(dst_len);
        self.buf.push(0); // source length
        self.buf.push(0); // tos
        self.buf.push(RT_TABLE_MAIN);
        self.buf.push(RTPROT_BOOT);
        self.buf.push(RT_SCOPE_UNIVERSE);
        self.buf.push(RTN_UNICAST);
        self.buf.extend_from_slice(&0u32.to_ne_bytes()); // route flags
        self
    }

    fn attr(&mut self, attr_type: u16, payload: &[u8]) -> &mut Self {
        let len = NLATTR_HDRLEN + payload.len();
        self.buf.extend_from_slice(&(len as u16).to_ne_bytes());
        self.buf.extend_from_slice(&attr_type.to_ne_bytes());
        self.buf.extend_from_slice(payload);
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
        self
    }

    /// Appends a string attribute with its NUL terminator.
    fn attr_str(&mut self, attr_type: u16, value: &str) -> &mut Self {
        let mut payload = Vec::with_capacity(value.len() + 1);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.attr(attr_type, &payload)
    }

    fn attr_u32(&mut self, attr_type: u16, value: u32) -> &mut Self {
        self.attr(attr_type, &value.to_ne_bytes())
    }

    /// Opens a nested attribute and returns its header offset for
    /// [`MessageBuilder::end_nested`].
    fn begin_nested(&mut self, attr_type: u16) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&0u16.to_ne_bytes()); // length, patched later
        self.buf
            .extend_from_slice(&(attr_type | NLA_F_NESTED).to_ne_bytes());
        start
    }

    /// Patches the length of a nested attribute opened at `start`.
    /// Children are already aligned, so no trailing pad is needed.
    fn end_nested(&mut self, start: usize) -> &mut Self {
        let len = (self.buf.len() - start) as u16;
        self.buf[start..start + 2].copy_from_slice(&len.to_ne_bytes());
        self
    }

    /// Patches the total length and returns the wire bytes.
    fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }
}

/// A connected rtnetlink socket.
pub struct NetlinkSocket {
    fd: OwnedFd,
    seq: u32,
}

impl NetlinkSocket {
    /// Opens and binds an rtnetlink socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub fn open() -> Result<Self> {
        // SAFETY: plain socket(2) call, the result is checked below.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::NETLINK_ROUTE,
            )
        };
        if raw < 0 {
            return Err(CigError::Syscall {
                op: "netlink socket",
                source: io::Error::last_os_error(),
            });
        }
        // SAFETY: raw is a freshly created fd owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: zeroed sockaddr_nl is a valid local netlink address.
        let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        // SAFETY: addr points to a properly sized sockaddr_nl.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::addr_of!(addr).cast(),
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(CigError::Syscall {
                op: "netlink bind",
                source: io::Error::last_os_error(),
            });
        }
        Ok(Self { fd, seq: 1 })
    }

    /// Creates a bridge device with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request, including
    /// `EEXIST` when the name is already taken.
    pub fn create_bridge(&mut self, name: &str) -> Result<()> {
        let mut msg = self.request(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL);
        msg.link_header(0, 0, 0).attr_str(IFLA_IFNAME, name);
        let info = msg.begin_nested(IFLA_LINKINFO);
        msg.attr_str(IFLA_INFO_KIND, "bridge").end_nested(info);
        self.execute(msg, "create bridge")
    }

    /// Creates a veth pair in one request. The peer carries the given
    /// hardware address; the primary end is enslaved to `master_index`
    /// at creation so it never exists unattached.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn create_veth_pair(
        &mut self,
        name: &str,
        peer_name: &str,
        peer_mac: &[u8; 6],
        master_index: u32,
    ) -> Result<()> {
        let mut msg = self.request(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL);
        msg.link_header(0, 0, 0)
            .attr_str(IFLA_IFNAME, name)
            .attr_u32(IFLA_MASTER, master_index);
        let info = msg.begin_nested(IFLA_LINKINFO);
        msg.attr_str(IFLA_INFO_KIND, "veth");
        let data = msg.begin_nested(IFLA_INFO_DATA);
        let peer = msg.begin_nested(VETH_INFO_PEER);
        // VETH_INFO_PEER wraps a full ifinfomsg plus the peer's own
        // attributes, unlike an ordinary attribute list.
        msg.link_header(0, 0, 0)
            .attr_str(IFLA_IFNAME, peer_name)
            .attr(IFLA_ADDRESS, peer_mac)
            .end_nested(peer)
            .end_nested(data)
            .end_nested(info);
        self.execute(msg, "create veth pair")
    }

    /// Brings an interface administratively up.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn set_link_up(&mut self, index: u32) -> Result<()> {
        let mut msg = self.request(RTM_NEWLINK, 0);
        msg.link_header(index, IFF_UP, IFF_UP);
        self.execute(msg, "set link up")
    }

    /// Moves an interface into the network namespace behind `ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn move_link_to_namespace(&mut self, index: u32, ns: BorrowedFd<'_>) -> Result<()> {
        let fd = u32::try_from(ns.as_raw_fd()).map_err(|_| CigError::Net {
            message: "namespace fd is negative".to_owned(),
        })?;
        let mut msg = self.request(RTM_NEWLINK, 0);
        msg.link_header(index, 0, 0).attr_u32(IFLA_NET_NS_FD, fd);
        self.execute(msg, "move link to namespace")
    }

    /// Assigns an IPv4 address with the given prefix length to an
    /// interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn add_address(&mut self, index: u32, address: Ipv4Addr, prefix_len: u8) -> Result<()> {
        let octets = address.octets();
        let mut msg = self.request(RTM_NEWADDR, NLM_F_CREATE | NLM_F_EXCL);
        msg.addr_header(prefix_len, index)
            .attr(IFA_LOCAL, &octets)
            .attr(IFA_ADDRESS, &octets);
        self.execute(msg, "add address")
    }

    /// Installs a default route through `gateway` on the interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn add_default_route(&mut self, index: u32, gateway: Ipv4Addr) -> Result<()> {
        let mut msg = self.request(RTM_NEWROUTE, NLM_F_CREATE);
        msg.route_header(0)
            .attr(RTA_GATEWAY, &gateway.octets())
            .attr_u32(RTA_OIF, index);
        self.execute(msg, "add default route")
    }

    fn request(&mut self, msg_type: u16, flags: u16) -> MessageBuilder {
        self.seq = self.seq.wrapping_add(1);
        MessageBuilder::new(msg_type, flags, self.seq)
    }

    fn execute(&mut self, msg: MessageBuilder, op: &'static str) -> Result<()> {
        let bytes = msg.finish();
        // SAFETY: bytes is a valid buffer for the duration of the call.
        let sent = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                bytes.as_ptr().cast(),
                bytes.len(),
                0,
            )
        };
        if sent < 0 {
            return Err(CigError::Syscall {
                op,
                source: io::Error::last_os_error(),
            });
        }
        self.read_ack(op)
    }

    /// Reads the kernel's reply and interprets the `NLMSG_ERROR`
    /// message: code zero is the ACK, anything else is a negated errno.
    fn read_ack(&mut self, op: &'static str) -> Result<()> {
        let mut buf = [0u8; 4096];
        // SAFETY: buf is a valid buffer for the duration of the call.
        let received = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
            )
        };
        if received < 0 {
            return Err(CigError::Syscall {
                op,
                source: io::Error::last_os_error(),
            });
        }
        let received = received as usize;
        if received < NLMSG_HDRLEN + 4 {
            return Err(CigError::Net {
                message: format!("{op}: truncated netlink reply ({received} bytes)"),
            });
        }

        let msg_type = u16::from_ne_bytes([buf[4], buf[5]]);
        if msg_type != NLMSG_ERROR {
            return Err(CigError::Net {
                message: format!("{op}: unexpected netlink reply type {msg_type}"),
            });
        }
        let code = i32::from_ne_bytes([
            buf[NLMSG_HDRLEN],
            buf[NLMSG_HDRLEN + 1],
            buf[NLMSG_HDRLEN + 2],
            buf[NLMSG_HDRLEN + 3],
        ]);
        if code == 0 {
            return Ok(());
        }
        Err(CigError::Syscall {
            op,
            source: io::Error::from_raw_os_error(-code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_length_is_patched_on_finish() {
        let mut msg = MessageBuilder::new(RTM_NEWLINK, 0, 7);
        msg.link_header(0, 0, 0);
        let bytes = msg.finish();
        let len = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len());
        assert_eq!(bytes.len(), NLMSG_HDRLEN + IFINFOMSG_LEN);
    }

    #[test]
    fn string_attributes_are_nul_terminated_and_padded() {
        let mut msg = MessageBuilder::new(RTM_NEWLINK, 0, 1);
        msg.link_header(0, 0, 0).attr_str(IFLA_IFNAME, "cig0");
        let bytes = msg.finish();
        let attr = &bytes[NLMSG_HDRLEN + IFINFOMSG_LEN..];
        let attr_len = u16::from_ne_bytes([attr[0], attr[1]]);
        // 4 header + "cig0" + NUL = 9, padded on the wire to 12.
        assert_eq!(attr_len, 9);
        assert_eq!(attr.len(), 12);
        assert_eq!(&attr[4..9], b"cig0\0");
        assert_eq!(&attr[9..12], &[0, 0, 0]);
    }

    #[test]
    fn nested_attribute_length_covers_children() {
        let mut msg = MessageBuilder::new(RTM_NEWLINK, 0, 1);
        msg.link_header(0, 0, 0);
        let info = msg.begin_nested(IFLA_LINKINFO);
        msg.attr_str(IFLA_INFO_KIND, "bridge").end_nested(info);
        let bytes = msg.finish();

        let nested = &bytes[NLMSG_HDRLEN + IFINFOMSG_LEN..];
        let nested_len = u16::from_ne_bytes([nested[0], nested[1]]);
        let nested_type = u16::from_ne_bytes([nested[2], nested[3]]);
        assert_eq!(nested_len as usize, nested.len());
        assert_eq!(nested_type, IFLA_LINKINFO | NLA_F_NESTED);
        // Child: 4 header + "bridge" + NUL = 11, padded to 12.
        assert_eq!(nested_len, 4 + 12);
    }

    #[test]
    fn veth_request_nests_peer_inside_link_info() {
        let mut msg = MessageBuilder::new(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL, 1);
        msg.link_header(0, 0, 0)
            .attr_str(IFLA_IFNAME, "veth0_abcdef")
            .attr_u32(IFLA_MASTER, 4);
        let info = msg.begin_nested(IFLA_LINKINFO);
        msg.attr_str(IFLA_INFO_KIND, "veth");
        let data = msg.begin_nested(IFLA_INFO_DATA);
        let peer = msg.begin_nested(VETH_INFO_PEER);
        msg.link_header(0, 0, 0)
            .attr_str(IFLA_IFNAME, "veth1_abcdef")
            .attr(IFLA_ADDRESS, &[0x02, 0x42, 1, 2, 3, 4])
            .end_nested(peer)
            .end_nested(data)
            .end_nested(info);
        let bytes = msg.finish();

        let len = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len());
        assert_eq!(bytes.len() % 4, 0);

        // The peer interface name travels inside the request.
        let needle = b"veth1_abcdef\0";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
        let kind = b"veth\0";
        assert!(bytes.windows(kind.len()).any(|w| w == kind));
    }

    #[test]
    fn route_header_targets_main_table() {
        let mut msg = MessageBuilder::new(RTM_NEWROUTE, NLM_F_CREATE, 1);
        msg.route_header(0);
        let bytes = msg.finish();
        let rtm = &bytes[NLMSG_HDRLEN..];
        assert_eq!(rtm[0], libc::AF_INET as u8);
        assert_eq!(rtm[1], 0); // default route, zero-length destination
        assert_eq!(rtm[4], RT_TABLE_MAIN);
        assert_eq!(rtm[7], RTN_UNICAST);
    }

    #[test]
    fn missing_interface_reports_not_found() {
        let err = interface_index("cig-does-not-exist").unwrap_err();
        assert!(matches!(err, CigError::NotFound { .. }));
    }
}
