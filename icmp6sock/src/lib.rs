//! Raw ICMPv6 sockets for neighbor discovery: type-filtered receive,
//! solicited-node multicast membership, and hop-limit-255 sends.
//!
//! The kernel owns the ICMPv6 checksum on this socket type: it fills it in on
//! send and drops inbound messages that fail verification, so callers deal in
//! checksum-less message bytes.
#![deny(missing_docs)]

mod linux;

use libc;
use std::{
    ffi::CStr,
    io,
    mem::{self, MaybeUninit},
    net::Ipv6Addr,
    time::Duration,
};

/// A raw ICMPv6 socket, optionally bound to one interface.
pub struct Socket {
    fd: libc::c_int,
}

impl Socket {
    /// Creates a new raw ICMPv6 socket.
    pub fn new() -> io::Result<Socket> {
        // This block must be marked as unsafe because it uses FFI with C code.
        // We believe it to be safe because it does not touch Rust-owned memory
        // and upholds the Socket invariant of returning Err on failure.
        let fd = unsafe {
            // Resources:
            // man 7 ipv6, man 2 socket
            let fd = libc::socket(libc::AF_INET6, libc::SOCK_RAW, libc::IPPROTO_ICMPV6);
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            fd
        };
        Ok(Socket { fd })
    }

    /// Restricts receive to the given ICMPv6 message types.
    pub fn set_filter(&mut self, pass_types: &[u8]) -> io::Result<()> {
        let mut filter = linux::icmp6_filter::block_all();
        for msg_type in pass_types {
            filter.pass(*msg_type);
        }
        self.setsockopt(
            libc::IPPROTO_ICMPV6,
            linux::ICMP6_FILTER,
            &filter as *const _ as *const libc::c_void,
            mem::size_of::<linux::icmp6_filter>(),
        )
    }

    /// Binds the socket to one interface so we only see that link's traffic.
    pub fn bind_device(&mut self, iface: impl AsRef<CStr>) -> io::Result<()> {
        let name = iface.as_ref().to_bytes_with_nul();
        self.setsockopt(
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            name.as_ptr() as *const libc::c_void,
            name.len(),
        )
    }

    /// Sets both the unicast and multicast hop limits. Neighbor discovery
    /// requires 255 (RFC 4861 section 7.1; receivers drop anything less).
    pub fn set_hop_limits(&mut self, hops: i32) -> io::Result<()> {
        let hops: libc::c_int = hops;
        self.setsockopt(
            libc::IPPROTO_IPV6,
            libc::IPV6_MULTICAST_HOPS,
            &hops as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>(),
        )?;
        self.setsockopt(
            libc::IPPROTO_IPV6,
            libc::IPV6_UNICAST_HOPS,
            &hops as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>(),
        )
    }

    /// Arranges for `recv_from` to give up with `WouldBlock` after the given
    /// duration, so a receive loop can notice shutdown.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        self.setsockopt(
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &tv as *const _ as *const libc::c_void,
            mem::size_of::<libc::timeval>(),
        )
    }

    /// Joins a multicast group on the given interface.
    pub fn join_group(&self, group: Ipv6Addr, if_index: u32) -> io::Result<()> {
        self.membership(libc::IPV6_ADD_MEMBERSHIP, group, if_index)
    }

    /// Leaves a multicast group on the given interface.
    pub fn leave_group(&self, group: Ipv6Addr, if_index: u32) -> io::Result<()> {
        self.membership(libc::IPV6_DROP_MEMBERSHIP, group, if_index)
    }

    /// Sends one ICMPv6 message to `dst` out of the given interface. The
    /// scope id matters: link-local and multicast destinations are ambiguous
    /// without one.
    pub fn send_to(&self, msg: &[u8], dst: Ipv6Addr, if_index: u32) -> io::Result<usize> {
        // This block is marked as unsafe because it uses FFI. We believe it to
        // be safe because it borrows the Rust-owned message and a stack-owned
        // sockaddr for the duration of the call only.
        unsafe {
            let mut sin6: libc::sockaddr_in6 = MaybeUninit::zeroed().assume_init();
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_addr = libc::in6_addr {
                s6_addr: dst.octets(),
            };
            sin6.sin6_scope_id = if_index;
            // Resources:
            // man 2 sendto, man 7 ipv6 regarding sin6_scope_id
            let bytes = libc::sendto(
                self.fd,
                msg.as_ptr() as *const _,
                msg.len(),
                0,
                &sin6 as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }

    /// Receives one ICMPv6 message and the address it came from. Blocks until
    /// a message arrives or the configured read timeout elapses.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv6Addr)> {
        // See the safety note on send_to.
        unsafe {
            let mut storage = MaybeUninit::<libc::sockaddr_in6>::zeroed();
            let mut addrlen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
            let bytes = libc::recvfrom(
                self.fd,
                buf.as_mut_ptr() as *mut _,
                buf.len(),
                0,
                storage.as_mut_ptr() as *mut libc::sockaddr,
                &mut addrlen,
            );
            if bytes < 0 {
                return Err(io::Error::last_os_error());
            }
            let sin6 = storage.assume_init();
            Ok((bytes as usize, Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
    }

    fn membership(&self, opt: libc::c_int, group: Ipv6Addr, if_index: u32) -> io::Result<()> {
        let mreq = libc::ipv6_mreq {
            ipv6mr_multiaddr: libc::in6_addr {
                s6_addr: group.octets(),
            },
            ipv6mr_interface: if_index as libc::c_uint,
        };
        self.setsockopt(
            libc::IPPROTO_IPV6,
            opt,
            &mreq as *const _ as *const libc::c_void,
            mem::size_of::<libc::ipv6_mreq>(),
        )
    }

    fn setsockopt(
        &self,
        level: libc::c_int,
        name: libc::c_int,
        value: *const libc::c_void,
        len: usize,
    ) -> io::Result<()> {
        // This block is marked as unsafe because it uses FFI, however, the
        // callers above all pass a pointer/length pair describing memory that
        // outlives the call.
        // Resources:
        // man 2 setsockopt
        unsafe {
            let err = libc::setsockopt(self.fd, level, name, value, len as libc::socklen_t);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
