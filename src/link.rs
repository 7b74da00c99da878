//! The seam between the announcer core and the wire: per-interface responder
//! handles, and the source that enumerates interfaces and opens responders on
//! them. Production uses [`SysLinks`]; tests substitute recording mocks.

use crate::arp::ArpResponder;
use crate::error::Error;
use crate::ndp::NdpResponder;
use netif::Interface;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;

/// Why an inbound packet was not answered. `None` means "answer it".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    None,
    Closed,
    Error,
    ArpReply,
    MessageType,
    NoSourceLl,
    EthernetDestination,
    AnnounceIp,
}

/// The responder's question to the control plane: should I answer for this
/// address right now?
pub type Decider = Arc<dyn Fn(IpAddr) -> DropReason + Send + Sync>;

/// Handle on one interface's ARP responder.
pub trait ArpLink: Send + Sync {
    /// Name of the interface this responder answers on.
    fn interface(&self) -> &str;

    /// Emits a gratuitous ARP announcement for `ip`.
    fn gratuitous(&self, ip: Ipv4Addr) -> Result<(), Error>;

    /// Releases the socket. Further sends fail with [`Error::Closed`].
    fn close(&mut self);
}

/// Handle on one interface's NDP responder.
pub trait NdpLink: Send + Sync {
    /// Name of the interface this responder answers on.
    fn interface(&self) -> &str;

    /// Emits an unsolicited neighbor advertisement for `ip`.
    fn gratuitous(&self, ip: Ipv6Addr) -> Result<(), Error>;

    /// Joins the solicited-node multicast group for `ip`, so solicitations
    /// for it reach us. Idempotent per address.
    fn watch(&self, ip: Ipv6Addr) -> Result<(), Error>;

    /// Leaves the solicited-node multicast group for `ip`. Idempotent.
    fn unwatch(&self, ip: Ipv6Addr) -> Result<(), Error>;

    /// Releases the socket and all multicast memberships.
    fn close(&mut self);
}

/// Where responders come from, and what the interface tracker scans.
pub trait LinkSource: Send + Sync {
    /// Enumerates the host's interfaces.
    fn interfaces(&self) -> io::Result<Vec<Interface>>;

    /// True when the interface is enslaved to a bond or bridge; the master
    /// is the one that should respond.
    fn is_slave(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// The kernel's full per-interface flags word, which carries bits (like
    /// NOARP) that interface enumeration doesn't report.
    fn kernel_flags(&self, name: &str) -> Option<u32> {
        let _ = name;
        None
    }

    /// Opens an ARP responder on the interface.
    fn open_arp(&self, intf: &Interface, decide: Decider) -> Result<Box<dyn ArpLink>, Error>;

    /// Opens an NDP responder on the interface.
    fn open_ndp(&self, intf: &Interface, decide: Decider) -> Result<Box<dyn NdpLink>, Error>;
}

/// The production [`LinkSource`]: kernel interfaces, sysfs probes, and raw
/// sockets.
pub struct SysLinks;

impl LinkSource for SysLinks {
    fn interfaces(&self) -> io::Result<Vec<Interface>> {
        netif::interfaces()
    }

    fn is_slave(&self, name: &str) -> bool {
        Path::new(&format!("/sys/class/net/{}/master", name)).exists()
    }

    fn kernel_flags(&self, name: &str) -> Option<u32> {
        let text = fs::read_to_string(format!("/sys/class/net/{}/flags", name)).ok()?;
        parse_sys_flags(&text)
    }

    fn open_arp(&self, intf: &Interface, decide: Decider) -> Result<Box<dyn ArpLink>, Error> {
        Ok(Box::new(ArpResponder::new(intf, decide)?))
    }

    fn open_ndp(&self, intf: &Interface, decide: Decider) -> Result<Box<dyn NdpLink>, Error> {
        Ok(Box::new(NdpResponder::new(intf, decide)?))
    }
}

// The sysfs flags file is a single line like "0x1003".
fn parse_sys_flags(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys_flags_formats() {
        assert_eq!(parse_sys_flags("0x1003\n"), Some(0x1003));
        assert_eq!(parse_sys_flags("0X83\n"), Some(0x83));
        assert_eq!(parse_sys_flags("4099"), Some(4099));
        assert_eq!(parse_sys_flags("bogus"), None);
    }
}
