//! The per-interface NDP responder: answers neighbor solicitations for
//! addresses the registry says we own, and emits unsolicited advertisements
//! on demand. Membership in each address's solicited-node multicast group is
//! what makes the solicitations reach us in the first place.

use crate::error::Error;
use crate::link::{Decider, DropReason, NdpLink};
use ferrolb_packets::{
    MacAddr, NeighborMessage, NA_FLAG_OVERRIDE, NA_FLAG_SOLICITED, ND_NEIGHBOR_ADVERT,
    ND_NEIGHBOR_SOLICIT, ND_OPT_TARGET_LINKADDR,
};
use netif::Interface;
use std::collections::HashMap;
use std::ffi::CString;
use std::io;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

pub(crate) struct NdpResponder {
    ifname: String,
    if_index: u32,
    hw_addr: MacAddr,
    sock: Arc<icmp6sock::Socket>,
    // Join count per solicited-node group: distinct addresses can share the
    // same low 24 bits, and the membership must outlive all of them.
    groups: Mutex<HashMap<Ipv6Addr, usize>>,
    closed: Arc<AtomicBool>,
    rx_thread: Option<thread::JoinHandle<()>>,
}

impl NdpResponder {
    pub(crate) fn new(intf: &Interface, decide: Decider) -> Result<NdpResponder, Error> {
        let hw_addr = intf
            .hardware_addr
            .ok_or_else(|| Error::NoHardwareAddress(intf.name.clone()))?;
        let name = CString::new(intf.name.as_str())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name has NUL"))?;

        let mut sock = icmp6sock::Socket::new()?;
        sock.set_filter(&[ND_NEIGHBOR_SOLICIT, ND_NEIGHBOR_ADVERT])?;
        sock.set_hop_limits(255)?;
        sock.set_read_timeout(RECV_TIMEOUT)?;
        sock.bind_device(&name)?;
        let sock = Arc::new(sock);

        let closed = Arc::new(AtomicBool::new(false));

        let rx_thread = {
            let sock = sock.clone();
            let closed = closed.clone();
            let ifname = intf.name.clone();
            let if_index = intf.index;
            thread::Builder::new()
                .name(format!("ndp-{}", intf.name))
                .spawn(move || recv_loop(sock, if_index, hw_addr, decide, closed, ifname))?
        };

        Ok(NdpResponder {
            ifname: intf.name.clone(),
            if_index: intf.index,
            hw_addr,
            sock,
            groups: Mutex::new(HashMap::new()),
            closed,
            rx_thread: Some(rx_thread),
        })
    }

    fn close_now(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        if let Some(handle) = self.rx_thread.take() {
            let _ = handle.join();
        }
        let mut groups = self.groups.lock().unwrap();
        for (group, _) in groups.drain() {
            if let Err(e) = self.sock.leave_group(group, self.if_index) {
                debug!(interface = %self.ifname, group = %group, error = %e,
                       "failed to leave multicast group on close");
            }
        }
    }
}

impl NdpLink for NdpResponder {
    fn interface(&self) -> &str {
        &self.ifname
    }

    fn gratuitous(&self, ip: Ipv6Addr) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Closed);
        }
        let advert = unsolicited_advert(self.hw_addr, ip);
        self.sock
            .send_to(&advert.data, ALL_NODES, self.if_index)
            .map_err(Error::Send)?;
        debug!(interface = %self.ifname, ip = %ip, "sent unsolicited neighbor advertisement");
        Ok(())
    }

    fn watch(&self, ip: Ipv6Addr) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Closed);
        }
        let group = solicited_node_multicast(ip);
        let mut groups = self.groups.lock().unwrap();
        if let Some(count) = groups.get_mut(&group) {
            *count += 1;
            return Ok(());
        }
        self.sock
            .join_group(group, self.if_index)
            .map_err(|source| Error::Join {
                group,
                interface: self.ifname.clone(),
                source,
            })?;
        groups.insert(group, 1);
        debug!(interface = %self.ifname, ip = %ip, group = %group, "joined solicited-node group");
        Ok(())
    }

    fn unwatch(&self, ip: Ipv6Addr) -> Result<(), Error> {
        let group = solicited_node_multicast(ip);
        let mut groups = self.groups.lock().unwrap();
        match groups.get_mut(&group) {
            Some(count) if *count > 1 => {
                *count -= 1;
                return Ok(());
            }
            Some(_) => {}
            None => return Ok(()),
        }
        groups.remove(&group);
        self.sock
            .leave_group(group, self.if_index)
            .map_err(|source| Error::Leave {
                group,
                interface: self.ifname.clone(),
                source,
            })?;
        debug!(interface = %self.ifname, ip = %ip, group = %group, "left solicited-node group");
        Ok(())
    }

    fn close(&mut self) {
        self.close_now();
    }
}

impl Drop for NdpResponder {
    fn drop(&mut self) {
        self.close_now();
    }
}

fn recv_loop(
    sock: Arc<icmp6sock::Socket>,
    if_index: u32,
    hw_addr: MacAddr,
    decide: Decider,
    closed: Arc<AtomicBool>,
    ifname: String,
) {
    let mut buf = vec![0u8; 1500];
    while !closed.load(Ordering::Relaxed) {
        let (len, from) = match sock.recv_from(&mut buf) {
            Ok(result) => result,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                if closed.load(Ordering::Relaxed) {
                    break;
                }
                error!(interface = %ifname, error = %e, "NDP receive failed");
                continue;
            }
        };

        match process_solicitation(&buf[..len], hw_addr, &decide) {
            Ok(advert) => {
                let ip = advert.target_addr();
                if let Err(e) = sock.send_to(&advert.data, from, if_index) {
                    error!(interface = %ifname, ip = %ip, error = %e,
                           "failed to send neighbor advertisement");
                } else {
                    debug!(interface = %ifname, ip = %ip, solicitor = %from,
                           "got neighbor solicitation, sent advertisement");
                }
            }
            Err(reason) => {
                trace!(interface = %ifname, reason = ?reason, "dropped NDP packet");
            }
        }
    }
}

/// Decides what to do with one inbound ICMPv6 message: an advertisement to
/// send back to the solicitor, or the reason the message is dropped. Pure
/// over bytes, so tests can drive it without a socket.
fn process_solicitation(
    buf: &[u8],
    hw_addr: MacAddr,
    decide: &Decider,
) -> Result<NeighborMessage, DropReason> {
    let msg = NeighborMessage::new(buf.to_vec()).map_err(|_| DropReason::Error)?;
    if msg.msg_type() != ND_NEIGHBOR_SOLICIT || msg.code() != 0 {
        return Err(DropReason::MessageType);
    }

    // Without a source link-layer address we have nobody to answer; this also
    // drops duplicate-address-detection probes, which must go unanswered by
    // a node that doesn't hold the address itself.
    if msg.source_lladdr().is_none() {
        return Err(DropReason::NoSourceLl);
    }

    let target = msg.target_addr();
    match decide(target.into()) {
        DropReason::None => {}
        reason => return Err(reason),
    }

    let mut advert = NeighborMessage::advert(target);
    advert
        .set_flags(NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE)
        .push_lladdr_option(ND_OPT_TARGET_LINKADDR, hw_addr);
    Ok(advert)
}

fn unsolicited_advert(hw_addr: MacAddr, ip: Ipv6Addr) -> NeighborMessage {
    let mut advert = NeighborMessage::advert(ip);
    advert
        .set_flags(NA_FLAG_OVERRIDE)
        .push_lladdr_option(ND_OPT_TARGET_LINKADDR, hw_addr);
    advert
}

/// `ff02::1:ffXX:XXXX`, keyed by the low 24 bits of the address (RFC 4291
/// section 2.7.1).
fn solicited_node_multicast(ip: Ipv6Addr) -> Ipv6Addr {
    let octets = ip.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | u16::from(octets[13]),
        (u16::from(octets[14]) << 8) | u16::from(octets[15]),
    )
}
