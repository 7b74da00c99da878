//! The per-interface ARP responder: answers requests for addresses the
//! registry says we own, and emits gratuitous announcements on demand.

use crate::error::Error;
use crate::link::{ArpLink, Decider, DropReason};
use ferrolb_packets::{ArpFrame, ArpOp, MacAddr, ARP_ETHER_TYPE};
use netif::Interface;
use std::ffi::CString;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

// How long a blocked recv waits before re-checking the closed flag. Bounds
// both shutdown latency and the idle wakeup rate.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) struct ArpResponder {
    ifname: String,
    hw_addr: MacAddr,
    sock: Arc<afpacket::BoundSocket>,
    closed: Arc<AtomicBool>,
    rx_thread: Option<thread::JoinHandle<()>>,
}

impl ArpResponder {
    pub(crate) fn new(intf: &Interface, decide: Decider) -> Result<ArpResponder, Error> {
        let name = CString::new(intf.name.as_str())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name has NUL"))?;

        let mut sock = afpacket::Socket::new(ARP_ETHER_TYPE)?;
        sock.set_read_timeout(RECV_TIMEOUT)?;
        let sock = Arc::new(sock.bind(&name)?);

        let hw_addr = MacAddr::new(sock.hardware_addr());
        let closed = Arc::new(AtomicBool::new(false));

        let rx_thread = {
            let sock = sock.clone();
            let closed = closed.clone();
            let ifname = intf.name.clone();
            thread::Builder::new()
                .name(format!("arp-{}", intf.name))
                .spawn(move || recv_loop(sock, hw_addr, decide, closed, ifname))?
        };

        Ok(ArpResponder {
            ifname: intf.name.clone(),
            hw_addr,
            sock,
            closed,
            rx_thread: Some(rx_thread),
        })
    }

    fn close_now(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        if let Some(handle) = self.rx_thread.take() {
            let _ = handle.join();
        }
    }
}

impl ArpLink for ArpResponder {
    fn interface(&self) -> &str {
        &self.ifname
    }

    fn gratuitous(&self, ip: Ipv4Addr) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Closed);
        }
        let frame = gratuitous_frame(self.hw_addr, ip);
        self.sock.send(frame.as_bytes()).map_err(Error::Send)?;
        debug!(interface = %self.ifname, ip = %ip, "sent gratuitous ARP");
        Ok(())
    }

    fn close(&mut self) {
        self.close_now();
    }
}

impl Drop for ArpResponder {
    fn drop(&mut self) {
        self.close_now();
    }
}

fn recv_loop(
    sock: Arc<afpacket::BoundSocket>,
    hw_addr: MacAddr,
    decide: Decider,
    closed: Arc<AtomicBool>,
    ifname: String,
) {
    let mut buf = vec![0u8; 1500];
    while !closed.load(Ordering::Relaxed) {
        let len = match sock.recv(&mut buf) {
            Ok(len) => len,
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
                error!(interface = %ifname, error = %e, "ARP receive failed");
                continue;
            }
        };

        match process(&buf[..len], hw_addr, &decide) {
            Ok(reply) => {
                let ip = reply.sender_protocol_addr();
                if let Err(e) = sock.send(reply.as_bytes()) {
                    error!(interface = %ifname, ip = %ip, error = %e, "failed to send ARP reply");
                } else {
                    debug!(
                        interface = %ifname,
                        ip = %ip,
                        requester = %reply.dest_mac(),
                        "got ARP request, sent reply"
                    );
                }
            }
            Err(reason) => {
                trace!(interface = %ifname, reason = ?reason, "dropped ARP packet");
            }
        }
    }
}

/// Decides what to do with one inbound frame: a reply to send back, or the
/// reason the frame is dropped. Pure over bytes, so tests can drive it
/// without a socket.
fn process(buf: &[u8], hw_addr: MacAddr, decide: &Decider) -> Result<ArpFrame, DropReason> {
    let request = ArpFrame::new(buf.to_vec()).map_err(|_| DropReason::Error)?;
    if request.dest_mac() != hw_addr && !request.dest_mac().is_broadcast() {
        return Err(DropReason::EthernetDestination);
    }

    if request.opcode() == ArpOp::Reply as u16 {
        return Err(DropReason::ArpReply);
    }
    if request.opcode() != ArpOp::Request as u16 {
        return Err(DropReason::MessageType);
    }

    let target = request.target_protocol_addr();
    match decide(target.into()) {
        DropReason::None => {}
        reason => return Err(reason),
    }

    let mut reply = ArpFrame::empty();
    reply
        .set_opcode(ArpOp::Reply as u16)
        .set_sender_hardware_addr(hw_addr)
        .set_sender_protocol_addr(target)
        .set_target_hardware_addr(request.sender_hardware_addr())
        .set_target_protocol_addr(request.sender_protocol_addr())
        .set_src_mac(hw_addr)
        .set_dest_mac(request.sender_hardware_addr());
    Ok(reply)
}

/// A gratuitous ARP is a broadcast *request* asking for our own address,
/// with the sender fields already naming us; every listener updates its
/// cache from the sender fields.
fn gratuitous_frame(hw_addr: MacAddr, ip: Ipv4Addr) -> ArpFrame {
    let mut frame = ArpFrame::empty();
    frame
        .set_opcode(ArpOp::Request as u16)
        .set_sender_hardware_addr(hw_addr)
        .set_sender_protocol_addr(ip)
        .set_target_hardware_addr(MacAddr::ZERO)
        .set_target_protocol_addr(ip)
        .set_src_mac(hw_addr)
        .set_dest_mac(MacAddr::BROADCAST);
    frame
}
