//! The interface tracker: keeps the set of per-interface responders matched
//! to what the kernel currently has, on a fixed re-scan cadence.

use crate::announce::Shared;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use netif::Interface;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use tracing::{error, info};

// NOARP in the kernel's per-interface flags word.
const IFF_NOARP: u32 = 0x80;

/// Scans immediately, then every `scan_interval` until shutdown.
pub(crate) fn scan_loop(shared: Arc<Shared>, shutdown_rx: Receiver<()>) {
    loop {
        update_interfaces(&shared);
        match shutdown_rx.recv_timeout(shared.cfg.scan_interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

/// One reconciliation pass: enumerate, compute eligibility, create missing
/// responders, tear down responders whose interface is gone or ineligible.
pub(crate) fn update_interfaces(shared: &Arc<Shared>) {
    let interfaces = match shared.links.interfaces() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            error!(error = %e, "couldn't list interfaces");
            return;
        }
    };

    let mut state = shared.state.write().unwrap();
    let mut keep_arp = HashSet::new();
    let mut keep_ndp = HashSet::new();

    for intf in &interfaces {
        let (wants_arp, wants_ndp) = eligibility(shared, intf);
        if wants_arp {
            keep_arp.insert(intf.index);
        }
        if wants_ndp {
            keep_ndp.insert(intf.index);
        }

        if wants_arp && !state.arps.contains_key(&intf.index) {
            match shared.links.open_arp(intf, Shared::decider(shared)) {
                Ok(link) => {
                    info!(interface = %intf.name, "created ARP responder for interface");
                    state.arps.insert(intf.index, link);
                }
                Err(e) => {
                    // Leave this interface bare; the next scan retries.
                    error!(interface = %intf.name, error = %e, "failed to create ARP responder");
                }
            }
        }

        if wants_ndp && !state.ndps.contains_key(&intf.index) {
            match shared.links.open_ndp(intf, Shared::decider(shared)) {
                Ok(link) => {
                    // A fresh responder has no multicast memberships; re-join
                    // the solicited-node group of every referenced address so
                    // an interface flap doesn't go deaf.
                    for ip in state.registry.ips_with_refs() {
                        if let IpAddr::V6(v6) = ip {
                            if let Err(e) = link.watch(v6) {
                                error!(
                                    interface = %intf.name,
                                    ip = %v6,
                                    error = %e,
                                    "failed to watch NDP multicast group for IP"
                                );
                            }
                        }
                    }
                    info!(interface = %intf.name, "created NDP responder for interface");
                    state.ndps.insert(intf.index, link);
                }
                Err(e) => {
                    error!(interface = %intf.name, error = %e, "failed to create NDP responder");
                }
            }
        }
    }

    // Closing a responder joins its receive thread, and that thread may be
    // sitting in its decision callback waiting for the state read lock. Only
    // pull the doomed responders out of the maps here; close them after the
    // write lock is gone.
    let stale: Vec<u32> = state
        .arps
        .keys()
        .filter(|index| !keep_arp.contains(index))
        .copied()
        .collect();
    let mut doomed_arps = Vec::new();
    for index in stale {
        if let Some(link) = state.arps.remove(&index) {
            doomed_arps.push(link);
        }
    }

    let stale: Vec<u32> = state
        .ndps
        .keys()
        .filter(|index| !keep_ndp.contains(index))
        .copied()
        .collect();
    let mut doomed_ndps = Vec::new();
    for index in stale {
        if let Some(link) = state.ndps.remove(&index) {
            doomed_ndps.push(link);
        }
    }
    drop(state);

    for mut link in doomed_arps {
        info!(interface = link.interface(), "deleted ARP responder for interface");
        link.close();
    }
    for mut link in doomed_ndps {
        info!(interface = link.interface(), "deleted NDP responder for interface");
        link.close();
    }
}

/// Whether an interface should carry an (ARP, NDP) responder. ARP needs
/// broadcast capability; NDP needs a link-local source address for the
/// advertisements we send.
fn eligibility(shared: &Arc<Shared>, intf: &Interface) -> (bool, bool) {
    if !intf.is_up() {
        return (false, false);
    }
    if shared.links.is_slave(&intf.name) {
        return (false, false);
    }
    if let Some(flags) = shared.links.kernel_flags(&intf.name) {
        if flags & IFF_NOARP != 0 {
            return (false, false);
        }
    }

    let mut wants_arp = false;
    let mut wants_ndp = false;
    for addr in &intf.addrs {
        match addr {
            IpAddr::V4(_) => {
                if intf.has_broadcast() {
                    wants_arp = true;
                }
            }
            IpAddr::V6(v6) => {
                if is_unicast_link_local(v6) {
                    wants_ndp = true;
                }
            }
        }
    }
    (wants_arp, wants_ndp)
}

fn is_unicast_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}
