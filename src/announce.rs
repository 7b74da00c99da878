use crate::config::Config;
use crate::link::{ArpLink, Decider, DropReason, LinkSource, NdpLink};
use crate::registry::Registry;
use crate::{spam, tracker};
use crossbeam::channel;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use tracing::{debug, error};

/// Everything the background threads share: the registry and the responder
/// maps live under one readers-writer lock, per-thread state (the scheduler's
/// deadline map) does not live here at all.
pub(crate) struct Shared {
    pub(crate) cfg: Config,
    pub(crate) links: Box<dyn LinkSource>,
    pub(crate) state: RwLock<State>,
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    pub(crate) arps: HashMap<u32, Box<dyn ArpLink>>,
    pub(crate) ndps: HashMap<u32, Box<dyn NdpLink>>,
}

impl Shared {
    /// The callback handed to every responder. It holds a weak reference so
    /// a responder that outlives shutdown answers nothing instead of keeping
    /// the whole announcer alive.
    pub(crate) fn decider(shared: &Arc<Shared>) -> Decider {
        let shared: Weak<Shared> = Arc::downgrade(shared);
        Arc::new(move |ip| match shared.upgrade() {
            Some(shared) => {
                let state = shared.state.read().unwrap();
                state.registry.announceable(ip)
            }
            None => DropReason::Closed,
        })
    }

    /// Emits one gratuitous announcement for `ip` on every responder of the
    /// matching address family. Which interface an IP "belongs" to is not our
    /// business; redundant announcements are harmless.
    pub(crate) fn gratuitous(&self, ip: IpAddr) {
        let state = self.state.read().unwrap();

        if state.registry.refs(ip) == 0 {
            // We've lost control of the IP, someone else is doing
            // announcements.
            return;
        }

        match ip {
            IpAddr::V4(v4) => {
                for link in state.arps.values() {
                    if let Err(e) = link.gratuitous(v4) {
                        error!(
                            interface = link.interface(),
                            ip = %v4,
                            error = %e,
                            "failed to make gratuitous ARP announcement"
                        );
                    }
                }
            }
            IpAddr::V6(v6) => {
                for link in state.ndps.values() {
                    if let Err(e) = link.gratuitous(v6) {
                        error!(
                            interface = link.interface(),
                            ip = %v6,
                            error = %e,
                            "failed to make gratuitous NDP announcement"
                        );
                    }
                }
            }
        }
    }
}

/// The announcer: the only surface the control plane calls.
pub struct Announce {
    shared: Arc<Shared>,
    spam_tx: channel::Sender<IpAddr>,
    shutdown_tx: channel::Sender<()>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl Announce {
    /// Starts the announcer over the given responder source: spawns the
    /// interface scanner and the re-announce scheduler.
    pub fn new(links: Box<dyn LinkSource>, cfg: Config) -> io::Result<Announce> {
        let (spam_tx, spam_rx) = channel::bounded(cfg.spam_queue_depth);
        let (shutdown_tx, shutdown_rx) = channel::bounded(0);

        let shared = Arc::new(Shared {
            cfg,
            links,
            state: RwLock::new(State::default()),
        });

        let scan = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("layer2-scan".to_string())
                .spawn(move || tracker::scan_loop(shared, shutdown_rx))?
        };
        let spam = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("layer2-spam".to_string())
                .spawn(move || spam::spam_loop(shared, spam_rx))?
        };

        Ok(Announce {
            shared,
            spam_tx,
            shutdown_tx,
            threads: vec![scan, spam],
        })
    }

    /// Claims `ip` under `name` and kicks off a re-announce burst. Repeat
    /// claims stack: the reference count grows each time, so every
    /// `set_balancer` needs a matching `delete_balancer` on the same name.
    /// Re-claiming deliberately restarts the burst, which is what we want
    /// after cluster churn.
    pub fn set_balancer(&self, name: &str, ip: IpAddr) {
        {
            let mut state = self.shared.state.write().unwrap();
            let first_ref = state.registry.add(name, ip);
            debug!(name, ip = %ip, first_ref, "balancer set");

            if first_ref {
                if let IpAddr::V6(v6) = ip {
                    for link in state.ndps.values() {
                        if let Err(e) = link.watch(v6) {
                            error!(
                                interface = link.interface(),
                                ip = %v6,
                                error = %e,
                                "failed to watch NDP multicast group for IP, \
                                 NDP responder will not respond to requests for this address"
                            );
                        }
                    }
                }
            }
        }

        // The scheduler takes the state read lock inside gratuitous, and this
        // channel can fill up and block. Enqueueing under the write lock
        // above would be a cyclic wait.
        let _ = self.spam_tx.send(ip);
    }

    /// Withdraws every IP claimed under `name`. Addresses whose last
    /// reference this was stop being watched; the scheduler is not told and
    /// keeps ticking until its deadline passes, but emission is gated on the
    /// reference count, so nothing leaks onto the wire.
    pub fn delete_balancer(&self, name: &str) {
        let mut state = self.shared.state.write().unwrap();
        let freed = state.registry.remove_all(name);
        debug!(name, freed = freed.len(), "balancer deleted");

        for ip in freed {
            if let IpAddr::V6(v6) = ip {
                for link in state.ndps.values() {
                    if let Err(e) = link.unwatch(v6) {
                        error!(
                            interface = link.interface(),
                            ip = %v6,
                            error = %e,
                            "failed to unwatch NDP multicast group for IP"
                        );
                    }
                }
            }
        }
    }

    /// True when some IPs are currently claimed under `name`.
    pub fn announce_name(&self, name: &str) -> bool {
        let state = self.shared.state.read().unwrap();
        state.registry.has_name(name)
    }

    /// Stops the scanner and scheduler, closes every responder, and waits for
    /// all of it to wind down.
    pub fn shutdown(self) {
        let Announce {
            shared,
            spam_tx,
            shutdown_tx,
            threads,
        } = self;

        // Disconnecting the channels is the stop signal for both loops.
        drop(spam_tx);
        drop(shutdown_tx);
        for thread in threads {
            let _ = thread.join();
        }

        // Responder receive threads take the state read lock from their
        // decision callbacks, and close() joins them; closing under the write
        // lock would deadlock against any responder that is mid-packet. Empty
        // the maps first, then close with no lock held.
        let (arps, ndps) = {
            let mut state = shared.state.write().unwrap();
            let arps: Vec<_> = state.arps.drain().map(|(_, link)| link).collect();
            let ndps: Vec<_> = state.ndps.drain().map(|(_, link)| link).collect();
            (arps, ndps)
        };
        for mut link in arps {
            link.close();
        }
        for mut link in ndps {
            link.close();
        }
    }
}
