//! The re-announce scheduler: after every claim change an address gets a
//! bounded burst of gratuitous announcements, so neighbor caches pick up the
//! new owner without us ever flooding the segment.

use crate::announce::Shared;
use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Runs until the input channel disconnects. The deadline map is owned here,
/// on the scheduler thread; nobody else reads or writes it.
pub(crate) fn spam_loop(shared: Arc<Shared>, spam_rx: Receiver<IpAddr>) {
    let mut deadlines: HashMap<IpAddr, Instant> = HashMap::new();
    // The ticker only runs while something is left to re-announce; an idle
    // announcer wakes no one.
    let mut ticker = channel::never();

    loop {
        select! {
            recv(spam_rx) -> msg => {
                let ip = match msg {
                    Ok(ip) => ip,
                    Err(_) => break,
                };
                if deadlines.is_empty() {
                    ticker = channel::tick(shared.cfg.spam_period);
                }
                let fresh = !deadlines.contains_key(&ip);
                deadlines.insert(ip, Instant::now() + shared.cfg.spam_window);
                if fresh {
                    // Announce right away rather than waiting out the first
                    // tick, even if that means two announcements close
                    // together when the control plane re-claims quickly.
                    shared.gratuitous(ip);
                }
            }
            recv(ticker) -> tick => {
                let now = match tick {
                    Ok(now) => now,
                    Err(_) => continue,
                };
                deadlines.retain(|ip, stop| {
                    if now > *stop {
                        trace!(ip = %ip, "re-announce window over");
                        return false;
                    }
                    shared.gratuitous(*ip);
                    true
                });
                if deadlines.is_empty() {
                    ticker = channel::never();
                }
            }
        }
    }
}
