//! Layer-2 address announcer: claims a set of virtual IPs on the local
//! Ethernet segment by answering ARP (IPv4) and neighbor discovery (IPv6)
//! queries for them, and by bursting gratuitous announcements after every
//! change so neighbor caches converge quickly after a failover.
//!
//! The control plane drives the [`Announce`] façade (`set_balancer` /
//! `delete_balancer`); everything else runs on background threads: one
//! interface scanner that keeps per-interface responders in sync with kernel
//! state, one re-announce scheduler, and one receive thread per responder.

mod announce;
mod arp;
mod config;
mod error;
mod ndp;
mod registry;
mod spam;
mod tracker;

pub mod link;

pub use announce::Announce;
pub use config::Config;
pub use error::Error;
pub use link::DropReason;
