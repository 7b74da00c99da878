use std::io;
use std::net::Ipv6Addr;
use thiserror::Error;

/// Errors surfaced by responders. The public façade swallows none of its own:
/// `set_balancer`/`delete_balancer` are fire-and-forget, and responder
/// failures are logged where they happen.
#[derive(Debug, Error)]
pub enum Error {
    /// The responder was closed; its socket is gone.
    #[error("responder is closed")]
    Closed,

    /// The interface has no usable hardware address to announce.
    #[error("interface {0} has no hardware address")]
    NoHardwareAddress(String),

    /// A frame could not be written to the wire.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// Joining a solicited-node multicast group failed. Solicitations for the
    /// affected address will not reach this responder until the next join.
    #[error("failed to join {group} on {interface}: {source}")]
    Join {
        group: Ipv6Addr,
        interface: String,
        source: io::Error,
    },

    /// Leaving a solicited-node multicast group failed.
    #[error("failed to leave {group} on {interface}: {source}")]
    Leave {
        group: Ipv6Addr,
        interface: String,
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
