//! Raw `AF_PACKET` sockets, bound to a single interface and EtherType.
#![deny(missing_docs)]

mod linux;
mod sockets;

pub use sockets::{BoundSocket, Socket};
