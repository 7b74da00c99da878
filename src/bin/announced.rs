//! Minimal foreground announcer: claims the addresses given on the command
//! line until killed. Handy for watching neighbor cache convergence with
//! tcpdump while poking at switch behavior.

use ferrolb_layer2::link::SysLinks;
use ferrolb_layer2::{Announce, Config};
use std::net::IpAddr;

fn main() {
    tracing_subscriber::fmt::init();

    let ips: Vec<IpAddr> = std::env::args()
        .skip(1)
        .map(|arg| arg.parse().expect("not an IP address"))
        .collect();
    if ips.is_empty() {
        eprintln!("usage: announced <ip> [<ip> ...]");
        std::process::exit(2);
    }

    let announce =
        Announce::new(Box::new(SysLinks), Config::default()).expect("failed to start announcer");
    for (i, ip) in ips.iter().enumerate() {
        announce.set_balancer(&format!("cli-{}", i), *ip);
    }

    loop {
        std::thread::park();
    }
}
