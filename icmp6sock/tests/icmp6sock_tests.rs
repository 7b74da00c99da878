#![cfg(target_os = "linux")]

use icmp6sock::Socket;
use std::ffi::CString;
use std::net::Ipv6Addr;

// Requires CAP_NET_RAW, so it only runs when asked for explicitly.
#[test]
#[ignore]
fn configure_and_join_on_loopback() {
    let mut sock = Socket::new().unwrap();
    sock.set_filter(&[135, 136]).unwrap();
    sock.set_hop_limits(255).unwrap();
    sock.bind_device(&CString::new("lo").unwrap()).unwrap();

    let group: Ipv6Addr = "ff02::1:ff00:1".parse().unwrap();
    let lo_index = 1; // loopback is always index 1 on Linux

    sock.join_group(group, lo_index).unwrap();
    sock.leave_group(group, lo_index).unwrap();
}
