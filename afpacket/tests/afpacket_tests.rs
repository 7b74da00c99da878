#![cfg(target_os = "linux")]

use afpacket;
use ferrolb_packets as packets;
use rand::{self, Rng};
use std::{ffi::CString, net, sync::mpsc, thread, time::Duration};

const ARP_ETHER_TYPE: u16 = 0x0806;

// Requires CAP_NET_RAW, so it only runs when asked for explicitly.
#[test]
#[ignore]
fn arp_loopback() {
    // If this takes more than a second to occur, something's definitely wrong.
    let timeout = Duration::from_secs(1);

    let mut rng = rand::thread_rng();

    let iface_name = CString::new("lo").unwrap();

    let side_a = afpacket::Socket::new(ARP_ETHER_TYPE).unwrap();
    let side_a = side_a.bind(&iface_name).unwrap();

    let side_b = afpacket::Socket::new(ARP_ETHER_TYPE).unwrap();

    let (tx, rx) = mpsc::channel();

    let thread_b = thread::spawn(move || {
        let side_b = side_b.bind(&iface_name).unwrap();

        println!("b: recving frame");
        let mut in_buffer = vec![0; 1500];
        let len = side_b.recv(&mut in_buffer).unwrap();
        in_buffer.resize(len, 0);
        println!("b: recved frame");

        tx.send(in_buffer).unwrap();
    });

    // now send a gratuitous announcement from side a to side b
    let sender_mac = {
        let mut bytes = [0u8; 6];
        rng.fill(&mut bytes[..]);
        bytes[0] &= 0xfe; // keep it unicast
        packets::MacAddr::new(bytes)
    };
    let mut arp = packets::ArpFrame::empty();
    arp.set_opcode(packets::ArpOp::Request as u16)
        .set_sender_hardware_addr(sender_mac)
        .set_sender_protocol_addr(net::Ipv4Addr::new(10, 0, 0, 1))
        .set_target_protocol_addr(net::Ipv4Addr::new(10, 0, 0, 1))
        .set_src_mac(sender_mac)
        .set_dest_mac(packets::MacAddr::BROADCAST);

    println!("a: sending frame");
    side_a.send(arp.as_bytes()).unwrap();
    println!("a: sent frame");

    let in_buffer = rx.recv_timeout(timeout).unwrap();
    assert_eq!(in_buffer, arp.as_bytes());

    thread_b.join().unwrap();
}
