use crate::{MacAddr, PacketData, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::convert::TryInto;
use std::net::Ipv4Addr;

pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

pub enum ArpHardwareType {
    Ethernet = 1,
}

// The announcer only ever speaks ARP framed directly in Ethernet II, so the
// whole frame is one fixed layout: a 14-byte Ethernet header followed by the
// 28-byte Ethernet/IPv4 ARP body of RFC 826. Offsets are absolute.
const DEST_MAC_RANGE: (usize, usize) = (0, 6);
const SRC_MAC_RANGE: (usize, usize) = (6, 12);
const ETHER_TYPE_RANGE: (usize, usize) = (12, 14);
const HARDWARE_TYPE_RANGE: (usize, usize) = (14, 16);
const PROTOCOL_TYPE_RANGE: (usize, usize) = (16, 18);
const HARDWARE_ADDR_LEN_OFFSET: usize = 18;
const PROTOCOL_ADDR_LEN_OFFSET: usize = 19;
const OPCODE_RANGE: (usize, usize) = (20, 22);
const SENDER_HARDWARE_ADDR_RANGE: (usize, usize) = (22, 28);
const SENDER_PROTOCOL_ADDR_RANGE: (usize, usize) = (28, 32);
const TARGET_HARDWARE_ADDR_RANGE: (usize, usize) = (32, 38);
const TARGET_PROTOCOL_ADDR_RANGE: (usize, usize) = (38, 42);
const FRAME_LEN: usize = 42;

///
/// A complete ARP-over-Ethernet frame (RFC 826,
/// https://tools.ietf.org/html/rfc826), fixed to the Ethernet/IPv4 address
/// pair. Owns the bytes exactly as they go on (or came off) the wire.
///
#[derive(Clone, Debug)]
pub struct ArpFrame {
    data: PacketData,
}

impl ArpFrame {
    ///
    /// Constructs a new frame with the EtherType, hardware/protocol type and
    /// length fields pre-filled and everything else zeroed.
    ///
    pub fn empty() -> Self {
        let mut arp_frame = ArpFrame {
            data: vec![0; FRAME_LEN],
        };
        arp_frame.set_field(&ARP_ETHER_TYPE.to_be_bytes(), ETHER_TYPE_RANGE);
        arp_frame.set_hardware_type(ArpHardwareType::Ethernet as u16);
        arp_frame.set_protocol_type(IPV4_ETHER_TYPE);
        arp_frame.data[HARDWARE_ADDR_LEN_OFFSET] = 6;
        arp_frame.data[PROTOCOL_ADDR_LEN_OFFSET] = 4;
        arp_frame
    }

    ///
    /// Validates a frame as received from the wire:
    /// - long enough for the Ethernet header plus the ARP body (senders pad
    ///   short frames, so trailing bytes are fine)
    /// - has the ARP EtherType
    /// - the hardware/protocol type and length fields describe Ethernet/IPv4
    ///
    pub fn new(data: PacketData) -> Result<ArpFrame, &'static str> {
        if data.len() < FRAME_LEN {
            return Err("Frame is too short for Ethernet/IPv4 ARP");
        }

        let arp_frame = ArpFrame { data };
        if arp_frame.ether_type() != ARP_ETHER_TYPE {
            return Err("Frame does not have ARP ether type");
        }
        if arp_frame.hardware_type() != ArpHardwareType::Ethernet as u16
            || arp_frame.hardware_addr_len() != 6
        {
            return Err("Frame does not carry Ethernet hardware addresses");
        }
        if arp_frame.protocol_type() != IPV4_ETHER_TYPE || arp_frame.protocol_addr_len() != 4 {
            return Err("Frame does not carry IPv4 protocol addresses");
        }

        Ok(arp_frame)
    }

    pub fn dest_mac(&self) -> MacAddr {
        MacAddr::new(self.field(DEST_MAC_RANGE).try_into().unwrap())
    }

    pub fn src_mac(&self) -> MacAddr {
        MacAddr::new(self.field(SRC_MAC_RANGE).try_into().unwrap())
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.field(ETHER_TYPE_RANGE).try_into().unwrap())
    }

    pub fn hardware_type(&self) -> u16 {
        u16::from_be_bytes(self.field(HARDWARE_TYPE_RANGE).try_into().unwrap())
    }

    pub fn protocol_type(&self) -> u16 {
        u16::from_be_bytes(self.field(PROTOCOL_TYPE_RANGE).try_into().unwrap())
    }

    pub fn hardware_addr_len(&self) -> u8 {
        self.data[HARDWARE_ADDR_LEN_OFFSET]
    }

    pub fn protocol_addr_len(&self) -> u8 {
        self.data[PROTOCOL_ADDR_LEN_OFFSET]
    }

    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.field(OPCODE_RANGE).try_into().unwrap())
    }

    pub fn sender_hardware_addr(&self) -> MacAddr {
        MacAddr::new(self.field(SENDER_HARDWARE_ADDR_RANGE).try_into().unwrap())
    }

    pub fn sender_protocol_addr(&self) -> Ipv4Addr {
        let bytes: [u8; 4] = self.field(SENDER_PROTOCOL_ADDR_RANGE).try_into().unwrap();
        Ipv4Addr::from(bytes)
    }

    pub fn target_hardware_addr(&self) -> MacAddr {
        MacAddr::new(self.field(TARGET_HARDWARE_ADDR_RANGE).try_into().unwrap())
    }

    pub fn target_protocol_addr(&self) -> Ipv4Addr {
        let bytes: [u8; 4] = self.field(TARGET_PROTOCOL_ADDR_RANGE).try_into().unwrap();
        Ipv4Addr::from(bytes)
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) -> &mut Self {
        self.set_field(&mac.bytes, DEST_MAC_RANGE)
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) -> &mut Self {
        self.set_field(&mac.bytes, SRC_MAC_RANGE)
    }

    pub fn set_hardware_type(&mut self, htype: u16) -> &mut Self {
        self.set_field(&htype.to_be_bytes(), HARDWARE_TYPE_RANGE)
    }

    pub fn set_protocol_type(&mut self, ptype: u16) -> &mut Self {
        self.set_field(&ptype.to_be_bytes(), PROTOCOL_TYPE_RANGE)
    }

    pub fn set_opcode(&mut self, code: u16) -> &mut Self {
        self.set_field(&code.to_be_bytes(), OPCODE_RANGE)
    }

    pub fn set_sender_hardware_addr(&mut self, addr: MacAddr) -> &mut Self {
        self.set_field(&addr.bytes, SENDER_HARDWARE_ADDR_RANGE)
    }

    pub fn set_sender_protocol_addr(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.set_field(&addr.octets(), SENDER_PROTOCOL_ADDR_RANGE)
    }

    pub fn set_target_hardware_addr(&mut self, addr: MacAddr) -> &mut Self {
        self.set_field(&addr.bytes, TARGET_HARDWARE_ADDR_RANGE)
    }

    pub fn set_target_protocol_addr(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.set_field(&addr.octets(), TARGET_PROTOCOL_ADDR_RANGE)
    }

    /// The frame exactly as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Private Methods

    fn field(&self, range: (usize, usize)) -> &[u8] {
        &self.data[range.0..range.1]
    }

    fn set_field(&mut self, bytes: &[u8], range: (usize, usize)) -> &mut Self {
        self.data[range.0..range.1].copy_from_slice(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A request for 192.168.1.1 from 10.0.0.1, as captured off the wire.
    fn wire_request() -> Vec<u8> {
        let mut data = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // broadcast
            1, 2, 3, 4, 5, 6, // sender
            0x08, 0x06, // ARP
        ];
        data.extend_from_slice(&[
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 1, 2, 3, 4, 5, 6, 10, 0, 0, 1, 0, 0,
            0, 0, 0, 0, 192, 168, 1, 1,
        ]);
        data
    }

    #[test]
    fn generate_empty_arp_frame() {
        let arp_frame = ArpFrame::empty();
        assert_eq!(arp_frame.ether_type(), ARP_ETHER_TYPE);
        assert_eq!(arp_frame.hardware_type(), 1);
        assert_eq!(arp_frame.protocol_type(), 0x0800);
        assert_eq!(arp_frame.hardware_addr_len(), 6);
        assert_eq!(arp_frame.protocol_addr_len(), 4);
        assert_eq!(arp_frame.opcode(), 0);
        assert_eq!(arp_frame.dest_mac(), MacAddr::ZERO);
        assert_eq!(arp_frame.sender_hardware_addr(), MacAddr::ZERO);
        assert_eq!(arp_frame.sender_protocol_addr(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(arp_frame.target_hardware_addr(), MacAddr::ZERO);
        assert_eq!(arp_frame.target_protocol_addr(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(arp_frame.as_bytes().len(), FRAME_LEN);
    }

    #[test]
    fn chain_setters() {
        let mut arp_frame = ArpFrame::empty();
        arp_frame
            .set_opcode(ArpOp::Request as u16)
            .set_sender_hardware_addr(MacAddr::new([1, 2, 3, 4, 5, 6]))
            .set_sender_protocol_addr(Ipv4Addr::new(10, 0, 0, 1))
            .set_target_protocol_addr(Ipv4Addr::new(10, 0, 0, 2))
            .set_src_mac(MacAddr::new([1, 2, 3, 4, 5, 6]))
            .set_dest_mac(MacAddr::BROADCAST);

        assert_eq!(arp_frame.opcode(), 1);
        assert_eq!(
            arp_frame.sender_hardware_addr(),
            MacAddr::new([1, 2, 3, 4, 5, 6])
        );
        assert_eq!(arp_frame.sender_protocol_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(arp_frame.target_protocol_addr(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(arp_frame.src_mac(), MacAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(arp_frame.dest_mac(), MacAddr::BROADCAST);
    }

    #[test]
    fn arp_frame_from_wire_bytes() -> Result<(), &'static str> {
        let arp_frame = ArpFrame::new(wire_request())?;
        assert_eq!(arp_frame.dest_mac(), MacAddr::BROADCAST);
        assert_eq!(arp_frame.src_mac(), MacAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(arp_frame.hardware_type(), 1);
        assert_eq!(arp_frame.protocol_type(), 0x0800);
        assert_eq!(arp_frame.opcode(), ArpOp::Request as u16);
        assert_eq!(
            arp_frame.sender_hardware_addr(),
            MacAddr::new([1, 2, 3, 4, 5, 6])
        );
        assert_eq!(arp_frame.sender_protocol_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(arp_frame.target_hardware_addr(), MacAddr::ZERO);
        assert_eq!(
            arp_frame.target_protocol_addr(),
            Ipv4Addr::new(192, 168, 1, 1)
        );
        Ok(())
    }

    #[test]
    fn accepts_trailing_padding() {
        // Minimum Ethernet frames get padded out to 60 bytes by the sender.
        let mut data = wire_request();
        data.resize(60, 0);

        let arp_frame = ArpFrame::new(data).unwrap();
        assert_eq!(
            arp_frame.target_protocol_addr(),
            Ipv4Addr::new(192, 168, 1, 1)
        );
    }

    #[test]
    #[should_panic(expected = "Frame does not have ARP ether type")]
    fn new_non_arp_ether_type() {
        let mut data = wire_request();
        data[13] = 0x00; // 0x0800, plain IPv4
        ArpFrame::new(data).unwrap();
    }

    #[test]
    #[should_panic(expected = "Frame is too short for Ethernet/IPv4 ARP")]
    fn new_truncated_frame() {
        let mut data = wire_request();
        data.truncate(30);
        ArpFrame::new(data).unwrap();
    }

    #[test]
    #[should_panic(expected = "Frame does not carry Ethernet hardware addresses")]
    fn new_infiniband_arp() {
        let mut data = wire_request();
        data[15] = 32; // ARPHRD_INFINIBAND
        ArpFrame::new(data).unwrap();
    }
}
