//! This crate enumerates the host's network interfaces, with the attributes
//! the announcer's interface tracker selects on: kernel index, flags,
//! hardware address, and assigned addresses.

use ferrolb_packets::MacAddr;
use std::{
    ffi::CStr,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    ptr,
};

pub const IFF_UP: u32 = libc::IFF_UP as u32;
pub const IFF_BROADCAST: u32 = libc::IFF_BROADCAST as u32;

/// One kernel network interface, as seen in a single enumeration pass.
#[derive(Clone, Debug)]
pub struct Interface {
    pub index: u32,
    pub name: String,
    /// Interface flags as reported by getifaddrs (IFF_*).
    pub flags: u32,
    /// Link-layer address, if the interface has an Ethernet-sized one.
    pub hardware_addr: Option<MacAddr>,
    /// Assigned addresses, in enumeration order.
    pub addrs: Vec<IpAddr>,
}

impl Interface {
    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }

    pub fn has_broadcast(&self) -> bool {
        self.flags & IFF_BROADCAST != 0
    }
}

/// Enumerates the host's interfaces via getifaddrs. Entries for the same
/// interface (one per assigned address, plus one link-layer entry) are merged
/// into a single `Interface`.
pub fn interfaces() -> io::Result<Vec<Interface>> {
    let mut out: Vec<Interface> = Vec::new();

    // This block is marked as unsafe because it uses FFI. We believe it to be
    // safe because the list getifaddrs hands us is only dereferenced between
    // the successful call and the matching freeifaddrs, and every sockaddr is
    // length-checked against its family before being read.
    // Resources:
    // man 3 getifaddrs, man 7 packet regarding sockaddr_ll
    unsafe {
        let mut ifap: *mut libc::ifaddrs = ptr::null_mut();
        if libc::getifaddrs(&mut ifap) != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut cursor = ifap;
        while !cursor.is_null() {
            let ifa = &*cursor;
            cursor = ifa.ifa_next;

            if ifa.ifa_name.is_null() {
                continue;
            }
            let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();

            let slot = match out.iter().position(|intf| intf.name == name) {
                Some(i) => i,
                None => {
                    out.push(Interface {
                        index: libc::if_nametoindex(ifa.ifa_name),
                        name,
                        flags: ifa.ifa_flags,
                        hardware_addr: None,
                        addrs: Vec::new(),
                    });
                    out.len() - 1
                }
            };
            let entry = &mut out[slot];

            if ifa.ifa_addr.is_null() {
                continue;
            }
            match libc::c_int::from((*ifa.ifa_addr).sa_family) {
                libc::AF_PACKET => {
                    let sll = &*(ifa.ifa_addr as *const libc::sockaddr_ll);
                    if sll.sll_halen as usize == 6 {
                        let mut bytes = [0u8; 6];
                        bytes.copy_from_slice(&sll.sll_addr[..6]);
                        entry.hardware_addr = Some(MacAddr::new(bytes));
                    }
                    if sll.sll_ifindex > 0 {
                        entry.index = sll.sll_ifindex as u32;
                    }
                }
                libc::AF_INET => {
                    let sin = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                    let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                    entry.addrs.push(IpAddr::V4(addr));
                }
                libc::AF_INET6 => {
                    let sin6 = &*(ifa.ifa_addr as *const libc::sockaddr_in6);
                    let addr = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                    entry.addrs.push(IpAddr::V6(addr));
                }
                _ => {}
            }
        }

        libc::freeifaddrs(ifap);
    }

    Ok(out)
}
