#![deny(missing_docs)]

use crate::linux;
use libc;
use std::{
    ffi::CStr,
    io,
    mem::{self, MaybeUninit},
    ptr,
    time::Duration,
};

/// Represents an unbound `AF_PACKET` socket. At this phase of a socket's
/// lifecycle, it can be configured.
pub struct Socket {
    fd: libc::c_int,
    protocol: u16,
}

/// Represents an `AF_PACKET` socket bound to one interface. At this phase of a
/// socket's lifecycle, it can be read from/written to. `send` and `recv` take
/// `&self` on purpose: sendto/recvfrom are independent syscalls on the same
/// descriptor, so a receive loop can share the socket with a thread emitting
/// announcements.
pub struct BoundSocket {
    fd: libc::c_int,
    send_addr: libc::sockaddr_ll,
    hardware_addr: [u8; 6],
}

impl Socket {
    /// Creates a new unbound socket that sends and receives frames of the
    /// given EtherType (host byte order, e.g. 0x0806 for ARP).
    pub fn new(protocol: u16) -> io::Result<Self> {
        // This block must be marked as unsafe because it uses FFI with C code. We believe the code
        // in this block to be safe because it does not interact with any memory owned by Rust
        // code, nor does it violate the invariant of the Socket type -- namely, that it return an
        // Err if it fails to initialize.
        let fd = unsafe {
            // Resources:
            // man 7 packet -- the protocol argument is in network byte order
            let fd = libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                libc::c_int::from(protocol.to_be()),
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            fd
        };
        Ok(Self { fd, protocol })
    }

    /// Arranges for `recv` on the bound socket to give up with `WouldBlock`
    /// after the given duration, so a receive loop can notice shutdown.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // This block is marked as unsafe because it uses FFI, however, we
        // believe it to be safe because it borrows a stack-owned timeval for
        // the duration of the call only.
        // Resources:
        // man 7 socket regarding SO_RCVTIMEO
        unsafe {
            let err = libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const _ as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            );
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Binds the socket to a network interface and looks up the interface's
    /// hardware address. This function consumes the `Socket` instance, as no
    /// more configuration options may be safely changed.
    pub fn bind(self, iface: impl AsRef<CStr>) -> io::Result<BoundSocket> {
        // This block is marked as unsafe because it uses FFI, however, we believe it to be safe
        // because 1) it handles FFI failures in accordance with the bound API's conventions, and
        // 2) it safely borrows the &CStr passed in.
        let (send_addr, hardware_addr) = unsafe {
            // get the index of the interface
            let mut ifr: linux::ifreq = MaybeUninit::zeroed().assume_init();
            ptr::copy_nonoverlapping(
                iface.as_ref().as_ptr(),
                ifr.ifr_ifrn.ifrn_name.as_mut_ptr(),
                iface.as_ref().to_bytes_with_nul().len().min(libc::IFNAMSIZ),
            );
            // ioctl(SIOCGIFINDEX) fills in the index field of the ifreq object
            // Resources:
            // man 7 netdevice
            let err = libc::ioctl(self.fd, linux::SIOCGIFINDEX, &mut ifr);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            let index = ifr.ifr_ifru.ifru_ivalue;

            // ioctl(SIOCGIFHWADDR) fills in the hardware address, which we
            // need as the sender field of every frame we originate
            let err = libc::ioctl(self.fd, linux::SIOCGIFHWADDR, &mut ifr);
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            let mut hardware_addr = [0u8; 6];
            for (dst, src) in hardware_addr
                .iter_mut()
                .zip(ifr.ifr_ifru.ifru_hwaddr.sa_data.iter())
            {
                *dst = *src as u8;
            }

            // bind the socket
            let mut ll: libc::sockaddr_ll = MaybeUninit::zeroed().assume_init();
            ll.sll_family = libc::AF_PACKET as libc::c_ushort;
            ll.sll_protocol = self.protocol.to_be();
            ll.sll_ifindex = index;
            // Resources:
            // man 7 packet regarding sockaddr_ll
            let err = libc::bind(
                self.fd,
                &mut ll as *mut _ as *mut libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::c_uint,
            );
            if err < 0 {
                return Err(io::Error::last_os_error());
            }
            (ll, hardware_addr)
        };
        let fd = self.fd;
        // This ensures that `self` does not attempt to close the file descriptor, as the file
        // descriptor is transferred to the BoundSocket we're returning. This doesn't cause any
        // resource leaks since the stack-bound `self` is consumed and deallocated in
        // `mem::forget`.
        mem::forget(self);
        Ok(BoundSocket {
            fd,
            send_addr,
            hardware_addr,
        })
    }
}

impl BoundSocket {
    /// The hardware address of the interface this socket is bound to.
    pub fn hardware_addr(&self) -> [u8; 6] {
        self.hardware_addr
    }

    /// The kernel index of the interface this socket is bound to.
    pub fn if_index(&self) -> i32 {
        self.send_addr.sll_ifindex
    }

    /// Sends a frame to the NIC. The frame carries its own Ethernet header;
    /// the kernel only consults our sockaddr for the output interface.
    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        // This block is marked as unsafe because it uses FFI. We believe this code to be safe,
        // because it safely borrows the Rust-owned frame and passes the length of the frame to the
        // libc function, so it should not exhibit any C-side undefined behaviour.
        unsafe {
            let bytes = libc::sendto(
                self.fd,
                frame.as_ptr() as *const _,
                frame.len(),
                0,
                &self.send_addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }

    /// Receives a frame from the NIC. Blocks until a frame arrives or the
    /// configured read timeout elapses (`WouldBlock`).
    pub fn recv(&self, frame: &mut [u8]) -> io::Result<usize> {
        // Note comment in `send` call.
        unsafe {
            let bytes = libc::recvfrom(
                self.fd,
                frame.as_mut_ptr() as *mut _,
                frame.len(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if bytes < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(bytes as usize)
            }
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
