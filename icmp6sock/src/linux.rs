#![allow(non_camel_case_types)]

use libc;

// netinet/icmp6.h; not exported by the libc crate.
pub(crate) const ICMP6_FILTER: libc::c_int = 1;

#[repr(C)]
pub(crate) struct icmp6_filter {
    pub(crate) icmp6_filt: [u32; 8],
}

impl icmp6_filter {
    /// A filter that blocks every ICMPv6 type. On Linux a set bit means
    /// "block" (the inverse of the BSD convention), per glibc's
    /// ICMP6_FILTER_SETBLOCKALL.
    pub(crate) fn block_all() -> icmp6_filter {
        icmp6_filter {
            icmp6_filt: [!0u32; 8],
        }
    }

    /// Clears the block bit for one ICMPv6 type, admitting it.
    pub(crate) fn pass(&mut self, msg_type: u8) {
        self.icmp6_filt[usize::from(msg_type >> 5)] &= !(1 << u32::from(msg_type & 31));
    }
}
