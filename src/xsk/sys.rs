// Copyright (C) 2026 The hairpin authors
//
// This file is part of hairpin.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! AF_XDP kernel ABI: the `<linux/if_xdp.h>` structures and constants.

#![allow(non_camel_case_types)]

use std::mem;

/// Socket option level for AF_XDP sockets.
pub const SOL_XDP: libc::c_int = 283;

/* Socket options for SOL_XDP. */
pub const XDP_MMAP_OFFSETS: libc::c_int = 1;
pub const XDP_RX_RING: libc::c_int = 2;
pub const XDP_TX_RING: libc::c_int = 3;
pub const XDP_UMEM_REG: libc::c_int = 4;
pub const XDP_UMEM_FILL_RING: libc::c_int = 5;
pub const XDP_UMEM_COMPLETION_RING: libc::c_int = 6;

/* sockaddr_xdp flags. */
pub const XDP_SHARED_UMEM: u16 = 1 << 0;
pub const XDP_COPY: u16 = 1 << 1;
pub const XDP_ZEROCOPY: u16 = 1 << 2;
pub const XDP_USE_NEED_WAKEUP: u16 = 1 << 3;

/// Flag set by the kernel on a producer ring when it will not make progress
/// without a wakeup syscall.
pub const XDP_RING_NEED_WAKEUP: u32 = 1 << 0;

/* mmap page offsets of the four rings. */
pub const XDP_PGOFF_RX_RING: libc::off_t = 0;
pub const XDP_PGOFF_TX_RING: libc::off_t = 0x80000000;
pub const XDP_UMEM_PGOFF_FILL_RING: libc::off_t = 0x100000000;
pub const XDP_UMEM_PGOFF_COMPLETION_RING: libc::off_t = 0x180000000;

/* Defaults matching libxdp's xsk.h. */
pub const XSK_RING_CONS__DEFAULT_NUM_DESCS: usize = 2048;
pub const XSK_RING_PROD__DEFAULT_NUM_DESCS: usize = 2048;
pub const XSK_UMEM__DEFAULT_FRAME_SIZE: usize = 4096;
pub const XSK_UMEM__DEFAULT_FRAME_HEADROOM: usize = 0;

/// In unaligned-chunk mode the kernel encodes the packet-data offset in the
/// upper 16 bits of a ring address.
pub const XSK_UNALIGNED_BUF_OFFSET_SHIFT: u64 = 48;
pub const XSK_UNALIGNED_BUF_ADDR_MASK: u64 = (1 << XSK_UNALIGNED_BUF_OFFSET_SHIFT) - 1;

/// An RX/TX ring descriptor.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct xdp_desc {
    pub addr: u64,
    pub len: u32,
    pub options: u32,
}

/// Argument to `setsockopt(fd, SOL_XDP, XDP_UMEM_REG)`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct xdp_umem_reg {
    pub addr: u64,
    pub len: u64,
    pub chunk_size: u32,
    pub headroom: u32,
    pub flags: u32,
    pub tx_metadata_len: u32,
}

/// Offsets of the producer, consumer, descriptor and flags words of one ring,
/// relative to its mmap base.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct xdp_ring_offset {
    pub producer: u64,
    pub consumer: u64,
    pub desc: u64,
    pub flags: u64,
}

/// Result of `getsockopt(fd, SOL_XDP, XDP_MMAP_OFFSETS)`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct xdp_mmap_offsets {
    pub rx: xdp_ring_offset,
    pub tx: xdp_ring_offset,
    pub fr: xdp_ring_offset,
    pub cr: xdp_ring_offset,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct sockaddr_xdp {
    pub sxdp_family: u16,
    pub sxdp_flags: u16,
    pub sxdp_ifindex: u32,
    pub sxdp_queue_id: u32,
    pub sxdp_shared_umem_fd: u32,
}

impl Default for sockaddr_xdp {
    fn default() -> Self {
        sockaddr_xdp {
            sxdp_family: libc::AF_XDP as u16,
            sxdp_flags: 0,
            sxdp_ifindex: 0,
            sxdp_queue_id: 0,
            sxdp_shared_umem_fd: 0,
        }
    }
}

/// Folds the offset bits of a ring address into the base, yielding the byte
/// offset of the packet data from the start of the UMEM area.
#[inline(always)]
pub fn add_offset_to_addr(addr: u64) -> u64 {
    (addr & XSK_UNALIGNED_BUF_ADDR_MASK) + (addr >> XSK_UNALIGNED_BUF_OFFSET_SHIFT)
}

/// Strips the offset bits, yielding the chunk-relative base address.
#[inline(always)]
pub fn extract_addr(addr: u64) -> u64 {
    addr & XSK_UNALIGNED_BUF_ADDR_MASK
}

/// Queries the ring mmap offsets of an AF_XDP socket.
///
/// Returns the raw errno on failure; callers wrap it into [`crate::xsk::Error`].
pub fn mmap_offsets(fd: libc::c_int) -> std::result::Result<xdp_mmap_offsets, i32> {
    let mut off: xdp_mmap_offsets = Default::default();
    let mut optlen = mem::size_of::<xdp_mmap_offsets>() as libc::socklen_t;

    let ret = unsafe {
        libc::getsockopt(
            fd,
            SOL_XDP,
            XDP_MMAP_OFFSETS,
            &mut off as *mut _ as *mut libc::c_void,
            &mut optlen,
        )
    };

    if ret != 0 {
        return Err(errno());
    }

    Ok(off)
}

/// Returns the calling thread's errno.
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_sizes() {
        assert_eq!(mem::size_of::<xdp_desc>(), 16);
        assert_eq!(mem::size_of::<xdp_umem_reg>(), 32);
        assert_eq!(mem::size_of::<xdp_ring_offset>(), 32);
        assert_eq!(mem::size_of::<xdp_mmap_offsets>(), 128);
        assert_eq!(mem::size_of::<sockaddr_xdp>(), 16);
    }

    #[test]
    fn test_addr_offset_helpers() {
        let base = 0x4000u64;
        let addr = base | (256u64 << XSK_UNALIGNED_BUF_OFFSET_SHIFT);

        assert_eq!(extract_addr(addr), base);
        assert_eq!(add_offset_to_addr(addr), base + 256);
        assert_eq!(add_offset_to_addr(base), base);
    }
}
