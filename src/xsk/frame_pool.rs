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

//! UMEM backing memory, partitioned into equal-sized frames.

use log::warn;

use std::ptr;

use crate::xsk::{sys, Error::*, Result};

/// The anonymous mapping backing a UMEM, `n_frames * frame_size` bytes long.
///
/// Frame `k` starts at byte offset `k * frame_size`; ring addresses are these
/// offsets, optionally carrying packet-data offset bits in the high 16 bits.
pub struct FramePool {
    base: *mut libc::c_void,
    len: usize,

    n_frames: usize,
    frame_size: usize,
}

unsafe impl Send for FramePool {}
unsafe impl Sync for FramePool {}

impl FramePool {
    /// Maps `n_frames * frame_size` bytes of anonymous memory.
    ///
    /// With `huge_pages` the mapping is first attempted with `MAP_HUGETLB`,
    /// falling back to normal pages when the system has no huge pages
    /// reserved.
    pub fn new(n_frames: usize, frame_size: usize, huge_pages: bool) -> Result<Self> {
        let len = n_frames * frame_size;
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

        let mut base = libc::MAP_FAILED;
        if huge_pages {
            base = unsafe { Self::mmap(len, flags | libc::MAP_HUGETLB) };
            if base == libc::MAP_FAILED {
                warn!("MAP_HUGETLB mmap failed, falling back to normal pages");
            }
        }

        if base == libc::MAP_FAILED {
            base = unsafe { Self::mmap(len, flags) };
        }

        if base == libc::MAP_FAILED {
            return Err(UmemMmapFailed(sys::errno()));
        }

        Ok(FramePool {
            base,
            len,
            n_frames,
            frame_size,
        })
    }

    unsafe fn mmap(len: usize, flags: libc::c_int) -> *mut libc::c_void {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            -1,
            0,
        )
    }

    /// Returns the base address of the mapping.
    pub fn as_ptr(&self) -> *mut libc::c_void {
        self.base
    }

    /// Returns the total mapping length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of frames in the pool.
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Returns the size of one frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Translates a ring address into a pointer to the packet data.
    ///
    /// The pointer is valid only while the caller exclusively holds the frame,
    /// i.e. between an RX peek and the corresponding TX submit.
    #[inline(always)]
    pub fn data_ptr(&self, addr: u64) -> *mut u8 {
        debug_assert!((sys::add_offset_to_addr(addr) as usize) < self.len);
        unsafe { (self.base as *mut u8).add(sys::add_offset_to_addr(addr) as usize) }
    }

    /// Rounds a ring address down to the base address of its frame.
    #[inline(always)]
    pub fn frame_addr(&self, addr: u64) -> u64 {
        sys::extract_addr(addr) & !(self.frame_size as u64 - 1)
    }
}

impl Drop for FramePool {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let pool = FramePool::new(64, 4096, false).unwrap();

        assert!(!pool.as_ptr().is_null());
        assert_eq!(pool.len(), 64 * 4096);
        assert_eq!(pool.n_frames(), 64);
        assert_eq!(pool.frame_size(), 4096);
    }

    #[test]
    fn test_data_ptr_offsets() {
        let pool = FramePool::new(4, 4096, false).unwrap();

        let base = pool.as_ptr() as usize;
        assert_eq!(pool.data_ptr(0) as usize, base);
        assert_eq!(pool.data_ptr(4096) as usize, base + 4096);

        // Offset bits in the high 16 bits are folded into the address.
        let addr = 4096u64 | (128 << sys::XSK_UNALIGNED_BUF_OFFSET_SHIFT);
        assert_eq!(pool.data_ptr(addr) as usize, base + 4096 + 128);
    }

    #[test]
    fn test_frame_addr_alignment() {
        let pool = FramePool::new(4, 4096, false).unwrap();

        assert_eq!(pool.frame_addr(0), 0);
        assert_eq!(pool.frame_addr(4096 + 256), 4096);
        let addr = (2 * 4096 + 64) as u64 | (128 << sys::XSK_UNALIGNED_BUF_OFFSET_SHIFT);
        assert_eq!(pool.frame_addr(addr), 2 * 4096);
    }

    #[test]
    fn test_memory_is_writable() {
        let pool = FramePool::new(2, 4096, false).unwrap();

        unsafe {
            *pool.data_ptr(0) = 0xaa;
            *pool.data_ptr(4096) = 0xbb;
            assert_eq!(*pool.data_ptr(0), 0xaa);
            assert_eq!(*pool.data_ptr(4096), 0xbb);
        }
    }
}
