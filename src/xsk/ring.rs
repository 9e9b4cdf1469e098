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

//! XSK producer and consumer rings.
//!
//! Each ring is a single-producer/single-consumer circular buffer shared with
//! the kernel. The user side keeps cached copies of both indices so the hot
//! path touches the shared cache lines only when it runs out of slots.

use std::{
    mem, ptr,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::xsk::{sys, Error, Result};

/// One mmapped ring: the shared producer/consumer/flags words plus the
/// descriptor array, as laid out by the kernel.
struct RingMap {
    producer: *const AtomicU32,
    consumer: *const AtomicU32,
    flags: *const AtomicU32,
    desc: *mut u8,
    mask: u32,
    size: u32,

    map: *mut libc::c_void,
    map_len: usize,
}

unsafe impl Send for RingMap {}

impl RingMap {
    /// Maps one ring of socket `fd` at page offset `pgoff`.
    fn new(
        name: &'static str,
        fd: libc::c_int,
        off: &sys::xdp_ring_offset,
        count: usize,
        entry_size: usize,
        pgoff: libc::off_t,
    ) -> Result<Self> {
        debug_assert!(count.is_power_of_two());

        let map_len = off.desc as usize + count * entry_size;

        let map = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_POPULATE,
                fd,
                pgoff,
            )
        };

        if map == libc::MAP_FAILED {
            return Err(Error::XskRingMmapFailed(name, sys::errno()));
        }

        let base = map as *mut u8;
        Ok(unsafe {
            RingMap {
                producer: base.add(off.producer as usize) as *const AtomicU32,
                consumer: base.add(off.consumer as usize) as *const AtomicU32,
                flags: base.add(off.flags as usize) as *const AtomicU32,
                desc: base.add(off.desc as usize),
                mask: count as u32 - 1,
                size: count as u32,
                map,
                map_len,
            }
        })
    }

    #[inline(always)]
    fn producer(&self) -> &AtomicU32 {
        unsafe { &*self.producer }
    }

    #[inline(always)]
    fn consumer(&self) -> &AtomicU32 {
        unsafe { &*self.consumer }
    }

    #[inline(always)]
    fn flags(&self) -> &AtomicU32 {
        unsafe { &*self.flags }
    }

    #[inline(always)]
    fn slot(&self, idx: u32, entry_size: usize) -> *mut u8 {
        unsafe { self.desc.add((idx & self.mask) as usize * entry_size) }
    }
}

impl Drop for RingMap {
    fn drop(&mut self) {
        if !self.map.is_null() {
            unsafe {
                libc::munmap(self.map, self.map_len);
            }
        }
    }
}

/// The user-producer side of a ring (Fill or TX).
pub struct ProdRing {
    map: RingMap,
    cached_prod: u32,
    cached_cons: u32,
}

impl ProdRing {
    /// Maps the Fill ring of `fd`.
    pub fn new_fill(fd: libc::c_int, off: &sys::xdp_mmap_offsets, count: usize) -> Result<Self> {
        let map = RingMap::new(
            "fill",
            fd,
            &off.fr,
            count,
            mem::size_of::<u64>(),
            sys::XDP_UMEM_PGOFF_FILL_RING,
        )?;
        Ok(Self::from_map(map))
    }

    /// Maps the TX ring of `fd`.
    pub fn new_tx(fd: libc::c_int, off: &sys::xdp_mmap_offsets, count: usize) -> Result<Self> {
        let map = RingMap::new(
            "tx",
            fd,
            &off.tx,
            count,
            mem::size_of::<sys::xdp_desc>(),
            sys::XDP_PGOFF_TX_RING,
        )?;
        Ok(Self::from_map(map))
    }

    fn from_map(map: RingMap) -> Self {
        let cached_prod = map.producer().load(Ordering::Relaxed);
        let cached_cons = map.consumer().load(Ordering::Relaxed).wrapping_add(map.size);

        ProdRing {
            map,
            cached_prod,
            cached_cons,
        }
    }

    /// Returns how many slots are free for production, refreshing the cached
    /// consumer index only when the cached view cannot satisfy `nb`.
    pub fn free(&mut self, nb: usize) -> usize {
        let free = self.cached_cons.wrapping_sub(self.cached_prod);
        if free as usize >= nb {
            return free as usize;
        }

        // The kernel consumer lags its shared index by at most `size` slots,
        // so keeping cached_cons one full ring ahead is always safe.
        self.cached_cons = self
            .map
            .consumer()
            .load(Ordering::Acquire)
            .wrapping_add(self.map.size);

        self.cached_cons.wrapping_sub(self.cached_prod) as usize
    }

    /// Reserves `nb` slots and sets `idx` to the first reserved index.
    /// Returns `nb`, or 0 if the ring cannot hold `nb` more entries.
    pub fn reserve(&mut self, nb: usize, idx: &mut u32) -> usize {
        if self.free(nb) < nb {
            return 0;
        }

        *idx = self.cached_prod;
        self.cached_prod = self.cached_prod.wrapping_add(nb as u32);

        nb
    }

    /// Writes a frame address into slot `idx` (Fill ring entries).
    pub fn set_addr(&mut self, idx: u32, addr: u64) {
        let slot = self.map.slot(idx, mem::size_of::<u64>()) as *mut u64;
        unsafe {
            *slot = addr;
        }
    }

    /// Writes a descriptor into slot `idx` (TX ring entries).
    pub fn set_desc(&mut self, idx: u32, desc: sys::xdp_desc) {
        let slot = self.map.slot(idx, mem::size_of::<sys::xdp_desc>()) as *mut sys::xdp_desc;
        unsafe {
            *slot = desc;
        }
    }

    /// Publishes `nb` previously reserved slots to the kernel.
    pub fn submit(&mut self, nb: usize) {
        let producer = self.map.producer();
        let cur = producer.load(Ordering::Relaxed);
        producer.store(cur.wrapping_add(nb as u32), Ordering::Release);
    }

    /// Returns whether the kernel requested a wakeup syscall for this ring.
    pub fn needs_wakeup(&self) -> bool {
        self.map.flags().load(Ordering::Relaxed) & sys::XDP_RING_NEED_WAKEUP != 0
    }
}

/// The user-consumer side of a ring (RX or Completion).
pub struct ConsRing {
    map: RingMap,
    cached_prod: u32,
    cached_cons: u32,
}

impl ConsRing {
    /// Maps the RX ring of `fd`.
    pub fn new_rx(fd: libc::c_int, off: &sys::xdp_mmap_offsets, count: usize) -> Result<Self> {
        let map = RingMap::new(
            "rx",
            fd,
            &off.rx,
            count,
            mem::size_of::<sys::xdp_desc>(),
            sys::XDP_PGOFF_RX_RING,
        )?;
        Ok(Self::from_map(map))
    }

    /// Maps the Completion ring of `fd`.
    pub fn new_comp(fd: libc::c_int, off: &sys::xdp_mmap_offsets, count: usize) -> Result<Self> {
        let map = RingMap::new(
            "completion",
            fd,
            &off.cr,
            count,
            mem::size_of::<u64>(),
            sys::XDP_UMEM_PGOFF_COMPLETION_RING,
        )?;
        Ok(Self::from_map(map))
    }

    fn from_map(map: RingMap) -> Self {
        let cached_prod = map.producer().load(Ordering::Relaxed);
        let cached_cons = map.consumer().load(Ordering::Relaxed);

        ConsRing {
            map,
            cached_prod,
            cached_cons,
        }
    }

    /// Peeks up to `nb` entries and sets `idx` to the first available index.
    /// Returns the number of entries peeked, possibly 0.
    pub fn peek(&mut self, nb: usize, idx: &mut u32) -> usize {
        let mut avail = self.cached_prod.wrapping_sub(self.cached_cons);

        if avail == 0 {
            self.cached_prod = self.map.producer().load(Ordering::Acquire);
            avail = self.cached_prod.wrapping_sub(self.cached_cons);
        }

        let avail = (avail as usize).min(nb);
        if avail > 0 {
            *idx = self.cached_cons;
            self.cached_cons = self.cached_cons.wrapping_add(avail as u32);
        }

        avail
    }

    /// Reads the frame address in slot `idx` (Completion ring entries).
    pub fn get_addr(&self, idx: u32) -> u64 {
        let slot = self.map.slot(idx, mem::size_of::<u64>()) as *const u64;
        unsafe { *slot }
    }

    /// Reads the descriptor in slot `idx` (RX ring entries).
    pub fn get_desc(&self, idx: u32) -> sys::xdp_desc {
        let slot = self.map.slot(idx, mem::size_of::<sys::xdp_desc>()) as *const sys::xdp_desc;
        unsafe { *slot }
    }

    /// Hands `nb` consumed slots back to the kernel.
    pub fn release(&mut self, nb: usize) {
        let consumer = self.map.consumer();
        let cur = consumer.load(Ordering::Relaxed);
        consumer.store(cur.wrapping_add(nb as u32), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Heap-backed stand-in for a kernel ring mapping, so the index and
    /// publication arithmetic is testable without an AF_XDP socket.
    struct TestRing {
        producer: Box<AtomicU32>,
        consumer: Box<AtomicU32>,
        flags: Box<AtomicU32>,
        desc: Vec<u64>,
    }

    impl TestRing {
        fn new(count: usize) -> Self {
            TestRing {
                producer: Box::new(AtomicU32::new(0)),
                consumer: Box::new(AtomicU32::new(0)),
                flags: Box::new(AtomicU32::new(0)),
                desc: vec![0u64; count],
            }
        }

        fn map(&mut self) -> RingMap {
            RingMap {
                producer: &*self.producer,
                consumer: &*self.consumer,
                flags: &*self.flags,
                desc: self.desc.as_mut_ptr() as *mut u8,
                mask: self.desc.len() as u32 - 1,
                size: self.desc.len() as u32,
                map: ptr::null_mut(),
                map_len: 0,
            }
        }

        fn prod(&mut self) -> ProdRing {
            ProdRing::from_map(self.map())
        }

        fn cons(&mut self) -> ConsRing {
            ConsRing::from_map(self.map())
        }
    }

    #[test]
    fn test_reserve_submit() {
        let mut backing = TestRing::new(8);
        let mut ring = backing.prod();

        let mut idx = 0;
        assert_eq!(ring.reserve(3, &mut idx), 3);
        assert_eq!(idx, 0);

        for i in 0..3 {
            ring.set_addr(idx + i, (i as u64) * 4096);
        }
        ring.submit(3);

        assert_eq!(backing.producer.load(Ordering::Relaxed), 3);
        assert_eq!(backing.desc[..3], [0, 4096, 8192]);
    }

    #[test]
    fn test_reserve_full_ring() {
        let mut backing = TestRing::new(8);
        let mut ring = backing.prod();

        let mut idx = 0;
        assert_eq!(ring.reserve(8, &mut idx), 8);
        // Nothing consumed yet: a ninth slot must be refused outright.
        assert_eq!(ring.reserve(1, &mut idx), 0);

        // The kernel consumes 2, freeing exactly 2 slots.
        backing.consumer.store(2, Ordering::Relaxed);
        assert_eq!(ring.reserve(3, &mut idx), 0);
        assert_eq!(ring.reserve(2, &mut idx), 2);
        assert_eq!(idx, 8);
    }

    #[test]
    fn test_peek_release() {
        let mut backing = TestRing::new(8);
        backing.desc[0] = 4096;
        backing.desc[1] = 8192;
        backing.producer.store(2, Ordering::Relaxed);
        let mut ring = backing.cons();

        let mut idx = 0;
        assert_eq!(ring.peek(64, &mut idx), 2);
        assert_eq!(ring.get_addr(idx), 4096);
        assert_eq!(ring.get_addr(idx + 1), 8192);
        ring.release(2);

        assert_eq!(backing.consumer.load(Ordering::Relaxed), 2);

        // Consumer head never exceeds the producer tail.
        assert_eq!(ring.peek(64, &mut idx), 0);
    }

    #[test]
    fn test_index_wraparound() {
        let mut backing = TestRing::new(4);

        // Park both indices close to u32::MAX so production wraps.
        let start = u32::MAX - 1;
        backing.producer.store(start, Ordering::Relaxed);
        backing.consumer.store(start, Ordering::Relaxed);

        let mut prod = backing.prod();
        let mut idx = 0;
        assert_eq!(prod.reserve(4, &mut idx), 4);
        for i in 0..4 {
            prod.set_addr(idx.wrapping_add(i), i as u64);
        }
        prod.submit(4);
        assert_eq!(backing.producer.load(Ordering::Relaxed), start.wrapping_add(4));

        let mut cons = backing.cons();
        let mut idx = 0;
        assert_eq!(cons.peek(64, &mut idx), 4);
        for i in 0..4 {
            assert_eq!(cons.get_addr(idx.wrapping_add(i)), i as u64);
        }
        cons.release(4);
        assert_eq!(backing.consumer.load(Ordering::Relaxed), start.wrapping_add(4));
    }

    #[test]
    fn test_needs_wakeup_flag() {
        let mut backing = TestRing::new(4);
        let ring = backing.prod();
        assert!(!ring.needs_wakeup());

        backing.flags.store(sys::XDP_RING_NEED_WAKEUP, Ordering::Relaxed);
        assert!(ring.needs_wakeup());
    }
}
