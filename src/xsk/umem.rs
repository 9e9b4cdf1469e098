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

//! The UMEM manager: frame pool, freelist and the Fill/Completion rings.

use std::{
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use crate::xsk::{
    sys, Configuration, ConsRing, Error::*, FramePool, FrameStack, ProdRing, Result,
};

/// How many completions one drain pass reclaims at most.
pub const COMPLETION_BATCH: usize = 64;

/// An owned AF_XDP socket file descriptor, closed on drop.
pub(crate) struct SocketFd(pub libc::c_int);

impl SocketFd {
    pub(crate) fn new() -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_XDP, libc::SOCK_RAW, 0) };
        if fd < 0 {
            return Err(XskSocketCreateFailed(sys::errno()));
        }

        Ok(SocketFd(fd))
    }
}

impl Drop for SocketFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Freelist and UMEM rings, behind the one mutex that serializes them.
///
/// The Fill ring has a single user-space producer and the Completion ring a
/// single user-space consumer even when many sockets share the UMEM; holding
/// the freelist mutex across every FQ/CQ operation enforces that discipline
/// while workers call in concurrently.
struct UmemState {
    free: FrameStack,
    fq: ProdRing,
    cq: ConsRing,
}

/// The shared UMEM: backing memory, kernel registration, Fill/Completion
/// rings and the freelist of frame addresses.
///
/// Created once, before any [`Port`](crate::xsk::Port); destroyed only after
/// every port and worker is gone ([`std::sync::Arc`] enforces the order).
pub struct UmemManager {
    // Field order is teardown order: ring mappings go first, closing the fd
    // deletes the kernel UMEM, and the backing memory is unmapped last.
    state: Mutex<UmemState>,
    fd: SocketFd,
    pool: FramePool,

    fill_size: usize,
    comp_size: usize,

    fq_initialized: AtomicBool,
    fd_claimed: AtomicBool,
}

impl UmemManager {
    /// Creates the UMEM: raises the memory-lock limit, maps the frame pool,
    /// registers it with the kernel and maps the Fill/Completion rings.
    ///
    /// Any step's failure unwinds all prior steps (drop order of the partial
    /// construction).
    pub fn new(cfg: &Configuration) -> Result<Self> {
        crate::xsk::set_rlimit()?;

        let pool = FramePool::new(cfg.n_frames(), cfg.frame_size(), cfg.huge_pages())?;

        let fd = SocketFd::new()?;

        let reg = sys::xdp_umem_reg {
            addr: pool.as_ptr() as u64,
            len: pool.len() as u64,
            chunk_size: cfg.frame_size() as u32,
            headroom: cfg.frame_headroom() as u32,
            flags: 0,
            tx_metadata_len: 0,
        };

        let ret = unsafe {
            libc::setsockopt(
                fd.0,
                sys::SOL_XDP,
                sys::XDP_UMEM_REG,
                &reg as *const _ as *const libc::c_void,
                mem::size_of::<sys::xdp_umem_reg>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(XskUmemRegFailed(sys::errno()));
        }

        Self::set_ring_size(fd.0, sys::XDP_UMEM_FILL_RING, "fill", cfg.fill_size())?;
        Self::set_ring_size(
            fd.0,
            sys::XDP_UMEM_COMPLETION_RING,
            "completion",
            cfg.comp_size(),
        )?;

        let offsets = sys::mmap_offsets(fd.0).map_err(XskMmapOffsetsFailed)?;
        let fq = ProdRing::new_fill(fd.0, &offsets, cfg.fill_size())?;
        let cq = ConsRing::new_comp(fd.0, &offsets, cfg.comp_size())?;

        let free = FrameStack::new(cfg.n_frames(), cfg.frame_size());

        Ok(UmemManager {
            pool,
            fd,
            fill_size: cfg.fill_size(),
            comp_size: cfg.comp_size(),
            state: Mutex::new(UmemState { free, fq, cq }),
            fq_initialized: AtomicBool::new(false),
            fd_claimed: AtomicBool::new(false),
        })
    }

    fn set_ring_size(
        fd: libc::c_int,
        opt: libc::c_int,
        name: &'static str,
        size: usize,
    ) -> Result<()> {
        let size = size as u32;
        let ret = unsafe {
            libc::setsockopt(
                fd,
                sys::SOL_XDP,
                opt,
                &size as *const _ as *const libc::c_void,
                mem::size_of::<u32>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(XskRingSizeFailed(name, sys::errno()));
        }

        Ok(())
    }

    /// Hands out the socket fd a new port should use: the UMEM's own fd for
    /// the first port, a fresh fd to be bound with `XDP_SHARED_UMEM` for
    /// every later one. Mirrors `xsk_socket__create_shared`.
    pub(crate) fn claim_port_fd(&self) -> Result<(libc::c_int, bool, Option<SocketFd>)> {
        if !self.fd_claimed.swap(true, Ordering::SeqCst) {
            return Ok((self.fd.0, false, None));
        }

        let fd = SocketFd::new()?;
        Ok((fd.0, true, Some(fd)))
    }

    /// The fd the UMEM is registered on; shared-mode binds point at it.
    pub fn fd(&self) -> libc::c_int {
        self.fd.0
    }

    /// Populates the Fill ring with up to `fill_size` frames from the
    /// freelist. Returns the number of frames actually posted; a second call
    /// is a no-op returning 0.
    pub fn init_fill(&self) -> Result<usize> {
        if self.fq_initialized.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }

        let mut state = self.state.lock().unwrap();
        let UmemState { free, fq, .. } = &mut *state;

        let mut addrs = Vec::with_capacity(self.fill_size);
        free.pop_many(self.fill_size, &mut addrs);
        if addrs.is_empty() {
            return Err(XskFqInitNoFrames);
        }

        let want = addrs.len().min(fq.free(addrs.len()));
        let mut idx = 0;
        if want > 0 && fq.reserve(want, &mut idx) == want {
            for (i, addr) in addrs[..want].iter().enumerate() {
                fq.set_addr(idx.wrapping_add(i as u32), *addr);
            }
            fq.submit(want);
            free.push_many(&addrs[want..]);
            Ok(want)
        } else {
            free.push_many(&addrs);
            Err(XskFqRingProdReserveFailed)
        }
    }

    /// Reclaims up to `max` completed TX frames into the freelist.
    /// Never blocks; returns the number of frames reclaimed.
    pub fn drain_completions(&self, max: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let UmemState { free, cq, .. } = &mut *state;

        let mut idx = 0;
        let n = cq.peek(max, &mut idx);
        for i in 0..n {
            let addr = cq.get_addr(idx.wrapping_add(i as u32));
            free.push(self.pool.frame_addr(addr));
        }
        if n > 0 {
            cq.release(n);
        }

        n
    }

    /// Moves up to `want` frames from the freelist onto the Fill ring.
    /// Frames that cannot be posted return to the freelist.
    pub fn refill_fill(&self, want: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let UmemState { free, fq, .. } = &mut *state;

        let mut addrs = Vec::with_capacity(want);
        free.pop_many(want, &mut addrs);
        if addrs.is_empty() {
            return 0;
        }

        let got = addrs.len().min(fq.free(addrs.len()));
        let mut idx = 0;
        if got == 0 || fq.reserve(got, &mut idx) != got {
            free.push_many(&addrs);
            return 0;
        }

        for (i, addr) in addrs[..got].iter().enumerate() {
            fq.set_addr(idx.wrapping_add(i as u32), *addr);
        }
        fq.submit(got);
        free.push_many(&addrs[got..]);

        got
    }

    /// Posts a single, already-allocated frame onto the Fill ring.
    /// On failure the frame stays with the caller.
    pub fn refill_one(&self, addr: u64) -> bool {
        let mut state = self.state.lock().unwrap();

        let mut idx = 0;
        if state.fq.reserve(1, &mut idx) != 1 {
            return false;
        }
        state.fq.set_addr(idx, addr);
        state.fq.submit(1);

        true
    }

    /// Pops one frame from the freelist.
    pub fn alloc_one(&self) -> Option<u64> {
        self.state.lock().unwrap().free.pop()
    }

    /// Pops up to `want` frames from the freelist into `out`.
    pub fn alloc_frames(&self, want: usize, out: &mut Vec<u64>) -> usize {
        self.state.lock().unwrap().free.pop_many(want, out)
    }

    /// Returns one frame to the freelist, normalized to its frame base.
    pub fn free_one(&self, addr: u64) {
        self.state
            .lock()
            .unwrap()
            .free
            .push(self.pool.frame_addr(addr));
    }

    /// Returns every frame in `addrs` to the freelist.
    pub fn free_frames(&self, addrs: &[u64]) {
        let mut state = self.state.lock().unwrap();
        for &addr in addrs {
            state.free.push(self.pool.frame_addr(addr));
        }
    }

    /// Returns the current freelist occupancy.
    pub fn n_free_frames(&self) -> usize {
        self.state.lock().unwrap().free.len()
    }

    /// Returns whether the Fill ring advertises that the kernel needs a
    /// wakeup syscall to resume consuming it.
    pub fn fq_needs_wakeup(&self) -> bool {
        self.state.lock().unwrap().fq.needs_wakeup()
    }

    /// Translates a ring address into a pointer into the frame pool.
    #[inline(always)]
    pub fn data_ptr(&self, addr: u64) -> *mut u8 {
        self.pool.data_ptr(addr)
    }

    /// Rounds a ring address down to its frame base address.
    #[inline(always)]
    pub fn frame_addr(&self, addr: u64) -> u64 {
        self.pool.frame_addr(addr)
    }

    /// Returns the total number of UMEM frames.
    pub fn n_frames(&self) -> usize {
        self.pool.n_frames()
    }

    /// Returns the completion ring capacity.
    pub fn comp_size(&self) -> usize {
        self.comp_size
    }
}
