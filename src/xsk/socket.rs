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

//! Forwarding ports: one AF_XDP socket per (interface, queue) pair.

use std::{
    mem, ptr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::xsk::{
    sys, Configuration, ConsRing, Error::*, NeedsWakeup, PortSpec, ProdRing, Result, UmemManager,
};
use crate::xsk::umem::SocketFd;

/// Per-port packet counters.
///
/// Written only by the owning worker; the supervisor's statistics tick reads
/// them relaxed, which is the explicit statistics-only concession of the
/// design.
#[derive(Default)]
pub struct PortStats {
    pub n_pkts_rx: AtomicU64,
    pub n_pkts_tx: AtomicU64,
    pub n_errs: AtomicU64,
}

/// A user-space socket bound to one (interface, queue) pair, sharing the
/// [`UmemManager`]'s memory and Fill/Completion rings.
///
/// Created after the UMEM manager and destroyed before it; each port is moved
/// into exactly one worker thread, which gives it exclusive RX/TX ring
/// ownership for free.
pub struct Port {
    // Ring mappings are dropped before the socket fd they map.
    rx: ConsRing,
    tx: ProdRing,

    fd: libc::c_int,
    // The first port borrows the UMEM's own fd; later ports own a fresh one.
    _owned_fd: Option<SocketFd>,

    umem: Arc<UmemManager>,

    needs_wakeup: NeedsWakeup,
    stats: Arc<PortStats>,

    interface: String,
    queue: u32,
}

impl Port {
    /// Creates and binds a port against an existing UMEM manager.
    pub fn new(umem: &Arc<UmemManager>, spec: &PortSpec, cfg: &Configuration) -> Result<Self> {
        let ifindex = nix::net::if_::if_nametoindex(spec.interface.as_str())
            .map_err(|_| IfNameToIndexFailed(spec.interface.clone()))?;

        let (fd, shared, owned_fd) = umem.claim_port_fd()?;

        Self::set_ring_size(fd, sys::XDP_RX_RING, "rx", cfg.rx_size())?;
        Self::set_ring_size(fd, sys::XDP_TX_RING, "tx", cfg.tx_size())?;

        let offsets = sys::mmap_offsets(fd).map_err(XskMmapOffsetsFailed)?;
        let rx = ConsRing::new_rx(fd, &offsets, cfg.rx_size())?;
        let tx = ProdRing::new_tx(fd, &offsets, cfg.tx_size())?;

        // Sockets after the first share the UMEM fd's rings; the kernel
        // rejects any other flag alongside XDP_SHARED_UMEM.
        let mut sxdp = sys::sockaddr_xdp {
            sxdp_ifindex: ifindex,
            sxdp_queue_id: spec.queue,
            ..Default::default()
        };
        if shared {
            sxdp.sxdp_flags = sys::XDP_SHARED_UMEM;
            sxdp.sxdp_shared_umem_fd = umem.fd() as u32;
        } else {
            sxdp.sxdp_flags =
                cfg.mode().into_bind_flags() | cfg.needs_wakeup().into_bind_flags();
        }

        let ret = unsafe {
            libc::bind(
                fd,
                &sxdp as *const _ as *const libc::sockaddr,
                mem::size_of::<sys::sockaddr_xdp>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(XskBindFailed(
                format!("{}:{}", spec.interface, spec.queue),
                sys::errno(),
            ));
        }

        Ok(Port {
            umem: umem.clone(),
            fd,
            _owned_fd: owned_fd,
            rx,
            tx,
            needs_wakeup: cfg.needs_wakeup(),
            stats: Arc::new(PortStats::default()),
            interface: spec.interface.clone(),
            queue: spec.queue,
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

    /// Dequeues one RX descriptor, if any. The returned address still carries
    /// any packet-data offset bits; the frame is now held by the caller.
    pub fn rx_peek_one(&mut self) -> Option<(u64, u32)> {
        let mut idx = 0;
        if self.rx.peek(1, &mut idx) == 0 {
            return None;
        }

        let desc = self.rx.get_desc(idx);
        self.rx.release(1);
        self.stats.n_pkts_rx.fetch_add(1, Ordering::Relaxed);

        Some((desc.addr, desc.len))
    }

    /// Tries to enqueue one TX descriptor. Returns false when the TX ring is
    /// full; on success the descriptor is submitted and the kernel kicked if
    /// it asked to be.
    pub fn try_tx(&mut self, addr: u64, len: u32) -> Result<bool> {
        let mut idx = 0;
        if self.tx.reserve(1, &mut idx) != 1 {
            return Ok(false);
        }

        self.tx.set_desc(
            idx,
            sys::xdp_desc {
                addr,
                len,
                options: 0,
            },
        );
        self.tx.submit(1);
        self.stats.n_pkts_tx.fetch_add(1, Ordering::Relaxed);

        self.wake_tx()?;

        Ok(true)
    }

    /// Kicks the TX path if the ring asks for it, or unconditionally when the
    /// socket was bound without the need-wakeup hint (the kernel then only
    /// drains TX on an explicit syscall).
    pub fn wake_tx(&self) -> Result<()> {
        if self.needs_wakeup.value {
            if self.tx.needs_wakeup() {
                self.kick()?;
            }
        } else {
            self.kick()?;
        }

        Ok(())
    }

    /// Kicks the kernel with a zero-length non-blocking `sendto`.
    pub fn kick(&self) -> Result<()> {
        let ret = unsafe {
            libc::sendto(
                self.fd,
                ptr::null(),
                0,
                libc::MSG_DONTWAIT,
                ptr::null(),
                0,
            )
        };

        if ret == -1 {
            let errno = sys::errno();
            if !(errno == libc::ENOBUFS
                || errno == libc::EAGAIN
                || errno == libc::EBUSY
                || errno == libc::ENETDOWN)
            {
                return Err(XskTxSendtoFailed(errno));
            }
        }

        Ok(())
    }

    /// Polls the socket for input readiness with the given timeout in
    /// milliseconds. `EINTR` is not an error.
    pub fn poll_in(&self, timeout: libc::c_int) -> Result<i32> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let ret = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if ret == -1 {
            let errno = sys::errno();
            if errno != libc::EINTR {
                return Err(XskSocketPollFailed(errno));
            }
        }

        Ok(ret)
    }

    /// Records a non-fatal hot-path error (failed kick or poll). The worker
    /// logs and keeps forwarding; the counter surfaces the condition.
    pub fn record_error(&self) {
        self.stats.n_errs.fetch_add(1, Ordering::Relaxed);
    }

    /// The UMEM manager this port shares.
    pub fn umem(&self) -> &Arc<UmemManager> {
        &self.umem
    }

    /// The port's packet counters, shareable with the statistics printer.
    pub fn stats(&self) -> Arc<PortStats> {
        self.stats.clone()
    }

    /// The interface this port is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// The queue id this port is bound to.
    pub fn queue(&self) -> u32 {
        self.queue
    }
}
