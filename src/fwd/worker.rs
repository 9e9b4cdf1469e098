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

//! The forwarding worker: a CPU-pinned cooperative loop pumping RX to TX
//! across its cohort of ports.

use log::{debug, warn};

use std::{sync::Arc, thread};

use crate::{
    fwd::{eth::EthHdr, Runner},
    xsk::{Port, UmemManager, COMPLETION_BATCH, MAX_PORTS_PER_THREAD},
};

/// TX for cohort slot `slot` is the port one slot ahead, wrapping around:
/// the cohort's ports form a forwarding ring, and a single port loops back
/// onto itself.
#[inline(always)]
pub(crate) fn tx_slot(slot: usize, n_ports: usize) -> usize {
    (slot + 1) % n_ports
}

/// One forwarding worker: an ordered cohort of ports serviced round-robin by
/// a single thread pinned to one CPU core.
pub struct Worker {
    core_id: usize,
    ports: Vec<Port>,
    umem: Arc<UmemManager>,
    runner: Runner,
}

impl Worker {
    /// Creates a worker over its cohort.
    ///
    /// Forwarding moves frame addresses between ports without copying, which
    /// is only sound when every port shares one UMEM; that is asserted here.
    pub fn new(core_id: usize, ports: Vec<Port>, runner: Runner) -> Self {
        assert!(!ports.is_empty() && ports.len() <= MAX_PORTS_PER_THREAD);

        let umem = ports[0].umem().clone();
        for port in &ports {
            assert!(
                Arc::ptr_eq(port.umem(), &umem),
                "cohort ports must share one UMEM"
            );
        }

        Worker {
            core_id,
            ports,
            umem,
            runner,
        }
    }

    /// Runs the worker until the quit flag drops. Consumes the worker; the
    /// ports die with the thread.
    pub fn run(mut self) {
        if !pin_current_thread(self.core_id) {
            warn!("cannot pin worker to CPU core {}, running unpinned", self.core_id);
        }

        let n_ports = self.ports.len();
        let mut slot = 0;
        while self.runner.is_running() {
            self.pump_once(slot);
            slot = tx_slot(slot, n_ports);
        }
    }

    /// One pump cycle for one (rx, tx) port pair. Returns true if a packet
    /// was forwarded, false if RX was empty or shutdown intervened.
    ///
    /// Every path out of this function either took no frame from the
    /// freelist or has pushed back any frame it took.
    fn pump_once(&mut self, slot: usize) -> bool {
        let tx = tx_slot(slot, self.ports.len());

        // 1) Recycle TX completions so the freelist doesn't starve.
        self.umem.drain_completions(self.umem.comp_size());

        // 2) Peek exactly one packet from RX.
        let (addr, len) = match self.ports[slot].rx_peek_one() {
            Some(desc) => desc,
            None => {
                if self.umem.fq_needs_wakeup() {
                    self.poll_rx(slot);
                }
                return false;
            }
        };

        // 3) Edit the packet in place: swap the Ethernet MAC addresses.
        // The frame is exclusively ours between the RX peek above and the
        // TX submit below.
        if len as usize >= EthHdr::LEN {
            unsafe {
                EthHdr::from_ptr(self.umem.data_ptr(addr)).swap_addresses();
            }
        }

        // 4) Transmit on the TX port. Reservation failure is backpressure
        // from the remote NIC: kick when asked to and retry.
        loop {
            match self.ports[tx].try_tx(addr, len) {
                Ok(true) => break,
                Ok(false) => {
                    if !self.runner.is_running() {
                        self.umem.free_one(addr);
                        return false;
                    }
                    if let Err(e) = self.ports[tx].wake_tx() {
                        self.ports[tx].record_error();
                        debug!("tx kick: {}", e);
                    }
                    thread::yield_now();
                }
                Err(e) => {
                    // The descriptor was submitted; only the kick failed.
                    self.ports[tx].record_error();
                    debug!("tx kick: {}", e);
                    break;
                }
            }
        }

        // 5) Replenish the fill ring with one fresh frame. An empty freelist
        // is backpressure from our own NIC: reclaim completions and give the
        // kernel a poll until a frame comes back.
        let fresh = loop {
            if let Some(addr) = self.umem.alloc_one() {
                break addr;
            }
            if !self.runner.is_running() {
                return false;
            }
            if self.umem.fq_needs_wakeup() {
                self.poll_rx(slot);
            }
            self.umem.drain_completions(COMPLETION_BATCH);
        };

        while !self.umem.refill_one(fresh) {
            if !self.runner.is_running() {
                self.umem.free_one(fresh);
                return false;
            }
            if self.umem.fq_needs_wakeup() {
                self.poll_rx(slot);
            }
        }

        true
    }

    /// Zero-timeout poll on a port's socket, giving the kernel a chance to
    /// consume the fill ring.
    fn poll_rx(&mut self, slot: usize) {
        if let Err(e) = self.ports[slot].poll_in(0) {
            self.ports[slot].record_error();
            debug!("rx poll: {}", e);
        }
    }
}

/// Pins the calling thread to the given CPU core.
fn pin_current_thread(core_id: usize) -> bool {
    let cores = match core_affinity::get_core_ids() {
        Some(cores) => cores,
        None => return false,
    };

    match cores.into_iter().find(|c| c.id == core_id) {
        Some(core) => core_affinity::set_for_current(core),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_slot_ring() {
        // Four ports: 0 -> 1 -> 2 -> 3 -> 0.
        assert_eq!(tx_slot(0, 4), 1);
        assert_eq!(tx_slot(2, 4), 3);
        assert_eq!(tx_slot(3, 4), 0);
    }

    #[test]
    fn test_tx_slot_single_port_loops_to_self() {
        assert_eq!(tx_slot(0, 1), 0);
    }

    #[test]
    fn test_tx_slot_covers_all_ports() {
        // Round-robin starting anywhere visits every slot exactly once per n
        // steps: the fairness bound of the cohort policy.
        let n = 5;
        let mut seen = vec![false; n];
        let mut slot = 3;
        for _ in 0..n {
            seen[slot] = true;
            slot = tx_slot(slot, n);
        }
        assert!(seen.iter().all(|&s| s));
    }
}
