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

//! Per-port statistics output.

use std::sync::{atomic::Ordering, Arc};

use crate::xsk::PortStats;

/// The supervisor's read-only view of one port: identity plus counters.
pub struct PortView {
    pub interface: String,
    pub queue: u32,
    pub stats: Arc<PortStats>,
}

/// Prints the once-per-second statistics table and keeps the previous
/// counter samples needed for the rate columns.
pub struct StatsPrinter {
    n_pkts_rx_hist: Vec<u64>,
    n_pkts_tx_hist: Vec<u64>,
}

/// Packets per second between two counter samples taken `ns_diff` apart.
pub fn rate_pps(cur: u64, prev: u64, ns_diff: u64) -> f64 {
    (cur - prev) as f64 * 1_000_000_000.0 / ns_diff as f64
}

const SEPARATOR: &str =
    "+------+--------------+---------------+--------------+---------------+";

impl StatsPrinter {
    /// Creates a printer tracking `n_ports` ports.
    pub fn new(n_ports: usize) -> Self {
        StatsPrinter {
            n_pkts_rx_hist: vec![0; n_ports],
            n_pkts_tx_hist: vec![0; n_ports],
        }
    }

    /// Prints one table row per port and advances the rate samples.
    pub fn print_all(&mut self, ports: &[PortView], ns_diff: u64) {
        println!("{}", SEPARATOR);
        println!(
            "| {:>4} | {:>12} | {:>13} | {:>12} | {:>13} |",
            "Port", "RX packets", "RX rate (pps)", "TX packets", "TX_rate (pps)"
        );
        println!("{}", SEPARATOR);

        for (port_id, port) in ports.iter().enumerate() {
            let n_pkts_rx = port.stats.n_pkts_rx.load(Ordering::Relaxed);
            let n_pkts_tx = port.stats.n_pkts_tx.load(Ordering::Relaxed);

            println!(
                "| {:>4} | {:>12} | {:>13.0} | {:>12} | {:>13.0} |",
                port_id,
                n_pkts_rx,
                rate_pps(n_pkts_rx, self.n_pkts_rx_hist[port_id], ns_diff),
                n_pkts_tx,
                rate_pps(n_pkts_tx, self.n_pkts_tx_hist[port_id], ns_diff),
            );

            self.n_pkts_rx_hist[port_id] = n_pkts_rx;
            self.n_pkts_tx_hist[port_id] = n_pkts_tx;
        }

        println!("{}", SEPARATOR);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_pps() {
        // 1000 packets in exactly one second.
        assert_eq!(rate_pps(1000, 0, 1_000_000_000), 1000.0);
        // 500 new packets in half a second.
        assert_eq!(rate_pps(1500, 1000, 500_000_000), 1000.0);
        // Idle interval.
        assert_eq!(rate_pps(42, 42, 1_000_000_000), 0.0);
    }

    #[test]
    fn test_print_advances_history() {
        let stats = Arc::new(PortStats::default());
        stats.n_pkts_rx.store(100, Ordering::Relaxed);
        stats.n_pkts_tx.store(50, Ordering::Relaxed);

        let ports = vec![PortView {
            interface: "veth0".to_string(),
            queue: 0,
            stats: stats.clone(),
        }];

        let mut printer = StatsPrinter::new(1);
        printer.print_all(&ports, 1_000_000_000);
        assert_eq!(printer.n_pkts_rx_hist[0], 100);
        assert_eq!(printer.n_pkts_tx_hist[0], 50);

        stats.n_pkts_rx.store(300, Ordering::Relaxed);
        printer.print_all(&ports, 1_000_000_000);
        assert_eq!(printer.n_pkts_rx_hist[0], 300);
    }
}
