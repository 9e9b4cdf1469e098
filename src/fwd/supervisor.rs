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

//! The supervisor: constructs and wires the UMEM, ports and workers, prints
//! statistics, and tears everything down in reverse order.

use log::{info, warn};

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::{
    fwd::{stats::PortView, Runner, StatsPrinter, Worker},
    xsk,
    xsk::{Configuration, Error, Port, Result, UmemManager},
};

/// How often the quit flag is polled between statistics ticks. Keeps the
/// shutdown join latency well under the 1 s statistics interval.
const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The statistics interval.
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Owns one forwarder run: the UMEM manager, the worker threads and the
/// statistics loop.
///
/// Ports live inside their worker threads and die when the workers join; the
/// UMEM manager outlives them through its `Arc`.
pub struct Supervisor {
    umem: Arc<UmemManager>,
    runner: Runner,
    workers: Vec<thread::JoinHandle<()>>,
    port_views: Vec<PortView>,
}

impl Supervisor {
    /// Validates the configuration, builds the UMEM manager and all ports,
    /// seeds the fill ring and spawns one pinned worker per cohort.
    ///
    /// Any failure unwinds the partial construction in reverse order before
    /// returning.
    pub fn new(cfg: &Configuration) -> Result<Self> {
        cfg.validate()?;

        let umem = Arc::new(UmemManager::new(cfg)?);
        info!(
            "UMEM created: {} frames x {} bytes",
            cfg.n_frames(),
            cfg.frame_size()
        );

        let mut ports = Vec::with_capacity(cfg.ports().len());
        let mut port_views = Vec::with_capacity(cfg.ports().len());
        for (port_id, spec) in cfg.ports().iter().enumerate() {
            let port = Port::new(&umem, spec, cfg)?;
            info!(
                "Port {}: interface = {}, queue = {}",
                port_id,
                port.interface(),
                port.queue()
            );

            port_views.push(PortView {
                interface: spec.interface.clone(),
                queue: spec.queue,
                stats: port.stats(),
            });
            ports.push(port);
        }

        let posted = umem.init_fill()?;
        if posted < cfg.fill_size() {
            warn!(
                "initial fill posted only {} of {} frames",
                posted,
                cfg.fill_size()
            );
        }

        let runner = Runner::default();
        let n_ports_per_thread = ports.len() / cfg.cores().len();

        let mut workers = Vec::with_capacity(cfg.cores().len());
        for (thread_id, &core_id) in cfg.cores().iter().enumerate() {
            let cohort: Vec<Port> = ports.drain(..n_ports_per_thread).collect();
            log_thread_wiring(thread_id, core_id, &cohort);

            let worker = Worker::new(core_id, cohort, runner.clone());
            let handle = thread::Builder::new()
                .name(format!("fwd-worker-{}", thread_id))
                .spawn(move || worker.run())
                .map_err(Error::ThreadSpawnFailed)?;
            workers.push(handle);
        }

        Ok(Supervisor {
            umem,
            runner,
            workers,
            port_views,
        })
    }

    /// Returns a handle for stopping the run, e.g. from a signal handler.
    pub fn runner(&self) -> Runner {
        self.runner.clone()
    }

    /// Blocks printing the per-port statistics table once per second until
    /// the quit flag drops, then joins the workers and cleans up.
    pub fn run(&mut self) {
        let mut printer = StatsPrinter::new(self.port_views.len());
        let mut last_sample = Instant::now();

        while self.runner.is_running() {
            thread::sleep(QUIT_POLL_INTERVAL);

            let elapsed = last_sample.elapsed();
            if elapsed >= STATS_INTERVAL {
                printer.print_all(&self.port_views, elapsed.as_nanos() as u64);
                last_sample = Instant::now();
            }
        }

        self.shutdown();
    }

    /// Stops the workers, joins them and detaches any XDP program left on
    /// the forwarding interfaces.
    fn shutdown(&mut self) {
        info!("Quit.");
        self.runner.stop();

        while let Some(worker) = self.workers.pop() {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }

        info!(
            "freelist occupancy at shutdown: {}/{}",
            self.umem.n_free_frames(),
            self.umem.n_frames()
        );

        let mut detached: Vec<&str> = Vec::new();
        for view in &self.port_views {
            if detached.contains(&view.interface.as_str()) {
                continue;
            }
            detached.push(&view.interface);

            match xsk::xdp_prog::detach(&view.interface) {
                Ok(()) => info!("detached XDP program from {}", view.interface),
                Err(e) => warn!("cannot detach XDP program from {}: {}", view.interface, e),
            }
        }
    }
}

fn log_thread_wiring(thread_id: usize, core_id: usize, cohort: &[Port]) {
    let pairs: Vec<String> = cohort
        .iter()
        .enumerate()
        .map(|(i, rx)| {
            let tx = &cohort[super::worker::tx_slot(i, cohort.len())];
            format!(
                "({}, {}) -> ({}, {})",
                rx.interface(),
                rx.queue(),
                tx.interface(),
                tx.queue()
            )
        })
        .collect();

    info!(
        "Thread {} (CPU core {}): {}",
        thread_id,
        core_id,
        pairs.join(", ")
    );
}
