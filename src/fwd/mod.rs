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

//! The forwarding layer: workers, supervisor and statistics.

mod eth;
pub use self::eth::EthHdr;

mod stats;
pub use self::stats::{PortView, StatsPrinter};

mod supervisor;
pub use self::supervisor::Supervisor;

mod worker;
pub use self::worker::Worker;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A type for keeping track of the state and halting the execution of the
/// forwarding workers.
///
/// Cancellation is cooperative: workers poll the flag on every pump cycle and
/// inside every retry loop, so shutdown latency is bounded by one cycle.
#[derive(Clone)]
pub struct Runner {
    running: Arc<AtomicBool>,
}

impl Default for Runner {
    fn default() -> Self {
        Runner {
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Runner {
    /// Returns true if the runner is in running state.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the runner. Safe to call from a signal handler thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_stop() {
        let runner = Runner::default();
        assert!(runner.is_running());

        let clone = runner.clone();
        clone.stop();
        assert!(!runner.is_running());
    }
}
