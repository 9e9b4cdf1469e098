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

//! The AF_XDP layer: UMEM, rings, freelist and ports.

mod configuration;
pub use self::configuration::*;

mod error;
pub use self::error::{Error, Result};

mod frame_pool;
pub use self::frame_pool::FramePool;

mod freelist;
pub use self::freelist::FrameStack;

mod ring;
pub use self::ring::{ConsRing, ProdRing};

mod socket;
pub use self::socket::{Port, PortStats};

pub mod sys;

mod umem;
pub use self::umem::{UmemManager, COMPLETION_BATCH};

pub mod xdp_prog;

/// Raises the memory-lock limit to unlimited, as required for the kernel to
/// DMA into the UMEM.
pub fn set_rlimit() -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };

    let errno = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if errno != 0 {
        return Err(Error::SetrlimitFailed(errno));
    }

    Ok(())
}
