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

//! A kernel-bypass packet forwarder built on AF_XDP sockets.
//!
//! Packets arrive from a NIC queue into user-space rings backed by a shared
//! UMEM frame pool, get their MAC addresses swapped in place, and are
//! injected back into the next port of the cohort without ever crossing the
//! kernel network stack.

pub mod fwd;
pub mod xsk;
