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

//! Error handling for XSK operations.

use thiserror::Error;

use std::{ffi::CStr, result};

/// A specialized [`Result`](std::result) type for XSK operations.
///
/// This type is broadly used across `xsk` for any operation which may produce an error.
pub type Result<T> = result::Result<T, Error>;

/// The error type for XSK operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {}", .0)]
    InvalidConfig(String),
    #[error("Invalid XSK mode")]
    InvalidXskMode,
    #[error("Failed to set rlimit: {}", errno_to_str(.0))]
    SetrlimitFailed(i32),
    #[error("Failed to mmap UMEM backing memory: {}", errno_to_str(.0))]
    UmemMmapFailed(i32),
    #[error("Failed to create AF_XDP socket: {}", errno_to_str(.0))]
    XskSocketCreateFailed(i32),
    #[error("Failed to register UMEM: {}", errno_to_str(.0))]
    XskUmemRegFailed(i32),
    #[error("Failed to size {} ring: {}", .0, errno_to_str(.1))]
    XskRingSizeFailed(&'static str, i32),
    #[error("Failed to query ring mmap offsets: {}", errno_to_str(.0))]
    XskMmapOffsetsFailed(i32),
    #[error("Failed to mmap {} ring: {}", .0, errno_to_str(.1))]
    XskRingMmapFailed(&'static str, i32),
    #[error("Failed to bind AF_XDP socket to {}: {}", .0, errno_to_str(.1))]
    XskBindFailed(String, i32),
    #[error("Cannot resolve interface index of {}", .0)]
    IfNameToIndexFailed(String),
    #[error("Failed to reserve descriptors in fill ring")]
    XskFqRingProdReserveFailed,
    #[error("No free frames for the initial fill ring population")]
    XskFqInitNoFrames,
    #[error("poll() on socket fd returned -1: {}", errno_to_str(.0))]
    XskSocketPollFailed(i32),
    #[error("sendto() returned -1: {}", errno_to_str(.0))]
    XskTxSendtoFailed(i32),
    #[error("netlink XDP detach failed: {}", errno_to_str(.0))]
    XdpDetachFailed(i32),
    #[error("Failed to spawn worker thread: {}", .0)]
    ThreadSpawnFailed(std::io::Error),
}

fn errno_to_str(err: &i32) -> String {
    let s = unsafe { CStr::from_ptr(libc::strerror(*err)) };
    String::from(s.to_str().unwrap_or_default())
}
