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

//! Ethernet header mutation.

use std::{fmt, mem};

/// An Ethernet header, as laid out on the wire.
#[repr(C)]
pub struct EthHdr {
    pub dst_address: [u8; 6],
    pub src_address: [u8; 6],
    pub ether_type: u16,
}

impl EthHdr {
    /// The header length in bytes.
    pub const LEN: usize = mem::size_of::<EthHdr>();

    /// Reinterprets the start of a packet buffer as an Ethernet header.
    ///
    /// # Safety
    ///
    /// `ptr` must point at least [`EthHdr::LEN`] readable and writable bytes,
    /// exclusively held by the caller for the lifetime of the reference. For
    /// a UMEM frame that is the window between RX peek and TX submit.
    #[allow(clippy::cast_ptr_alignment)]
    pub unsafe fn from_ptr<'a>(ptr: *mut u8) -> &'a mut Self {
        &mut *(ptr as *mut EthHdr)
    }

    /// Exchanges the source and destination MAC addresses in place.
    pub fn swap_addresses(&mut self) {
        mem::swap(&mut self.src_address, &mut self.dst_address);
    }
}

impl fmt::Debug for EthHdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EthHdr {{ dst_address: {}, src_address: {}, ether_type: 0x{:04x} }}",
            mac_to_string(self.dst_address),
            mac_to_string(self.src_address),
            u16::from_be(self.ether_type),
        )
    }
}

fn mac_to_string(mac: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(EthHdr::LEN, 14);
    }

    #[test]
    fn test_swap_addresses() {
        let mut frame: [u8; 64] = [0; 64];
        frame[..6].copy_from_slice(&[0xbb; 6]);
        frame[6..12].copy_from_slice(&[0xaa; 6]);
        frame[12] = 0x08;
        frame[13] = 0x00;
        frame[14] = 0x42;

        let eth = unsafe { EthHdr::from_ptr(frame.as_mut_ptr()) };
        eth.swap_addresses();

        // The 12-byte prefix is exchanged field for field; nothing after the
        // MAC addresses moves.
        assert_eq!(&frame[..6], &[0xaa; 6]);
        assert_eq!(&frame[6..12], &[0xbb; 6]);
        assert_eq!(&frame[12..14], &[0x08, 0x00]);
        assert_eq!(frame[14], 0x42);
    }

    #[test]
    fn test_swap_twice_is_identity() {
        let mut frame: [u8; EthHdr::LEN] = [0; EthHdr::LEN];
        for (i, b) in frame.iter_mut().enumerate() {
            *b = i as u8;
        }
        let orig = frame;

        let eth = unsafe { EthHdr::from_ptr(frame.as_mut_ptr()) };
        eth.swap_addresses();
        eth.swap_addresses();

        assert_eq!(frame, orig);
    }

    #[test]
    fn test_debug_format() {
        let mut frame: [u8; EthHdr::LEN] = [0; EthHdr::LEN];
        frame[..6].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);

        let eth = unsafe { EthHdr::from_ptr(frame.as_mut_ptr()) };
        let s = format!("{:?}", eth);
        assert!(s.contains("de:ad:be:ef:00:01"));
    }
}
