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

//! Detaching XDP programs from interfaces.
//!
//! Program attach is an external concern (ip/xdp-loader or the NIC setup
//! scripts); at shutdown the forwarder only makes sure no program is left
//! behind, by sending the `RTM_SETLINK` message that installs fd -1.

use std::mem;

use crate::xsk::{sys, Error::*, Result};

const IFLA_XDP: u16 = 43;
const IFLA_XDP_FD: u16 = 1;
const NLA_F_NESTED: u16 = 1 << 15;

#[repr(C)]
struct DetachRequest {
    nlh: libc::nlmsghdr,
    ifi: libc::ifinfomsg,
    outer: libc::nlattr,
    inner: libc::nlattr,
    fd: i32,
}

/// Removes any XDP program attached to the interface.
///
/// A no-op on interfaces without a program: installing fd -1 always succeeds.
pub fn detach(interface: &str) -> Result<()> {
    let ifindex = nix::net::if_::if_nametoindex(interface)
        .map_err(|_| IfNameToIndexFailed(interface.to_string()))?;

    let fd = unsafe { libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_ROUTE) };
    if fd < 0 {
        return Err(XdpDetachFailed(sys::errno()));
    }

    let ret = detach_via(fd, ifindex as i32);
    unsafe {
        libc::close(fd);
    }

    ret
}

fn detach_via(fd: libc::c_int, ifindex: i32) -> Result<()> {
    let mut req: DetachRequest = unsafe { mem::zeroed() };

    req.nlh.nlmsg_len = mem::size_of::<DetachRequest>() as u32;
    req.nlh.nlmsg_type = libc::RTM_SETLINK;
    req.nlh.nlmsg_flags = (libc::NLM_F_REQUEST | libc::NLM_F_ACK) as u16;
    req.ifi.ifi_family = libc::AF_UNSPEC as u8;
    req.ifi.ifi_index = ifindex;
    req.outer.nla_type = IFLA_XDP | NLA_F_NESTED;
    req.outer.nla_len =
        (mem::size_of::<libc::nlattr>() * 2 + mem::size_of::<i32>()) as u16;
    req.inner.nla_type = IFLA_XDP_FD;
    req.inner.nla_len = (mem::size_of::<libc::nlattr>() + mem::size_of::<i32>()) as u16;
    req.fd = -1;

    let ret = unsafe {
        libc::send(
            fd,
            &req as *const _ as *const libc::c_void,
            mem::size_of::<DetachRequest>(),
            0,
        )
    };
    if ret < 0 {
        return Err(XdpDetachFailed(sys::errno()));
    }

    // The kernel acks with an nlmsgerr; error 0 is the ack itself.
    let mut buf = [0u8; 4096];
    let len = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    if len < 0 {
        return Err(XdpDetachFailed(sys::errno()));
    }

    if (len as usize) >= mem::size_of::<libc::nlmsghdr>() + mem::size_of::<i32>() {
        let nlh = unsafe { &*(buf.as_ptr() as *const libc::nlmsghdr) };
        if nlh.nlmsg_type == libc::NLMSG_ERROR as u16 {
            let errno = unsafe {
                *(buf.as_ptr().add(mem::size_of::<libc::nlmsghdr>()) as *const i32)
            };
            if errno != 0 {
                return Err(XdpDetachFailed(-errno));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        // The netlink attribute lengths must describe the trailing payload
        // exactly, or the kernel rejects the message.
        assert_eq!(mem::size_of::<DetachRequest>(), 44);

        let mut req: DetachRequest = unsafe { mem::zeroed() };
        req.outer.nla_len =
            (mem::size_of::<libc::nlattr>() * 2 + mem::size_of::<i32>()) as u16;
        req.inner.nla_len = (mem::size_of::<libc::nlattr>() + mem::size_of::<i32>()) as u16;

        assert_eq!(req.outer.nla_len, 12);
        assert_eq!(req.inner.nla_len, 8);
    }
}
