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

use libhairpin::{fwd, xsk};

#[test]
fn test_uneven_port_distribution_fails_before_any_socket() {
    let mut cfg = xsk::Configuration::default();
    cfg.add_core(0).add_core(1);
    for interface in ["veth0", "veth1", "veth2"] {
        cfg.add_port(interface);
    }

    // 3 ports across 2 workers: rejected by validation, so no AF_XDP socket
    // (and no privileged syscall) is ever attempted.
    assert!(fwd::Supervisor::new(&cfg).is_err());
}

#[test]
fn test_empty_configuration_rejected() {
    let cfg = xsk::Configuration::default();
    assert!(fwd::Supervisor::new(&cfg).is_err());

    let mut cfg = xsk::Configuration::default();
    cfg.add_port("veth0");
    assert!(fwd::Supervisor::new(&cfg).is_err());
}

#[test]
fn test_bad_ring_sizing_rejected() {
    let mut cfg = xsk::Configuration::default();
    cfg.add_core(0);
    cfg.add_port("veth0");
    cfg.set_n_frames(1024).set_fill_size(4096);

    assert!(fwd::Supervisor::new(&cfg).is_err());
}
