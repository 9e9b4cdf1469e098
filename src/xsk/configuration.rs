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

//! A type for dealing with forwarder configuration.

use std::str::FromStr;

use crate::xsk::{self, Error, Result};

/// Upper bound on forwarding ports.
pub const MAX_PORTS: usize = 64;

/// Upper bound on worker threads.
pub const MAX_THREADS: usize = 64;

/// Upper bound on ports served by one worker.
pub const MAX_PORTS_PER_THREAD: usize = 16;

/// One (interface, queue id) pair a port binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub interface: String,
    pub queue: u32,
}

/// Configuration builder for a forwarder run.
pub struct Configuration {
    cores: Vec<usize>,
    ports: Vec<PortSpec>,

    n_frames: usize,
    frame_size: usize,
    frame_headroom: usize,
    fill_size: usize,
    comp_size: usize,
    rx_size: usize,
    tx_size: usize,
    huge_pages: bool,
    mode: XskMode,
    needs_wakeup: NeedsWakeup,
}

impl Default for Configuration {
    /// Creates a new [`Configuration`] object with the default values.
    fn default() -> Self {
        Configuration {
            cores: Vec::new(),
            ports: Vec::new(),

            n_frames: 64 * 1024,
            frame_size: xsk::sys::XSK_UMEM__DEFAULT_FRAME_SIZE,
            frame_headroom: xsk::sys::XSK_UMEM__DEFAULT_FRAME_HEADROOM,
            fill_size: xsk::sys::XSK_RING_PROD__DEFAULT_NUM_DESCS * 2,
            comp_size: xsk::sys::XSK_RING_CONS__DEFAULT_NUM_DESCS,
            rx_size: xsk::sys::XSK_RING_CONS__DEFAULT_NUM_DESCS,
            tx_size: xsk::sys::XSK_RING_PROD__DEFAULT_NUM_DESCS,
            huge_pages: false,
            mode: XskMode::Drv,
            needs_wakeup: NeedsWakeup::new(true),
        }
    }
}

impl Configuration {
    /// Appends a worker pinned to the given CPU core.
    pub fn add_core(&mut self, core: usize) -> &mut Self {
        self.cores.push(core);
        self
    }

    /// Get the worker CPU cores.
    pub fn cores(&self) -> &[usize] {
        self.cores.as_ref()
    }

    /// Appends a forwarding port bound to the given interface, queue 0.
    pub fn add_port<S: AsRef<str>>(&mut self, interface: S) -> &mut Self {
        self.ports.push(PortSpec {
            interface: interface.as_ref().into(),
            queue: 0,
        });
        self
    }

    /// Overrides the queue id of the most recently added port.
    pub fn set_last_port_queue(&mut self, queue: u32) -> Result<&mut Self> {
        match self.ports.last_mut() {
            Some(port) => {
                port.queue = queue;
                Ok(self)
            }
            None => Err(Error::InvalidConfig(
                "no port specified for queue".to_string(),
            )),
        }
    }

    /// Get the port specs.
    pub fn ports(&self) -> &[PortSpec] {
        self.ports.as_ref()
    }

    /// Set the total number of UMEM frames.
    pub fn set_n_frames(&mut self, value: usize) -> &mut Self {
        self.n_frames = value;
        self
    }

    /// Get the total number of UMEM frames.
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Set the frame size.
    pub fn set_frame_size(&mut self, value: usize) -> &mut Self {
        self.frame_size = value;
        self
    }

    /// Get the frame size.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Get the frame headroom.
    pub fn frame_headroom(&self) -> usize {
        self.frame_headroom
    }

    /// Set the number of descriptors in the fill ring.
    pub fn set_fill_size(&mut self, value: usize) -> &mut Self {
        self.fill_size = value;
        self
    }

    /// Get the number of descriptors in the fill ring.
    pub fn fill_size(&self) -> usize {
        self.fill_size
    }

    /// Set the number of descriptors in the completion ring.
    pub fn set_comp_size(&mut self, value: usize) -> &mut Self {
        self.comp_size = value;
        self
    }

    /// Get the number of descriptors in the completion ring.
    pub fn comp_size(&self) -> usize {
        self.comp_size
    }

    /// Set the number of descriptors per RX ring.
    pub fn set_rx_size(&mut self, value: usize) -> &mut Self {
        self.rx_size = value;
        self
    }

    /// Get the number of descriptors per RX ring.
    pub fn rx_size(&self) -> usize {
        self.rx_size
    }

    /// Set the number of descriptors per TX ring.
    pub fn set_tx_size(&mut self, value: usize) -> &mut Self {
        self.tx_size = value;
        self
    }

    /// Get the number of descriptors per TX ring.
    pub fn tx_size(&self) -> usize {
        self.tx_size
    }

    /// Request huge pages for the UMEM mapping.
    pub fn set_huge_pages(&mut self, value: bool) -> &mut Self {
        self.huge_pages = value;
        self
    }

    /// Get whether huge pages are requested.
    pub fn huge_pages(&self) -> bool {
        self.huge_pages
    }

    /// Set the XSK mode of operation.
    pub fn set_mode(&mut self, value: XskMode) -> &mut Self {
        self.mode = value;
        self
    }

    /// Get the XSK mode of operation.
    pub fn mode(&self) -> XskMode {
        self.mode
    }

    /// Set the needs_wakeup behaviour.
    pub fn set_needs_wakeup(&mut self, value: NeedsWakeup) -> &mut Self {
        self.needs_wakeup = value;
        self
    }

    /// Get the needs_wakeup behaviour.
    pub fn needs_wakeup(&self) -> NeedsWakeup {
        self.needs_wakeup
    }

    /// Validate configuration.
    ///
    /// Checks every wiring constraint before any socket is created.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::InvalidConfig("no ports specified".to_string()));
        }

        if self.cores.is_empty() {
            return Err(Error::InvalidConfig("no worker cores specified".to_string()));
        }

        if self.ports.len() > MAX_PORTS {
            return Err(Error::InvalidConfig(format!(
                "too many ports (max {})",
                MAX_PORTS
            )));
        }

        if self.cores.len() > MAX_THREADS {
            return Err(Error::InvalidConfig(format!(
                "too many worker threads (max {})",
                MAX_THREADS
            )));
        }

        if self.ports.len() % self.cores.len() != 0 {
            return Err(Error::InvalidConfig(format!(
                "{} ports cannot be evenly distributed to {} threads",
                self.ports.len(),
                self.cores.len()
            )));
        }

        if self.ports.len() / self.cores.len() > MAX_PORTS_PER_THREAD {
            return Err(Error::InvalidConfig(format!(
                "more than {} ports per thread",
                MAX_PORTS_PER_THREAD
            )));
        }

        for (name, value) in [
            ("frame size", self.frame_size),
            ("fill ring size", self.fill_size),
            ("completion ring size", self.comp_size),
            ("rx ring size", self.rx_size),
            ("tx ring size", self.tx_size),
        ] {
            if !value.is_power_of_two() {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a power of two",
                    name
                )));
            }
        }

        if self.n_frames < self.fill_size {
            return Err(Error::InvalidConfig(
                "fewer UMEM frames than fill ring descriptors".to_string(),
            ));
        }

        Ok(())
    }
}

/// XSK mode of operation.
#[derive(Debug, Copy, Clone)]
pub enum XskMode {
    /// Skb mode.
    Skb,

    /// Driver mode.
    Drv,

    /// Zerocopy driver mode.
    DrvZeroCopy,
}

impl XskMode {
    /// Returns the representation of the XskMode object as XDP bind flags.
    pub fn into_bind_flags(self) -> u16 {
        match self {
            XskMode::Skb | XskMode::Drv => xsk::sys::XDP_COPY,
            XskMode::DrvZeroCopy => xsk::sys::XDP_ZEROCOPY,
        }
    }
}

impl FromStr for XskMode {
    type Err = Error;

    /// Creates a new XskMode object from a string.
    ///
    /// Possible values for the input string are `skb`, `drv` and `drv-zc`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use XskMode::*;

        match s {
            "skb" => Ok(Skb),
            "drv" => Ok(Drv),
            "drv-zc" => Ok(DrvZeroCopy),
            _ => Err(Error::InvalidXskMode),
        }
    }
}

/// Wrapper for the `XDP_USE_NEED_WAKEUP` flag.
#[derive(Debug, Copy, Clone)]
pub struct NeedsWakeup {
    #[allow(missing_docs)]
    pub value: bool,
}

impl NeedsWakeup {
    /// Creates a new NeedsWakeup object.
    pub fn new(value: bool) -> Self {
        NeedsWakeup { value }
    }

    /// Returns the representation of the NeedsWakeup object as XDP bind flags.
    pub fn into_bind_flags(self) -> u16 {
        if self.value {
            xsk::sys::XDP_USE_NEED_WAKEUP
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(n_ports: usize, n_cores: usize) -> Configuration {
        let mut cfg = Configuration::default();
        for i in 0..n_cores {
            cfg.add_core(i);
        }
        for i in 0..n_ports {
            cfg.add_port(format!("veth{}", i));
        }
        cfg
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_config(4, 2).validate().is_ok());
        assert!(base_config(1, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_uneven_distribution() {
        // 3 ports across 2 workers must be refused before any socket exists.
        assert!(base_config(3, 2).validate().is_err());
    }

    #[test]
    fn test_validate_empty() {
        assert!(base_config(0, 1).validate().is_err());
        assert!(base_config(1, 0).validate().is_err());
    }

    #[test]
    fn test_validate_ring_sizes() {
        let mut cfg = base_config(1, 1);
        cfg.set_rx_size(1000);
        assert!(cfg.validate().is_err());

        let mut cfg = base_config(1, 1);
        cfg.set_n_frames(1024).set_fill_size(4096);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_ports_per_thread_cap() {
        let mut cfg = base_config(MAX_PORTS_PER_THREAD + 1, 1);
        cfg.set_n_frames(1 << 20);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_queue_override_binds_to_last_port() {
        let mut cfg = Configuration::default();
        cfg.add_port("veth0");
        cfg.add_port("veth1");
        cfg.set_last_port_queue(3).unwrap();

        assert_eq!(cfg.ports()[0].queue, 0);
        assert_eq!(cfg.ports()[1].queue, 3);
    }

    #[test]
    fn test_queue_override_without_port() {
        let mut cfg = Configuration::default();
        assert!(cfg.set_last_port_queue(1).is_err());
    }

    #[test]
    fn test_mode_from_str() {
        assert!(XskMode::from_str("drv").is_ok());
        assert!(XskMode::from_str("drv-zc").is_ok());
        assert!(XskMode::from_str("skb").is_ok());
        assert!(XskMode::from_str("bogus").is_err());
    }
}
