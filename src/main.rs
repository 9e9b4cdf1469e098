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

use anyhow::Context;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use log::{error, info};
use simple_signal::Signal;

use libhairpin::{fwd, xsk};

#[derive(Parser)]
#[command(version, about = "AF_XDP MAC-swap packet forwarder")]
pub struct Args {
    /// CPU core to pin a forwarding worker to. May be repeated.
    #[arg(short = 'c', value_name = "CORE")]
    pub cores: Vec<usize>,

    /// Interface for a forwarding port. May be repeated.
    #[arg(short = 'i', value_name = "INTERFACE")]
    pub interfaces: Vec<String>,

    /// Queue index for the most recently specified interface (default 0).
    #[arg(short = 'q', value_name = "QUEUE")]
    pub queues: Vec<u32>,

    /// Sets the total number of UMEM frames
    #[arg(long = "n-frames")]
    pub n_frames: Option<usize>,

    /// Sets the frame size
    #[arg(long = "frame-size")]
    pub frame_size: Option<usize>,

    /// Sets the RX ring size
    #[arg(long = "rx-size")]
    pub rx_size: Option<usize>,

    /// Sets the TX ring size
    #[arg(long = "tx-size")]
    pub tx_size: Option<usize>,

    /// Sets the xsk mode of operation (skb, drv or drv-zc)
    #[arg(long = "xsk-mode")]
    pub xsk_mode: Option<xsk::XskMode>,

    /// Disable the XDP_USE_NEED_WAKEUP hint (kicks unconditionally)
    #[arg(long = "no-needs-wakeup")]
    pub no_needs_wakeup: bool,

    /// Back the UMEM with huge pages
    #[arg(long = "huge-pages")]
    pub huge_pages: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Args::command().get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let cfg = build_config(&args, &matches).unwrap_or_else(|err| {
        error!("{:#}", err);
        Args::command().print_help().ok();
        std::process::exit(1);
    });

    let mut supervisor = fwd::Supervisor::new(&cfg).unwrap_or_else(|err| {
        error!("{}", err);
        std::process::exit(1);
    });

    let runner = supervisor.runner();
    simple_signal::set_handler(&[Signal::Int, Signal::Term, Signal::Abrt], move |_signals| {
        runner.stop();
    });

    info!(
        "Forwarding across {} port(s) on {} worker(s)",
        cfg.ports().len(),
        cfg.cores().len()
    );

    supervisor.run();
}

fn build_config(args: &Args, matches: &ArgMatches) -> anyhow::Result<xsk::Configuration> {
    let mut cfg = xsk::Configuration::default();

    for &core in &args.cores {
        cfg.add_core(core);
    }

    let interface_indices: Vec<usize> = matches
        .indices_of("interfaces")
        .map(|indices| indices.collect())
        .unwrap_or_default();
    let queue_indices: Vec<usize> = matches
        .indices_of("queues")
        .map(|indices| indices.collect())
        .unwrap_or_default();

    let specs = pair_queues(
        &args.interfaces,
        &interface_indices,
        &args.queues,
        &queue_indices,
    )
    .context("cannot pair -q flags with -i flags")?;

    for spec in specs {
        cfg.add_port(&spec.interface);
        cfg.set_last_port_queue(spec.queue)?;
    }

    if let Some(v) = args.n_frames {
        cfg.set_n_frames(v);
    }

    if let Some(v) = args.frame_size {
        cfg.set_frame_size(v);
    }

    if let Some(v) = args.rx_size {
        cfg.set_rx_size(v);
    }

    if let Some(v) = args.tx_size {
        cfg.set_tx_size(v);
    }

    if let Some(v) = args.xsk_mode {
        cfg.set_mode(v);
    }

    cfg.set_needs_wakeup(xsk::NeedsWakeup::new(!args.no_needs_wakeup));
    cfg.set_huge_pages(args.huge_pages);

    Ok(cfg)
}

/// Resolves each `-q` against the most recently seen `-i`, using the argv
/// positions clap recorded for both flags.
fn pair_queues(
    interfaces: &[String],
    interface_indices: &[usize],
    queues: &[u32],
    queue_indices: &[usize],
) -> xsk::Result<Vec<xsk::PortSpec>> {
    let mut ports: Vec<xsk::PortSpec> = interfaces
        .iter()
        .map(|interface| xsk::PortSpec {
            interface: interface.clone(),
            queue: 0,
        })
        .collect();

    for (&queue, &queue_pos) in queues.iter().zip(queue_indices) {
        let n_before = interface_indices
            .iter()
            .take_while(|&&interface_pos| interface_pos < queue_pos)
            .count();

        if n_before == 0 {
            return Err(xsk::Error::InvalidConfig(
                "no port specified for queue".to_string(),
            ));
        }

        ports[n_before - 1].queue = queue;
    }

    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(args: &[(&str, usize)], queues: &[(u32, usize)]) -> xsk::Result<Vec<xsk::PortSpec>> {
        let interfaces: Vec<String> = args.iter().map(|(name, _)| name.to_string()).collect();
        let interface_indices: Vec<usize> = args.iter().map(|&(_, pos)| pos).collect();
        let queue_values: Vec<u32> = queues.iter().map(|&(queue, _)| queue).collect();
        let queue_indices: Vec<usize> = queues.iter().map(|&(_, pos)| pos).collect();

        pair_queues(&interfaces, &interface_indices, &queue_values, &queue_indices)
    }

    #[test]
    fn test_queue_binds_to_most_recent_interface() {
        // hpin -i veth0 -q 2 -i veth1
        let ports = specs(&[("veth0", 2), ("veth1", 6)], &[(2, 4)]).unwrap();

        assert_eq!(ports[0].queue, 2);
        assert_eq!(ports[1].queue, 0);
    }

    #[test]
    fn test_queue_overrides_stack() {
        // hpin -i veth0 -i veth1 -q 1 -q 3: both -q hit veth1, last wins.
        let ports = specs(&[("veth0", 2), ("veth1", 4)], &[(1, 6), (3, 8)]).unwrap();

        assert_eq!(ports[0].queue, 0);
        assert_eq!(ports[1].queue, 3);
    }

    #[test]
    fn test_queue_without_interface() {
        // hpin -q 1 -i veth0
        assert!(specs(&[("veth0", 4)], &[(1, 2)]).is_err());
    }

    #[test]
    fn test_cli_shape() {
        Args::command().debug_assert();
    }
}
