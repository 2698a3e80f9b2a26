// SPDX-License-Identifier: GPL-3.0-or-later

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, oneshot};

use ospfd::config::OspfConfig;
use ospfd::logging::{LogFormat, tracing_set};
use ospfd::ospf::network::{read_packet, write_packet};
use ospfd::ospf::socket::{ospf_join_if, ospf_socket_ipv4};
use ospfd::ospf::{self, Ospf};
use ospfd::rib::{self, Rib};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Arg {
    #[arg(short, long, help = "Configuration file (YAML)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Log filter, overrides RUST_LOG (e.g. info, ospfd=debug)")]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Terminal, help = "Log output format")]
    log_format: LogFormat,

    #[arg(long, help = "Router ID, overrides the configuration file")]
    router_id: Option<Ipv4Addr>,
}

const SHOW_ON_EXIT: [&str; 4] = [
    "/show/ip/ospf/interface",
    "/show/ip/ospf/neighbor",
    "/show/ip/ospf/database",
    "/show/ip/ospf/route",
];

fn config_load(arg: &Arg) -> Result<OspfConfig> {
    let mut config = match &arg.config {
        Some(path) => OspfConfig::load(path)?,
        None => OspfConfig::default(),
    };
    if arg.router_id.is_some() {
        config.router_id = arg.router_id;
    }
    for ifc in config.interfaces.iter_mut() {
        if ifc.ifindex.is_none() {
            let ifindex = nix::net::if_::if_nametoindex(ifc.name.as_str())
                .with_context(|| format!("Unknown interface {}", ifc.name))?;
            ifc.ifindex = Some(ifindex);
        }
    }
    Ok(config)
}

async fn show(tx: &mpsc::UnboundedSender<ospf::Message>, path: &str) -> Option<String> {
    let (otx, orx) = oneshot::channel();
    tx.send(ospf::Message::Show(path.to_string(), false, otx)).ok()?;
    orx.await.ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    let arg = Arg::parse();

    tracing_set(arg.log_format, arg.log_level.as_deref())?;

    let config = config_load(&arg)?;
    tracing::info!(
        proto = "ospf",
        "Router ID {} with {} interfaces",
        config.router_id(),
        config.interfaces.len()
    );

    let socket = ospf_socket_ipv4().context("Failed to open OSPF raw socket")?;
    for ifc in config.interfaces.iter() {
        if let Some(ifindex) = ifc.ifindex {
            ospf_join_if(&socket, ifindex)
                .with_context(|| format!("Failed to join multicast groups on {}", ifc.name))?;
        }
    }
    let sock = Arc::new(AsyncFd::new(socket)?);

    let rib = Rib::new();
    let rib_tx = rib.tx.clone();
    rib::serve(rib);

    let (ptx, prx) = mpsc::unbounded_channel();
    let ospf = Ospf::new(&config, ptx, rib_tx.clone());
    let tx = ospf.tx.clone();
    ospf::serve(ospf);

    tokio::spawn(read_packet(sock.clone(), tx.clone()));
    tokio::spawn(write_packet(sock, prx, tx.clone()));

    tokio::signal::ctrl_c().await?;

    for path in SHOW_ON_EXIT {
        if let Some(output) = show(&tx, path).await {
            println!("{output}");
        }
    }

    // Take interfaces down so neighbors are killed and own LSAs updated.
    for ifindex in config.interfaces.iter().filter_map(|ifc| ifc.ifindex) {
        let _ = tx.send(ospf::Message::Disable(ifindex));
    }
    if let Some(output) = show(&tx, "/show/ip/ospf").await {
        tracing::info!(proto = "ospf", "Interfaces down\n{}", output);
    }

    let (stx, srx) = oneshot::channel();
    if rib_tx.send(rib::Message::Shutdown { tx: stx }).is_ok() {
        let _ = srx.await;
    }

    Ok(())
}
