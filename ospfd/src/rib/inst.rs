use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Route updates from the routing protocol.
#[derive(Debug)]
pub enum Message {
    Ipv4Add {
        prefix: Ipv4Net,
        nexthop: Ipv4Addr,
        metric: u32,
        ifindex: u32,
        ifname: String,
    },
    Ipv4Del {
        prefix: Ipv4Net,
    },
    Shutdown {
        tx: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RibEntry {
    pub nexthop: Ipv4Addr,
    pub metric: u32,
    pub ifindex: u32,
    pub ifname: String,
}

/// Route sink. Keeps the installed routes and logs every change; a kernel
/// FIB writer would hook in here.
pub struct Rib {
    pub tx: UnboundedSender<Message>,
    pub rx: UnboundedReceiver<Message>,
    pub table: BTreeMap<Ipv4Net, RibEntry>,
}

impl Rib {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            table: BTreeMap::new(),
        }
    }

    pub fn process_msg(&mut self, msg: Message) {
        match msg {
            Message::Ipv4Add {
                prefix,
                nexthop,
                metric,
                ifindex,
                ifname,
            } => {
                tracing::info!(
                    proto = "rib",
                    "Install {} via {} dev {} metric {}",
                    prefix,
                    nexthop,
                    ifname,
                    metric
                );
                let entry = RibEntry {
                    nexthop,
                    metric,
                    ifindex,
                    ifname,
                };
                self.table.insert(prefix, entry);
            }
            Message::Ipv4Del { prefix } => {
                if self.table.remove(&prefix).is_some() {
                    tracing::info!(proto = "rib", "Withdraw {}", prefix);
                }
            }
            Message::Shutdown { tx } => {
                tracing::info!(proto = "rib", "Shutdown with {} routes", self.table.len());
                let _ = tx.send(());
            }
        }
    }

    pub async fn event_loop(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.process_msg(msg);
        }
    }
}

impl Default for Rib {
    fn default() -> Self {
        Self::new()
    }
}

pub fn serve(mut rib: Rib) {
    tokio::spawn(async move {
        rib.event_loop().await;
    });
}
