use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use ospf_packet::*;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::config::{InterfaceConfig, NetworkType, OspfConfig};
use crate::rib;
use crate::tasks::Timer;
use crate::{ospf_database_trace, ospf_debug, ospf_event_trace, ospf_info, ospf_warn};

use super::area::OspfAreaMap;
use super::error::OspfError;
use super::flood::{
    ospf_ls_ack_recv, ospf_ls_ack_send, ospf_ls_req_recv, ospf_ls_req_send, ospf_ls_rxmt_send,
    ospf_ls_upd_recv, ospf_ls_upd_send,
};
use super::ident::Identity;
use super::ifsm::{IfsmEvent, IfsmState, ospf_ifsm};
use super::link::OspfLink;
use super::lsdb::{LsaKey, Lsdb};
use super::neigh::Neighbor;
use super::network::ALL_D_ROUTERS;
use super::nfsm::{NfsmEvent, NfsmState, ospf_nfsm};
use super::packet::{
    ospf_db_desc_recv, ospf_db_desc_resend, ospf_hello_recv, ospf_hello_send, ospf_hello_validate,
};
use super::route::{RouteTable, diff, diff_apply, route_from_vertices, route_merge};
use super::spf::{SpfInput, SpfLink, ospf_spf_calc};
use super::tracing::OspfTracing;

pub type ShowCallback = fn(&Ospf, bool) -> Result<String, std::fmt::Error>;

/// InitialSequenceNumber.
pub const OSPF_INITIAL_SEQNUM: u32 = 0x80000001;

pub struct Ospf {
    pub tx: UnboundedSender<Message>,
    pub rx: UnboundedReceiver<Message>,
    pub ptx: UnboundedSender<Message>,
    pub rib_tx: UnboundedSender<rib::Message>,
    pub links: BTreeMap<u32, OspfLink>,
    pub areas: OspfAreaMap,
    pub router_id: Ipv4Addr,
    pub lsdb_as: Lsdb,
    pub table: RouteTable,
    pub seqnum: u32,
    pub spf_interval: u64,
    pub list_max: usize,
    pub tracing: OspfTracing,
    pub show_cb: HashMap<String, ShowCallback>,
}

// OSPF inteface structure which points out upper layer struct members.
pub struct OspfInterface<'a> {
    pub tx: &'a UnboundedSender<Message>,
    pub ptx: &'a UnboundedSender<Message>,
    pub router_id: &'a Ipv4Addr,
    pub ifindex: u32,
    pub name: &'a str,
    pub area_id: Ipv4Addr,
    pub ident: &'a Identity,
    pub state: IfsmState,
    pub mtu: u16,
    pub config: &'a InterfaceConfig,
    pub db_desc_in: &'a mut usize,
    pub lsdb: &'a mut Lsdb,
    pub lsdb_as: &'a mut Lsdb,
    pub tracing: &'a OspfTracing,
}

impl OspfInterface<'_> {
    pub fn is_pointopoint(&self) -> bool {
        self.config.network_type == NetworkType::PointToPoint
    }

    pub fn lsa_lookup(&self, key: &LsaKey) -> Option<&OspfLsa> {
        match key.ls_type() {
            OspfLsType::AsExternal => self.lsdb_as.lookup(key),
            _ => self.lsdb.lookup(key),
        }
    }

    pub fn lsdb_get_mut(&mut self, ls_type: OspfLsType) -> &mut Lsdb {
        match ls_type {
            OspfLsType::AsExternal => &mut *self.lsdb_as,
            _ => &mut *self.lsdb,
        }
    }

    pub fn packet(&self, payload: Ospfv2Payload) -> Ospfv2Packet {
        Ospfv2Packet::new(self.router_id, &self.area_id, payload)
    }

    pub fn send(&self, packet: Ospfv2Packet, dest: Option<Ipv4Addr>) {
        let _ = self.ptx.send(Message::Send(packet, self.ifindex, dest));
    }
}

impl Ospf {
    pub fn ospf_interface<'a>(
        &'a mut self,
        ifindex: u32,
        src: &Ipv4Addr,
    ) -> Option<(OspfInterface<'a>, &'a mut Neighbor)> {
        let Some(link) = self.links.get_mut(&ifindex) else {
            ospf_warn!("{}", OspfError::UnknownInterface(ifindex.to_string()));
            return None;
        };
        let Some(area) = self.areas.get_mut(&link.area_id) else {
            ospf_warn!("{}", OspfError::AreaNotFound(link.area_id));
            return None;
        };
        let Some(nbr) = link.nbrs.get_mut(src) else {
            ospf_debug!("No neighbor {} on {}", src, link.name);
            return None;
        };
        Some((
            OspfInterface {
                tx: &self.tx,
                ptx: &self.ptx,
                router_id: &self.router_id,
                ifindex,
                name: &link.name,
                area_id: link.area_id,
                ident: &link.ident,
                state: link.state,
                mtu: link.mtu,
                config: &link.config,
                db_desc_in: &mut link.db_desc_in,
                lsdb: &mut area.lsdb,
                lsdb_as: &mut self.lsdb_as,
                tracing: &self.tracing,
            },
            nbr,
        ))
    }

    pub fn new(
        config: &OspfConfig,
        ptx: UnboundedSender<Message>,
        rib_tx: UnboundedSender<rib::Message>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let router_id = config.router_id();
        let mut ospf = Self {
            tx,
            rx,
            ptx,
            rib_tx,
            links: BTreeMap::new(),
            areas: OspfAreaMap::new(config.lsdb_capacity),
            router_id,
            lsdb_as: Lsdb::new(config.lsdb_capacity),
            table: RouteTable::new(),
            seqnum: OSPF_INITIAL_SEQNUM,
            spf_interval: config.spf_interval,
            list_max: config.list_capacity,
            tracing: OspfTracing::from(&config.tracing),
            show_cb: HashMap::new(),
        };
        ospf.show_build();

        for (pos, ifc) in config.interfaces.iter().enumerate() {
            let ifindex = ifc.ifindex.unwrap_or(pos as u32 + 1);
            let link = OspfLink::from(
                ifc,
                ifindex,
                router_id,
                ospf.tx.clone(),
                ospf.ptx.clone(),
            );
            ospf.links.insert(ifindex, link);
            let _ = ospf.tx.send(Message::Enable(ifindex));
        }
        ospf_info!(
            "OSPF router {} with {} interfaces",
            router_id,
            ospf.links.len()
        );
        ospf
    }

    fn link_enable(&mut self, ifindex: u32) {
        let Some(link) = self.links.get_mut(&ifindex) else {
            ospf_warn!("{}", OspfError::UnknownInterface(ifindex.to_string()));
            return;
        };
        if link.enabled {
            return;
        }
        link.enabled = true;
        self.areas.fetch(link.area_id).links.insert(ifindex);
        ospf_info!("Interface {} up in area {}", link.name, link.area_id);
        ospf_ifsm(link, IfsmEvent::InterfaceUp, &self.tracing);
    }

    fn link_disable(&mut self, ifindex: u32) {
        let Some(link) = self.links.get(&ifindex) else {
            ospf_warn!("{}", OspfError::UnknownInterface(ifindex.to_string()));
            return;
        };
        if !link.enabled {
            return;
        }
        let nbrs: Vec<Ipv4Addr> = link.nbrs.keys().copied().collect();
        for addr in nbrs {
            if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &addr) {
                ospf_nfsm(&mut oi, nbr, NfsmEvent::KillNbr);
            }
        }
        let Some(link) = self.links.get_mut(&ifindex) else {
            return;
        };
        ospf_ifsm(link, IfsmEvent::InterfaceDown, &self.tracing);
        link.enabled = false;
        if let Some(area) = self.areas.get_mut(&link.area_id) {
            area.links.remove(&ifindex);
        }
        ospf_info!("Interface {} down", link.name);
    }

    fn hello_recv(&mut self, ifindex: u32, src: Ipv4Addr, router_id: Ipv4Addr, hello: &OspfHello) {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return;
        };
        if !ospf_hello_validate(link, hello, &src, &self.tracing) {
            return;
        }
        let mut init = false;
        if !link.nbrs.contains_key(&src) {
            let prefix = if link.is_pointopoint() {
                Ipv4Net::from(src)
            } else {
                Ipv4Net::new(src, link.ident.prefix.prefix_len()).unwrap_or(Ipv4Net::from(src))
            };
            ospf_debug!("New neighbor {} ({}) on {}", router_id, src, link.name);
            let nbr = Neighbor::new(ifindex, prefix, &router_id, self.list_max);
            link.nbrs.insert(src, nbr);
            init = true;
        }
        let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) else {
            return;
        };
        ospf_hello_recv(&mut oi, nbr, &router_id, hello, init);
    }

    fn ls_upd_recv(&mut self, ifindex: u32, src: Ipv4Addr, upd: &OspfLsUpdate) {
        let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) else {
            return;
        };
        let area_id = oi.area_id;
        let accepted = ospf_ls_upd_recv(&mut oi, nbr, upd);
        for lsa in accepted {
            if self.lsa_is_self(&lsa.h) {
                self.lsa_self_recv(area_id, &lsa);
            } else {
                self.lsa_install_notify(area_id, &lsa, Some((ifindex, src)));
            }
        }
    }

    pub fn process_recv(&mut self, packet: Ospfv2Packet, src: Ipv4Addr, ifindex: u32, dest: Ipv4Addr) {
        let Some(link) = self.links.get(&ifindex) else {
            ospf_warn!(
                "Packet from {}: {}",
                src,
                OspfError::UnknownInterface(ifindex.to_string())
            );
            return;
        };
        if !link.enabled {
            return;
        }
        if packet.area_id != link.area_id {
            ospf_debug!(
                "Packet from {} on {}: area {} mismatch",
                src,
                link.name,
                packet.area_id
            );
            return;
        }
        if packet.router_id == self.router_id {
            return;
        }
        if dest == ALL_D_ROUTERS && !matches!(link.state, IfsmState::DR | IfsmState::Backup) {
            return;
        }
        let router_id = packet.router_id;

        match packet.payload {
            Ospfv2Payload::Hello(ref hello) => {
                self.hello_recv(ifindex, src, router_id, hello);
            }
            Ospfv2Payload::DbDesc(ref dd) => {
                let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) else {
                    return;
                };
                ospf_db_desc_recv(&mut oi, nbr, dd);
            }
            Ospfv2Payload::LsRequest(ref req) => {
                let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) else {
                    return;
                };
                if nbr.state < NfsmState::Exchange {
                    return;
                }
                ospf_ls_req_recv(&mut oi, nbr, req);
            }
            Ospfv2Payload::LsUpdate(ref upd) => {
                self.ls_upd_recv(ifindex, src, upd);
            }
            Ospfv2Payload::LsAck(ref ack) => {
                let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) else {
                    return;
                };
                if nbr.state < NfsmState::Exchange {
                    return;
                }
                ospf_ls_ack_recv(&mut oi, nbr, ack);
            }
            Ospfv2Payload::Unknown(_) => {
                ospf_debug!("Unknown packet type {} from {}", packet.typ, src);
            }
        }
    }

    pub fn process_msg(&mut self, msg: Message) {
        match msg {
            Message::Enable(ifindex) => {
                self.link_enable(ifindex);
            }
            Message::Disable(ifindex) => {
                self.link_disable(ifindex);
            }
            Message::Recv(packet, src, ifindex, dest) => {
                self.process_recv(packet, src, ifindex, dest);
            }
            Message::Ifsm(ifindex, ev) => {
                let Some(link) = self.links.get_mut(&ifindex) else {
                    return;
                };
                if link.enabled {
                    ospf_ifsm(link, ev, &self.tracing);
                }
            }
            Message::Nfsm(ifindex, src, ev) => {
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) {
                    ospf_nfsm(&mut oi, nbr, ev);
                }
                self.nbr_gc();
            }
            Message::LsaOriginate => {
                self.lsa_originate();
            }
            Message::Tick => {
                self.tick();
            }
            Message::Spf => {
                self.spf_run();
            }
            Message::Send(..) => {
                // Transport side only.
            }
            Message::Show(path, json, resp) => {
                let output = match self.show_cb.get(&path).copied() {
                    Some(f) => f(self, json)
                        .unwrap_or_else(|e| format!("Error formatting output: {}", e)),
                    None => format!("% Unknown command: {}", path),
                };
                let _ = resp.send(output);
            }
        }
    }

    /// Drain and process every queued message.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.process_msg(msg);
            count += 1;
        }
        count
    }

    // Drop neighbors whose state machine went back to Down.
    fn nbr_gc(&mut self) {
        for link in self.links.values_mut() {
            link.nbrs.retain(|_, nbr| nbr.state != NfsmState::Down);
        }
    }

    fn link_tick(&mut self) {
        for link in self.links.values_mut() {
            if !link.enabled || link.state == IfsmState::Down {
                continue;
            }
            link.timer.hello += 1;
            if !link.is_passive() && link.timer.hello >= link.hello_interval() as u32 {
                ospf_hello_send(link);
            }
            if link.state == IfsmState::Waiting {
                link.timer.wait += 1;
                if link.timer.wait >= link.dead_interval() {
                    ospf_ifsm(link, IfsmEvent::WaitTimer, &self.tracing);
                }
            }
        }
    }

    fn nbr_tick(&mut self, ifindex: u32, addr: Ipv4Addr) {
        use NfsmState::*;

        let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &addr) else {
            return;
        };
        let rxmt = oi.config.retransmit_interval as u32;

        nbr.timer.inactivity += 1;
        if nbr.timer.inactivity >= oi.config.dead_interval {
            ospf_info!(
                "Neighbor {} on {} is dead",
                nbr.ident.router_id,
                oi.name
            );
            ospf_nfsm(&mut oi, nbr, NfsmEvent::InactivityTimer);
            return;
        }

        // DD retransmission: ExStart on both sides, Exchange by the master.
        if nbr.state == ExStart || (nbr.state == Exchange && nbr.is_master()) {
            nbr.timer.db_desc += 1;
            if nbr.timer.db_desc >= rxmt {
                ospf_db_desc_resend(&mut oi, nbr);
            }
        }
        if nbr.state == Loading && !nbr.ls_req.is_empty() {
            nbr.timer.ls_req += 1;
            if nbr.timer.ls_req >= rxmt {
                ospf_ls_req_send(&mut oi, nbr);
            }
        }
        if nbr.state >= Exchange {
            ospf_ls_upd_send(&mut oi, nbr);
            if !nbr.ls_rxmt.is_empty() {
                nbr.timer.ls_rxmt += 1;
                if nbr.timer.ls_rxmt >= rxmt {
                    ospf_ls_rxmt_send(&mut oi, nbr);
                }
            }
            ospf_ls_ack_send(&mut oi, nbr);
        }
    }

    fn lsdb_tick(&mut self) {
        let mut expired = Vec::new();
        for (area_id, area) in self.areas.iter_mut() {
            for key in area.lsdb.age(1) {
                if let Some(lsa) = area.lsdb.lookup(&key) {
                    expired.push((*area_id, lsa.clone()));
                }
            }
        }
        for key in self.lsdb_as.age(1) {
            if let Some(lsa) = self.lsdb_as.lookup(&key) {
                expired.push((Ipv4Addr::UNSPECIFIED, lsa.clone()));
            }
        }
        for (area_id, lsa) in expired.iter() {
            ospf_database_trace!(self.tracing, Lsdb, "MaxAge {}", LsaKey::from(&lsa.h));
            self.lsa_install_notify(*area_id, lsa, None);
        }

        self.lsa_refresh();

        let in_use = self.ls_rxmt_in_use();
        for (area_id, area) in self.areas.iter_mut() {
            for key in area.lsdb.maxage_remove(&in_use) {
                ospf_database_trace!(self.tracing, Lsdb, "Purge {} from area {}", key, area_id);
            }
        }
        for key in self.lsdb_as.maxage_remove(&in_use) {
            ospf_database_trace!(self.tracing, Lsdb, "Purge {}", key);
        }
    }

    /// One second worth of protocol timers.
    pub fn tick(&mut self) {
        self.link_tick();

        let nbrs: Vec<(u32, Ipv4Addr)> = self
            .links
            .iter()
            .filter(|(_, link)| link.enabled)
            .flat_map(|(ifindex, link)| link.nbrs.keys().map(move |addr| (*ifindex, *addr)))
            .collect();
        for (ifindex, addr) in nbrs {
            self.nbr_tick(ifindex, addr);
        }
        self.nbr_gc();

        self.lsdb_tick();
    }

    fn spf_links(&self, area_id: Ipv4Addr) -> Vec<SpfLink> {
        self.links
            .values()
            .filter(|link| link.enabled && link.area_id == area_id)
            .map(|link| SpfLink {
                ifindex: link.index,
                prefix: link.ident.prefix,
                nbrs: link
                    .nbrs
                    .values()
                    .map(|nbr| (nbr.ident.router_id, nbr.addr()))
                    .collect(),
            })
            .collect()
    }

    /// Re-originate self LSAs, run SPF in every area and push the route
    /// delta to the RIB.
    pub fn spf_run(&mut self) {
        self.lsa_originate();

        ospf_event_trace!(self.tracing, SpfCalculation, "SPF run for {} areas", self.areas.len());

        let area_ids: Vec<Ipv4Addr> = self.areas.iter().map(|(id, _)| *id).collect();
        for area_id in area_ids {
            let links = self.spf_links(area_id);
            let Some(area) = self.areas.get(&area_id) else {
                continue;
            };
            let input = SpfInput {
                router_id: self.router_id,
                lsdb: &area.lsdb,
                lsdb_as: &self.lsdb_as,
                links,
            };
            let vertices = ospf_spf_calc(&input);
            ospf_database_trace!(
                self.tracing,
                SpfTree,
                "Area {}: {} vertices",
                area_id,
                vertices.len()
            );
            if let Some(area) = self.areas.get_mut(&area_id) {
                area.vertices = vertices;
            }
        }

        let mut next = RouteTable::new();
        for (area_id, area) in self.areas.iter() {
            let ifname = |ifindex: u32| self.links.get(&ifindex).map(|link| link.name.clone());
            for route in route_from_vertices(*area_id, &area.vertices, ifname) {
                route_merge(&mut next, route);
            }
        }

        let diff = diff(&self.table, &next);
        for (prefix, route) in diff.only_next.iter() {
            ospf_database_trace!(self.tracing, Route, "Add {} cost {} via {}", prefix, route.cost, route.nexthop);
        }
        for (prefix, _) in diff.only_curr.iter() {
            ospf_database_trace!(self.tracing, Route, "Withdraw {}", prefix);
        }
        diff_apply(&self.rib_tx, &diff);
        self.table = next;
    }

    pub async fn event_loop(&mut self) {
        let tx = self.tx.clone();
        let _tick = Timer::repeat(1, move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Message::Tick);
            }
        });
        let tx = self.tx.clone();
        let _spf = Timer::repeat(self.spf_interval, move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Message::Spf);
            }
        });

        while let Some(msg) = self.rx.recv().await {
            self.process_msg(msg);
        }
    }
}

pub fn serve(mut ospf: Ospf) {
    tokio::spawn(async move {
        ospf.event_loop().await;
    });
}

#[derive(Debug)]
pub enum Message {
    Enable(u32),
    Disable(u32),
    Ifsm(u32, IfsmEvent),
    Nfsm(u32, Ipv4Addr, NfsmEvent),
    LsaOriginate,
    /// Packet, source address, ifindex and destination address.
    Recv(Ospfv2Packet, Ipv4Addr, u32, Ipv4Addr),
    /// Packet, ifindex and destination. `None` is AllSPFRouters.
    Send(Ospfv2Packet, u32, Option<Ipv4Addr>),
    Tick,
    Spf,
    Show(String, bool, oneshot::Sender<String>),
}
