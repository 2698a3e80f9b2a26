use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use bitfield_struct::bitfield;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{InterfaceConfig, NetworkType};

use super::ident::Identity;
use super::ifsm::IfsmState;
use super::inst::Message;
use super::neigh::Neighbor;
use super::nfsm::NfsmState;

pub struct OspfLink {
    pub index: u32,
    pub name: String,
    pub mtu: u16,
    pub enabled: bool,
    pub area_id: Ipv4Addr,
    pub state: IfsmState,
    pub ostate: IfsmState,
    pub ident: Identity,
    pub config: InterfaceConfig,
    pub tx: UnboundedSender<Message>,
    pub ptx: UnboundedSender<Message>,
    pub nbrs: BTreeMap<Ipv4Addr, Neighbor>,
    pub flags: OspfLinkFlags,
    pub timer: LinkTimer,
    pub state_change: usize,
    pub db_desc_in: usize,
    pub full_nbr_count: usize,
    pub dr_reachable: bool,
}

#[derive(Debug, Default)]
pub struct LinkTimer {
    pub hello: u32,
    pub wait: u32,
}

impl OspfLink {
    pub fn from(
        config: &InterfaceConfig,
        index: u32,
        router_id: Ipv4Addr,
        tx: UnboundedSender<Message>,
        ptx: UnboundedSender<Message>,
    ) -> Self {
        let mut ident = Identity::new(router_id);
        ident.prefix = config.address;
        ident.priority = config.priority;
        Self {
            index,
            name: config.name.clone(),
            mtu: config.mtu,
            enabled: false,
            area_id: config.area,
            state: IfsmState::Down,
            ostate: IfsmState::Down,
            ident,
            config: config.clone(),
            tx,
            ptx,
            nbrs: BTreeMap::new(),
            flags: OspfLinkFlags::new(),
            timer: LinkTimer::default(),
            state_change: 0,
            db_desc_in: 0,
            full_nbr_count: 0,
            dr_reachable: false,
        }
    }

    pub fn is_passive(&self) -> bool {
        self.config.passive
    }

    pub fn is_pointopoint(&self) -> bool {
        self.config.network_type == NetworkType::PointToPoint
    }

    pub fn hello_interval(&self) -> u16 {
        self.config.hello_interval
    }

    pub fn dead_interval(&self) -> u32 {
        self.config.dead_interval
    }

    pub fn cost(&self) -> u16 {
        self.config.cost
    }

    pub fn full_nbrs(&self) -> impl Iterator<Item = &Neighbor> {
        self.nbrs.values().filter(|nbr| nbr.state == NfsmState::Full)
    }

    /// True when we are fully adjacent to the DR of this segment, or are
    /// the DR with at least one full adjacency.
    pub fn is_dr_reachable(&self) -> bool {
        if self.state == IfsmState::DR {
            return self.full_nbrs().next().is_some();
        }
        self.nbrs
            .values()
            .any(|nbr| nbr.addr() == self.ident.d_router && nbr.state == NfsmState::Full)
    }

    pub fn dr_reachable_update(&mut self) {
        self.full_nbr_count = self.full_nbrs().count();
        self.dr_reachable = self.is_dr_reachable();
    }

    pub fn event(&self, msg: Message) {
        let _ = self.tx.send(msg);
    }
}

#[bitfield(u8, debug = true)]
pub struct OspfLinkFlags {
    pub hello_sent: bool,
    #[bits(7)]
    pub resvd: u8,
}
