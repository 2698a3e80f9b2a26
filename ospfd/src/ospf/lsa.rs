use std::net::Ipv4Addr;

use ospf_packet::*;

use super::ifsm::IfsmState;
use super::inst::Ospf;
use super::link::OspfLink;
use super::lsdb::{LsaKey, Lsdb, OSPF_MAX_AGE, is_maxage};
use crate::{ospf_event_trace, ospf_warn};

/// LSRefreshTime.
pub const OSPF_LS_REFRESH_TIME: u16 = 1800;

// E-bit: AS-external LSAs are flooded into every area we attach.
const OSPF_LSA_OPTIONS: u8 = 0x02;

/// Router-LSA links describing one interface.
pub fn router_lsa_links(link: &OspfLink) -> Vec<RouterLsaLink> {
    let cost = link.cost();
    let stub = RouterLsaLink::new(link.ident.prefix, cost);

    if link.state == IfsmState::Down {
        return vec![];
    }
    if link.is_passive() {
        return vec![stub];
    }
    match link.state {
        IfsmState::PointToPoint => {
            let mut links: Vec<RouterLsaLink> = link
                .full_nbrs()
                .map(|nbr| RouterLsaLink::p2p(nbr.ident.router_id, link.ident.addr(), cost))
                .collect();
            links.push(stub);
            links
        }
        IfsmState::Waiting => vec![stub],
        _ if !link.dr_reachable => vec![stub],
        _ => vec![RouterLsaLink::transit(
            link.ident.d_router,
            link.ident.addr(),
            cost,
        )],
    }
}

/// Network-LSA body for a segment where we are DR with at least one full
/// adjacency.
pub fn network_lsa_build(router_id: Ipv4Addr, link: &OspfLink) -> Option<NetworkLsa> {
    if link.state != IfsmState::DR || link.full_nbr_count == 0 {
        return None;
    }
    let mut attached_routers = vec![router_id];
    attached_routers.extend(link.full_nbrs().map(|nbr| nbr.ident.router_id));
    Some(NetworkLsa {
        netmask: link.ident.prefix.netmask(),
        attached_routers,
    })
}

impl Ospf {
    /// Sequence number for a new self-originated instance. `curr` is the
    /// sequence number of the instance being replaced.
    fn seqnum_next(&mut self, curr: Option<u32>) -> u32 {
        if let Some(curr) = curr {
            self.seqnum_advance(curr);
        }
        let seqnum = self.seqnum;
        self.seqnum = self.seqnum.wrapping_add(1);
        seqnum
    }

    fn seqnum_advance(&mut self, seen: u32) {
        let next = seen.wrapping_add(1);
        if (next as i32) > (self.seqnum as i32) {
            self.seqnum = next;
        }
    }

    fn lsdb_mut(&mut self, area_id: Ipv4Addr, ls_type: OspfLsType) -> &mut Lsdb {
        match ls_type {
            OspfLsType::AsExternal => &mut self.lsdb_as,
            _ => &mut self.areas.fetch(area_id).lsdb,
        }
    }

    pub fn lsa_is_self(&self, h: &OspfLsaHeader) -> bool {
        if h.adv_router == self.router_id {
            return true;
        }
        h.ls_type == OspfLsType::Network
            && self.links.values().any(|link| link.ident.addr() == h.ls_id)
    }

    pub fn router_lsa_build(&self, area_id: Ipv4Addr) -> RouterLsa {
        let mut lsa = RouterLsa::default();
        if self.areas.active_count() > 1 {
            lsa.flags |= ROUTER_LSA_FLAG_B;
        }
        for link in self.links.values() {
            if link.enabled && link.area_id == area_id {
                lsa.links.extend(router_lsa_links(link));
            }
        }
        lsa
    }

    // Install a new instance of a self-originated LSA unless the stored one
    // already carries the same body.
    fn lsa_update(
        &mut self,
        area_id: Ipv4Addr,
        ls_type: OspfLsType,
        ls_id: Ipv4Addr,
        mut lsp: OspfLsp,
        force: bool,
    ) {
        lsp.update();
        let key = LsaKey::new(ls_type, ls_id, self.router_id);
        let curr = self.lsdb_mut(area_id, ls_type).lookup(&key).map(|lsa| {
            let same = lsa.lsp == lsp && !is_maxage(&lsa.h);
            (lsa.h.ls_seq_number, same)
        });
        if let Some((_, true)) = curr {
            if !force {
                return;
            }
        }

        let mut h = OspfLsaHeader::new(ls_type, ls_id, self.router_id);
        h.options = OSPF_LSA_OPTIONS;
        h.ls_seq_number = self.seqnum_next(curr.map(|(seqnum, _)| seqnum));
        let mut lsa = OspfLsa::from(h, lsp);
        lsa.update();

        match self.lsdb_mut(area_id, ls_type).install(lsa) {
            Ok(Some(lsa)) => {
                ospf_event_trace!(
                    self.tracing,
                    LsaOriginate,
                    "Originate {} seq {:08x} in area {}",
                    key,
                    lsa.h.ls_seq_number,
                    area_id
                );
                self.lsa_install_notify(area_id, &lsa, None);
            }
            Ok(None) => {}
            Err(err) => ospf_warn!("Originate {}: {}", key, err),
        }
    }

    /// Premature aging: install a MaxAge copy and flood it.
    pub fn lsa_flush(&mut self, area_id: Ipv4Addr, key: &LsaKey) {
        let lsdb = self.lsdb_mut(area_id, key.ls_type());
        let Some(curr) = lsdb.lookup(key) else {
            return;
        };
        if is_maxage(&curr.h) {
            return;
        }
        let mut lsa = curr.clone();
        lsa.h.ls_age = OSPF_MAX_AGE;

        match lsdb.install(lsa) {
            Ok(Some(lsa)) => {
                ospf_event_trace!(self.tracing, LsaFlush, "Flush {} in area {}", key, area_id);
                self.lsa_install_notify(area_id, &lsa, None);
            }
            Ok(None) => {}
            Err(err) => ospf_warn!("Flush {}: {}", key, err),
        }
    }

    fn router_lsa_originate(&mut self, area_id: Ipv4Addr, force: bool) {
        let active = self
            .areas
            .get(&area_id)
            .is_some_and(|area| !area.links.is_empty());
        if active {
            let lsa = self.router_lsa_build(area_id);
            self.lsa_update(area_id, OspfLsType::Router, self.router_id, lsa.into(), force);
        } else {
            let key = LsaKey::new(OspfLsType::Router, self.router_id, self.router_id);
            self.lsa_flush(area_id, &key);
        }
    }

    fn network_lsa_originate(&mut self, force: bool) {
        let mut wanted = Vec::new();
        for link in self.links.values() {
            if !link.enabled {
                continue;
            }
            if let Some(lsa) = network_lsa_build(self.router_id, link) {
                wanted.push((link.area_id, link.ident.addr(), lsa));
            }
        }
        for (area_id, ls_id, lsa) in wanted.iter() {
            self.lsa_update(*area_id, OspfLsType::Network, *ls_id, lsa.clone().into(), force);
        }

        // Our network-LSAs for segments where we are no longer DR.
        let mut stale = Vec::new();
        for (area_id, area) in self.areas.iter() {
            for lsa in area.lsdb.iter_type(OspfLsType::Network) {
                if lsa.h.adv_router != self.router_id || is_maxage(&lsa.h) {
                    continue;
                }
                if !wanted
                    .iter()
                    .any(|(id, ls_id, _)| id == area_id && *ls_id == lsa.h.ls_id)
                {
                    stale.push((*area_id, LsaKey::from(&lsa.h)));
                }
            }
        }
        for (area_id, key) in stale {
            self.lsa_flush(area_id, &key);
        }
    }

    /// Bring every self-originated LSA in line with the current interface
    /// and adjacency state.
    pub fn lsa_originate(&mut self) {
        for link in self.links.values_mut() {
            link.dr_reachable_update();
        }
        let area_ids: Vec<Ipv4Addr> = self.areas.iter().map(|(area_id, _)| *area_id).collect();
        for area_id in area_ids {
            self.router_lsa_originate(area_id, false);
        }
        self.network_lsa_originate(false);
    }

    /// Re-originate self LSAs which reached LSRefreshTime.
    pub fn lsa_refresh(&mut self) {
        let mut refresh = Vec::new();
        for (area_id, area) in self.areas.iter() {
            for lsa in area.lsdb.db.values() {
                if lsa.h.adv_router == self.router_id
                    && !is_maxage(&lsa.h)
                    && lsa.h.ls_age >= OSPF_LS_REFRESH_TIME
                {
                    refresh.push((*area_id, lsa.h.ls_type, lsa.h.ls_id, lsa.lsp.clone()));
                }
            }
        }
        for (area_id, ls_type, ls_id, lsp) in refresh {
            self.lsa_update(area_id, ls_type, ls_id, lsp, true);
        }
    }

    /// A newer instance of one of our own LSAs arrived, typically from
    /// before a restart. Take the sequence number past it, then either
    /// originate a fresh instance or flush it.
    pub fn lsa_self_recv(&mut self, area_id: Ipv4Addr, lsa: &OspfLsa) {
        let key = LsaKey::from(&lsa.h);
        ospf_event_trace!(
            self.tracing,
            LsaOriginate,
            "Self-originated {} seq {:08x} received",
            key,
            lsa.h.ls_seq_number
        );
        self.seqnum_advance(lsa.h.ls_seq_number);

        if lsa.h.adv_router != self.router_id {
            self.lsa_flush(area_id, &key);
            return;
        }
        match lsa.h.ls_type {
            OspfLsType::Router if lsa.h.ls_id == self.router_id => {
                self.router_lsa_originate(area_id, true);
            }
            OspfLsType::Network => {
                let body = self
                    .links
                    .values()
                    .filter(|link| link.enabled && link.ident.addr() == lsa.h.ls_id)
                    .find_map(|link| network_lsa_build(self.router_id, link));
                match body {
                    Some(body) => self.lsa_update(
                        area_id,
                        OspfLsType::Network,
                        lsa.h.ls_id,
                        body.into(),
                        true,
                    ),
                    None => self.lsa_flush(area_id, &key),
                }
            }
            _ => self.lsa_flush(area_id, &key),
        }
    }
}
