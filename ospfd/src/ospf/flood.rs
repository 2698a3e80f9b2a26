use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ospf_packet::{
    OSPF_HEADER_LEN, OSPF_LSA_HEADER_LEN, OspfLsAck, OspfLsRequest, OspfLsRequestEntry,
    OspfLsType, OspfLsUpdate, OspfLsa, Ospfv2Packet, Ospfv2Payload,
};

use super::ifsm::IfsmState;
use super::inst::{Message, Ospf, OspfInterface};
use super::lsdb::{LsaKey, OSPF_MAX_AGE, is_maxage, lsa_compare};
use super::neigh::Neighbor;
use super::network::ALL_D_ROUTERS;
use super::nfsm::{NfsmEvent, NfsmState, ospf_nfsm};
use super::packet::{IPV4_HEADER_LEN, lsa_type_valid};
use crate::{
    ospf_database_trace, ospf_debug, ospf_event_trace, ospf_pdu_handler, ospf_pkt_trace,
    ospf_warn,
};

// LS request entry: type, link state ID and advertising router.
const LS_REQ_ENTRY_LEN: usize = 12;

// LSU fixed part: number of advertisements.
const LS_UPD_FIXED_LEN: usize = 4;

// Transmission delay added to the age of every LSA sent.
const INF_TRANS_DELAY: u16 = 1;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FloodScope {
    Area,
    As,
    Link,
    Unknown,
}

pub fn lsa_flood_scope(ls_type: OspfLsType) -> FloodScope {
    use OspfLsType::*;
    match ls_type {
        Router => FloodScope::Area,
        Network => FloodScope::Area,
        Summary => FloodScope::Area,
        SummaryAsbr => FloodScope::Area,
        AsExternal => FloodScope::As,
        NssaAsExternal => FloodScope::Area,
        OpaqueLinkLocal => FloodScope::Link,
        OpaqueAreaLocal => FloodScope::Area,
        OpaqueAsWide => FloodScope::As,
        Unknown(_) => FloodScope::Unknown,
    }
}

fn payload_room(mtu: u16) -> usize {
    (mtu as usize).saturating_sub(IPV4_HEADER_LEN + OSPF_HEADER_LEN)
}

fn lsa_for_send(lsa: &OspfLsa) -> OspfLsa {
    let mut lsa = lsa.clone();
    lsa.h.ls_age = lsa
        .h
        .ls_age
        .saturating_add(INF_TRANS_DELAY)
        .min(OSPF_MAX_AGE);
    lsa
}

/// Pack LSAs into one update as long as they fit the MTU. At least one LSA
/// is always taken.
fn lsa_pack<'a>(lsas: impl Iterator<Item = &'a OspfLsa>, mtu: u16) -> Vec<OspfLsa> {
    let room = payload_room(mtu).saturating_sub(LS_UPD_FIXED_LEN);
    let mut len = 0;
    let mut packed = Vec::new();
    for lsa in lsas {
        let lsa_len = lsa.h.length as usize;
        if !packed.is_empty() && len + lsa_len > room {
            break;
        }
        len += lsa_len;
        packed.push(lsa_for_send(lsa));
    }
    packed
}

pub fn ospf_ls_req_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    ospf_pdu_handler!(LsRequest, Send);

    let max = (payload_room(oi.mtu) / LS_REQ_ENTRY_LEN).max(1);
    let reqs: Vec<OspfLsRequestEntry> = nbr
        .ls_req
        .iter()
        .take(max)
        .map(|h| OspfLsRequestEntry::new(h.ls_type, h.ls_id, h.adv_router))
        .collect();
    nbr.timer.ls_req = 0;
    if reqs.is_empty() {
        return;
    }
    ospf_pkt_trace!(
        oi.tracing,
        "[LSRequest] send {} entries to {} on {}",
        reqs.len(),
        nbr.ident.router_id,
        oi.name
    );
    let packet = oi.packet(Ospfv2Payload::LsRequest(OspfLsRequest { reqs }));
    oi.send(packet, Some(nbr.addr()));
}

pub fn ospf_ls_req_recv(oi: &mut OspfInterface, nbr: &mut Neighbor, req: &OspfLsRequest) {
    ospf_pdu_handler!(LsRequest, Recv);
    ospf_pkt_trace!(
        oi.tracing,
        "[LSRequest] recv {} entries from {} on {}",
        req.reqs.len(),
        nbr.ident.router_id,
        oi.name
    );

    if nbr.state < NfsmState::Exchange {
        return;
    }
    for entry in req.reqs.iter() {
        let key = LsaKey::from(entry);
        if oi.lsa_lookup(&key).is_none() {
            ospf_debug!("LS request from {} for unknown {}", nbr.ident.router_id, key);
            ospf_nfsm(oi, nbr, NfsmEvent::BadLSReq);
            return;
        }
        if let Err(err) = nbr.ls_upd_add(key) {
            ospf_warn!("Neighbor {}: {}", nbr.ident.router_id, err);
            break;
        }
    }
    ospf_ls_upd_send(oi, nbr);
}

/// Answer the update backlog with one packet. Identities which do not fit
/// stay queued.
pub fn ospf_ls_upd_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    ospf_pdu_handler!(LsUpdate, Send);

    if nbr.ls_upd.is_empty() {
        return;
    }
    let found: Vec<&OspfLsa> = nbr
        .ls_upd
        .iter()
        .filter_map(|key| oi.lsa_lookup(key))
        .collect();
    let lsas = lsa_pack(found.into_iter(), oi.mtu);

    // Drop what was sent and what has vanished from the database.
    let sent: BTreeSet<LsaKey> = lsas.iter().map(|lsa| LsaKey::from(&lsa.h)).collect();
    let lsdb_has = |key: &LsaKey| oi.lsa_lookup(key).is_some();
    nbr.ls_upd.retain(|key| !sent.contains(key) && lsdb_has(key));

    if lsas.is_empty() {
        return;
    }
    ospf_pkt_trace!(
        oi.tracing,
        "[LSUpdate] send {} LSAs to {} on {}",
        lsas.len(),
        nbr.ident.router_id,
        oi.name
    );
    let packet = oi.packet(Ospfv2Payload::LsUpdate(OspfLsUpdate::new(lsas)));
    oi.send(packet, Some(nbr.addr()));
}

/// Resend unacknowledged LSAs to the neighbor.
pub fn ospf_ls_rxmt_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    ospf_pdu_handler!(LsUpdate, Send);

    nbr.timer.ls_rxmt = 0;
    if nbr.ls_rxmt.is_empty() {
        return;
    }
    let lsas = lsa_pack(nbr.ls_rxmt.iter(), oi.mtu);
    ospf_pkt_trace!(
        oi.tracing,
        "[LSUpdate] retransmit {} LSAs to {} on {}",
        lsas.len(),
        nbr.ident.router_id,
        oi.name
    );
    let packet = oi.packet(Ospfv2Payload::LsUpdate(OspfLsUpdate::new(lsas)));
    oi.send(packet, Some(nbr.addr()));
}

fn ospf_ls_ack_add(nbr: &mut Neighbor, lsa: &OspfLsa) {
    if let Err(err) = nbr.ls_ack_add(&lsa.h) {
        ospf_warn!("Neighbor {}: {}", nbr.ident.router_id, err);
    }
}

/// Process a received update. Returns the LSAs installed into the
/// database, to be flooded further by the instance.
pub fn ospf_ls_upd_recv(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    upd: &OspfLsUpdate,
) -> Vec<OspfLsa> {
    ospf_pdu_handler!(LsUpdate, Recv);
    ospf_pkt_trace!(
        oi.tracing,
        "[LSUpdate] recv {} LSAs from {} on {}",
        upd.lsas.len(),
        nbr.ident.router_id,
        oi.name
    );

    let mut accepted = Vec::new();
    if nbr.state < NfsmState::Exchange {
        return accepted;
    }

    for lsa in upd.lsas.iter() {
        if !lsa.is_checksum_valid() {
            ospf_debug!(
                "LSA {} from {} has a bad checksum",
                LsaKey::from(&lsa.h),
                nbr.ident.router_id
            );
            continue;
        }
        if !lsa_type_valid(lsa.h.ls_type) {
            continue;
        }
        let key = LsaKey::from(&lsa.h);
        nbr.ls_req_remove(&key);

        let curr = oi.lsa_lookup(&key).map(|curr| curr.h.clone());

        // MaxAge LSA we never had: acknowledge and forget.
        if curr.is_none() && is_maxage(&lsa.h) {
            ospf_ls_ack_add(nbr, lsa);
            continue;
        }

        let newer = match curr.as_ref() {
            Some(curr) => lsa_compare(&lsa.h, curr),
            None => Ordering::Greater,
        };
        match newer {
            Ordering::Greater => match oi.lsdb_get_mut(lsa.h.ls_type).install(lsa.clone()) {
                Ok(Some(lsa)) => {
                    ospf_database_trace!(
                        oi.tracing,
                        Lsdb,
                        "Install {} seq {:08x} from {}",
                        key,
                        lsa.h.ls_seq_number,
                        nbr.ident.router_id
                    );
                    ospf_ls_ack_add(nbr, &lsa);
                    accepted.push(lsa);
                }
                Ok(None) => {}
                Err(err) => {
                    ospf_warn!("Install {} failed: {}", key, err);
                }
            },
            Ordering::Equal => {
                // Implied acknowledgment.
                nbr.ls_rxmt_remove(&key);
                ospf_ls_ack_add(nbr, lsa);
            }
            Ordering::Less => {
                // Older than ours.
            }
        }
    }

    if nbr.state == NfsmState::Loading && nbr.ls_req.is_empty() {
        ospf_nfsm(oi, nbr, NfsmEvent::LoadingDone);
    }
    accepted
}

/// Send pending acknowledgments, cleared with transmission.
pub fn ospf_ls_ack_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    ospf_pdu_handler!(LsAck, Send);

    if nbr.ls_ack.is_empty() {
        return;
    }
    let max = (payload_room(oi.mtu) / OSPF_LSA_HEADER_LEN).max(1);
    let headers = std::mem::take(&mut nbr.ls_ack);
    for chunk in headers.chunks(max) {
        ospf_pkt_trace!(
            oi.tracing,
            "[LSAck] send {} headers to {} on {}",
            chunk.len(),
            nbr.ident.router_id,
            oi.name
        );
        let ack = OspfLsAck {
            lsa_headers: chunk.to_vec(),
        };
        let packet = oi.packet(Ospfv2Payload::LsAck(ack));
        oi.send(packet, Some(nbr.addr()));
    }
}

pub fn ospf_ls_ack_recv(oi: &mut OspfInterface, nbr: &mut Neighbor, ack: &OspfLsAck) {
    ospf_pdu_handler!(LsAck, Recv);
    ospf_pkt_trace!(
        oi.tracing,
        "[LSAck] recv {} headers from {} on {}",
        ack.lsa_headers.len(),
        nbr.ident.router_id,
        oi.name
    );

    if nbr.state < NfsmState::Exchange {
        return;
    }
    for h in ack.lsa_headers.iter() {
        nbr.ls_rxmt_remove(&LsaKey::from(h));
    }
}

impl Ospf {
    /// An LSA was accepted into `area_id` (or the AS database). Flood it to
    /// every other neighbor in scope. `from` is the interface and neighbor
    /// it came from, `None` for self-originated LSAs.
    pub fn lsa_install_notify(
        &mut self,
        area_id: Ipv4Addr,
        lsa: &OspfLsa,
        from: Option<(u32, Ipv4Addr)>,
    ) {
        ospf_event_trace!(
            self.tracing,
            Flooding,
            "Flood {} seq {:08x} age {}",
            LsaKey::from(&lsa.h),
            lsa.h.ls_seq_number,
            lsa.h.ls_age
        );
        self.flood(area_id, lsa, from);
    }

    fn flood(&mut self, area_id: Ipv4Addr, lsa: &OspfLsa, from: Option<(u32, Ipv4Addr)>) {
        let key = LsaKey::from(&lsa.h);
        let as_scope = lsa_flood_scope(lsa.h.ls_type) == FloodScope::As;

        for (ifindex, link) in self.links.iter_mut() {
            if !link.enabled || (!as_scope && link.area_id != area_id) {
                continue;
            }
            let mut added = false;
            for (addr, nbr) in link.nbrs.iter_mut() {
                // Old instance is superseded.
                nbr.ls_rxmt_remove(&key);

                if nbr.state < NfsmState::Exchange {
                    continue;
                }
                if from == Some((*ifindex, *addr)) {
                    continue;
                }
                if nbr.state < NfsmState::Full {
                    if let Some(req) = nbr.ls_req_lookup(&key) {
                        let ord = lsa_compare(&lsa.h, req);
                        if ord.is_le() {
                            if ord.is_eq() {
                                nbr.ls_req_remove(&key);
                            }
                            continue;
                        }
                        nbr.ls_req_remove(&key);
                    }
                }
                match nbr.ls_rxmt_add(lsa) {
                    Ok(()) => added = true,
                    Err(err) => ospf_warn!("Neighbor {}: {}", nbr.ident.router_id, err),
                }
            }
            if !added {
                continue;
            }

            // Received on this interface: only the DR floods it back.
            if let Some((from_ifindex, _)) = from {
                if from_ifindex == *ifindex && link.state != IfsmState::DR {
                    continue;
                }
            }

            let dest = match link.state {
                IfsmState::DROther => Some(ALL_D_ROUTERS),
                _ => None,
            };
            let packet = Ospfv2Packet::new(
                &self.router_id,
                &link.area_id,
                Ospfv2Payload::LsUpdate(OspfLsUpdate::new(vec![lsa_for_send(lsa)])),
            );
            let _ = self.ptx.send(Message::Send(packet, *ifindex, dest));
        }
    }

    /// Identities still held on some retransmission list.
    pub fn ls_rxmt_in_use(&self) -> BTreeSet<LsaKey> {
        self.links
            .values()
            .flat_map(|link| link.nbrs.values())
            .flat_map(|nbr| nbr.ls_rxmt.iter())
            .map(|lsa| LsaKey::from(&lsa.h))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::inst::tests::{TestInterface, nbr_new};
    use crate::ospf::lsdb::Lsdb;
    use crate::ospf::lsdb::tests::router_lsa;

    fn lsu_count(t: &mut TestInterface) -> usize {
        t.sent()
            .into_iter()
            .filter(|m| {
                matches!(m, Message::Send(p, _, _) if matches!(p.payload, Ospfv2Payload::LsUpdate(_)))
            })
            .count()
    }

    #[test]
    fn request_unknown_lsa_is_bad_request() {
        let mut t = TestInterface::new();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;
        let req = OspfLsRequest {
            reqs: vec![OspfLsRequestEntry::new(
                OspfLsType::Router,
                Ipv4Addr::new(9, 9, 9, 9),
                Ipv4Addr::new(9, 9, 9, 9),
            )],
        };
        let mut oi = t.oi();
        ospf_ls_req_recv(&mut oi, &mut nbr, &req);
        assert_eq!(nbr.state, NfsmState::ExStart);
    }

    #[test]
    fn request_is_answered_at_once() {
        let mut t = TestInterface::new();
        let lsa = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001);
        t.lsdb.install(lsa.clone()).unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Exchange;
        let req = OspfLsRequest {
            reqs: vec![OspfLsRequestEntry::new(
                OspfLsType::Router,
                lsa.h.ls_id,
                lsa.h.adv_router,
            )],
        };
        let mut oi = t.oi();
        ospf_ls_req_recv(&mut oi, &mut nbr, &req);
        drop(oi);
        assert!(nbr.ls_upd.is_empty());
        assert_eq!(lsu_count(&mut t), 1);
    }

    #[test]
    fn update_installs_acks_and_completes_loading() {
        let mut t = TestInterface::new();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Loading;
        let lsa = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001);
        nbr.ls_req_add(&lsa.h).unwrap();

        let mut oi = t.oi();
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![lsa.clone()]));
        assert_eq!(accepted.len(), 1);
        assert_eq!(nbr.ls_ack.len(), 1);
        assert!(nbr.ls_req.is_empty());
        assert_eq!(nbr.state, NfsmState::Full);

        // The same instance again is a duplicate: acked, not installed.
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![lsa.clone()]));
        assert!(accepted.is_empty());
        assert_eq!(nbr.ls_ack.len(), 2);

        ospf_ls_ack_send(&mut oi, &mut nbr);
        assert!(nbr.ls_ack.is_empty());
        drop(oi);
        assert_eq!(t.lsdb.len(), 1);
    }

    #[test]
    fn corrupted_lsa_is_dropped() {
        let mut t = TestInterface::new();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;
        let mut lsa = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001);
        lsa.h.ls_checksum ^= 0x0101;

        let mut oi = t.oi();
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![lsa]));
        assert!(accepted.is_empty());
        assert!(nbr.ls_ack.is_empty());
        drop(oi);
        assert!(t.lsdb.is_empty());
    }

    #[test]
    fn update_at_capacity_is_not_acked() {
        let mut t = TestInterface::new();
        t.lsdb = Lsdb::new(1);
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;
        let first = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001);
        let second = router_lsa(Ipv4Addr::new(3, 3, 3, 3), 0x80000001);

        let mut oi = t.oi();
        let accepted = ospf_ls_upd_recv(
            &mut oi,
            &mut nbr,
            &OspfLsUpdate::new(vec![first.clone(), second.clone()]),
        );
        assert_eq!(accepted, vec![first.clone()]);
        assert_eq!(nbr.ls_ack.len(), 1);
        assert_eq!(LsaKey::from(&nbr.ls_ack[0]), LsaKey::from(&first.h));

        // A newer instance of a held identity still fits.
        let newer = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000002);
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![newer]));
        assert_eq!(accepted.len(), 1);
        drop(oi);
        assert_eq!(t.lsdb.len(), 1);
        assert!(t.lsdb.lookup(&LsaKey::from(&second.h)).is_none());
    }

    #[test]
    fn older_instance_is_ignored() {
        let mut t = TestInterface::new();
        t.lsdb
            .install(router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000005))
            .unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;

        let mut oi = t.oi();
        let old = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000002);
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![old]));
        assert!(accepted.is_empty());
        assert!(nbr.ls_ack.is_empty());
    }

    #[test]
    fn ack_removes_first_match() {
        let mut t = TestInterface::new();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;
        let a = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001);
        let b = router_lsa(Ipv4Addr::new(3, 3, 3, 3), 0x80000001);
        nbr.ls_rxmt_add(&a).unwrap();
        nbr.ls_rxmt_add(&b).unwrap();

        let mut oi = t.oi();
        ospf_ls_ack_recv(
            &mut oi,
            &mut nbr,
            &OspfLsAck {
                lsa_headers: vec![a.h.clone()],
            },
        );
        assert_eq!(nbr.ls_rxmt.len(), 1);
        assert_eq!(nbr.ls_rxmt[0].h.adv_router, Ipv4Addr::new(3, 3, 3, 3));

        ospf_ls_rxmt_send(&mut oi, &mut nbr);
        drop(oi);
        assert_eq!(lsu_count(&mut t), 1);
    }

    #[test]
    fn maxage_unknown_is_acked_only() {
        let mut t = TestInterface::new();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        nbr.state = NfsmState::Full;
        let mut lsa = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001);
        lsa.h.ls_age = OSPF_MAX_AGE;

        let mut oi = t.oi();
        let accepted = ospf_ls_upd_recv(&mut oi, &mut nbr, &OspfLsUpdate::new(vec![lsa]));
        assert!(accepted.is_empty());
        assert_eq!(nbr.ls_ack.len(), 1);
        drop(oi);
        assert!(t.lsdb.is_empty());
    }

    #[test]
    fn flood_scope() {
        assert_eq!(lsa_flood_scope(OspfLsType::Router), FloodScope::Area);
        assert_eq!(lsa_flood_scope(OspfLsType::AsExternal), FloodScope::As);
    }
}
