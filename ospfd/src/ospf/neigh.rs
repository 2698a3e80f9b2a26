use std::collections::VecDeque;
use std::net::Ipv4Addr;

use bitfield_struct::bitfield;
use ipnet::Ipv4Net;
use ospf_packet::{DbDescFlags, OspfDbDesc, OspfLsa, OspfLsaHeader, OspfOptions, Ospfv2Packet};

use super::error::{OspfError, OspfResult};
use super::ident::Identity;
use super::lsdb::{LsaKey, lsa_compare};
use super::nfsm::NfsmState;

pub struct Neighbor {
    pub ifindex: u32,
    pub ident: Identity,
    pub state: NfsmState,
    pub ostate: NfsmState,
    pub options: OspfOptions,
    pub dd: NeighborDbDesc,
    pub db_sum: VecDeque<OspfLsaHeader>,
    pub ls_req: Vec<OspfLsaHeader>,
    pub ls_upd: Vec<LsaKey>,
    pub ls_rxmt: Vec<OspfLsa>,
    pub ls_ack: Vec<OspfLsaHeader>,
    pub timer: NeighborTimer,
    pub state_change: usize,
    pub flags: NeighborFlags,
    pub list_max: usize,
}

#[derive(Debug, Default)]
pub struct NeighborDbDesc {
    // Our flags and sequence number for the next DD to this neighbor.
    pub flags: DbDescFlags,
    pub seqnum: u32,
    // Last DD received from the neighbor.
    pub recv: OspfDbDesc,
    // Last DD sent to the neighbor, resent on retransmission or duplicate.
    pub last_sent: Option<Ospfv2Packet>,
}

/// Tick counters. Each counts seconds since the corresponding event.
#[derive(Debug, Default)]
pub struct NeighborTimer {
    pub inactivity: u32,
    pub db_desc: u32,
    pub ls_req: u32,
    pub ls_rxmt: u32,
}

#[bitfield(u8, debug = true)]
pub struct NeighborFlags {
    pub dd_init: bool,
    #[bits(7)]
    pub resvd: u8,
}

impl Neighbor {
    pub fn new(ifindex: u32, prefix: Ipv4Net, router_id: &Ipv4Addr, list_max: usize) -> Self {
        let mut ident = Identity::new(*router_id);
        ident.prefix = prefix;
        Self {
            ifindex,
            ident,
            state: NfsmState::Down,
            ostate: NfsmState::Down,
            options: OspfOptions::new(),
            dd: NeighborDbDesc::default(),
            db_sum: VecDeque::new(),
            ls_req: Vec::new(),
            ls_upd: Vec::new(),
            ls_rxmt: Vec::new(),
            ls_ack: Vec::new(),
            timer: NeighborTimer::default(),
            state_change: 0,
            flags: NeighborFlags::new(),
            list_max,
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.ident.prefix.addr()
    }

    pub fn is_master(&self) -> bool {
        self.dd.flags.master()
    }

    fn check_len(&self, len: usize, list: &'static str) -> OspfResult<()> {
        if self.list_max != 0 && len >= self.list_max {
            return Err(OspfError::ListFull {
                list,
                limit: self.list_max,
            });
        }
        Ok(())
    }

    /// Queue a header on the request list. A queued header of the same
    /// identity is replaced in place when `h` is newer.
    pub fn ls_req_add(&mut self, h: &OspfLsaHeader) -> OspfResult<()> {
        let key = LsaKey::from(h);
        if let Some(curr) = self.ls_req.iter_mut().find(|r| LsaKey::from(&**r) == key) {
            if lsa_compare(h, curr).is_gt() {
                *curr = h.clone();
            }
            return Ok(());
        }
        self.check_len(self.ls_req.len(), "request")?;
        self.ls_req.push(h.clone());
        Ok(())
    }

    pub fn ls_req_lookup(&self, key: &LsaKey) -> Option<&OspfLsaHeader> {
        self.ls_req.iter().find(|h| LsaKey::from(*h) == *key)
    }

    pub fn ls_req_remove(&mut self, key: &LsaKey) -> bool {
        if let Some(pos) = self.ls_req.iter().position(|h| LsaKey::from(h) == *key) {
            self.ls_req.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn ls_upd_add(&mut self, key: LsaKey) -> OspfResult<()> {
        if self.ls_upd.contains(&key) {
            return Ok(());
        }
        self.check_len(self.ls_upd.len(), "update")?;
        self.ls_upd.push(key);
        Ok(())
    }

    /// Put an LSA instance on the retransmission list, replacing any older
    /// instance of the same identity.
    pub fn ls_rxmt_add(&mut self, lsa: &OspfLsa) -> OspfResult<()> {
        let key = LsaKey::from(&lsa.h);
        if let Some(curr) = self
            .ls_rxmt
            .iter_mut()
            .find(|l| LsaKey::from(&l.h) == key)
        {
            *curr = lsa.clone();
            return Ok(());
        }
        self.check_len(self.ls_rxmt.len(), "retransmission")?;
        self.ls_rxmt.push(lsa.clone());
        Ok(())
    }

    /// Remove the first retransmission entry with this identity.
    pub fn ls_rxmt_remove(&mut self, key: &LsaKey) -> Option<OspfLsa> {
        let pos = self
            .ls_rxmt
            .iter()
            .position(|l| LsaKey::from(&l.h) == *key)?;
        Some(self.ls_rxmt.remove(pos))
    }

    pub fn ls_ack_add(&mut self, h: &OspfLsaHeader) -> OspfResult<()> {
        self.check_len(self.ls_ack.len(), "acknowledgment")?;
        self.ls_ack.push(h.clone());
        Ok(())
    }

    pub fn lists_clear(&mut self) {
        self.db_sum.clear();
        self.ls_req.clear();
        self.ls_upd.clear();
        self.ls_rxmt.clear();
        self.dd.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::lsdb::tests::router_lsa;
    use ospf_packet::OspfLsType;

    fn nbr(max: usize) -> Neighbor {
        Neighbor::new(
            1,
            "10.0.0.2/24".parse().unwrap(),
            &Ipv4Addr::new(2, 2, 2, 2),
            max,
        )
    }

    fn header(rid: [u8; 4], seq: u32) -> OspfLsaHeader {
        let rid = Ipv4Addr::from(rid);
        let mut h = OspfLsaHeader::new(OspfLsType::Router, rid, rid);
        h.ls_seq_number = seq;
        h
    }

    #[test]
    fn request_list_keeps_newest_in_order() {
        let mut nbr = nbr(0);
        nbr.ls_req_add(&header([1, 1, 1, 1], 0x80000001)).unwrap();
        nbr.ls_req_add(&header([3, 3, 3, 3], 0x80000001)).unwrap();
        nbr.ls_req_add(&header([1, 1, 1, 1], 0x80000005)).unwrap();
        nbr.ls_req_add(&header([1, 1, 1, 1], 0x80000002)).unwrap();

        assert_eq!(nbr.ls_req.len(), 2);
        assert_eq!(nbr.ls_req[0].adv_router, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(nbr.ls_req[0].ls_seq_number, 0x80000005);
        assert_eq!(nbr.ls_req[1].adv_router, Ipv4Addr::new(3, 3, 3, 3));

        let key = LsaKey::from(&header([1, 1, 1, 1], 0));
        assert!(nbr.ls_req_remove(&key));
        assert!(!nbr.ls_req_remove(&key));
        assert_eq!(nbr.ls_req.len(), 1);
    }

    #[test]
    fn retransmission_list_first_match() {
        let mut nbr = nbr(0);
        let a = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001);
        let b = router_lsa(Ipv4Addr::new(3, 3, 3, 3), 0x80000001);
        nbr.ls_rxmt_add(&a).unwrap();
        nbr.ls_rxmt_add(&b).unwrap();

        let newer = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000002);
        nbr.ls_rxmt_add(&newer).unwrap();
        assert_eq!(nbr.ls_rxmt.len(), 2);
        assert_eq!(nbr.ls_rxmt[0].h.ls_seq_number, 0x80000002);

        let removed = nbr.ls_rxmt_remove(&LsaKey::from(&a.h)).unwrap();
        assert_eq!(removed.h.ls_seq_number, 0x80000002);
        assert_eq!(nbr.ls_rxmt.len(), 1);
        assert_eq!(nbr.ls_rxmt[0].h.adv_router, Ipv4Addr::new(3, 3, 3, 3));
    }

    #[test]
    fn bounded_lists() {
        let mut nbr = nbr(1);
        nbr.ls_ack_add(&header([1, 1, 1, 1], 1)).unwrap();
        assert!(matches!(
            nbr.ls_ack_add(&header([1, 1, 1, 1], 1)),
            Err(OspfError::ListFull { .. })
        ));
        nbr.ls_upd_add(LsaKey::from(&header([1, 1, 1, 1], 1)))
            .unwrap();
        // Already queued identities are not counted twice.
        nbr.ls_upd_add(LsaKey::from(&header([1, 1, 1, 1], 1)))
            .unwrap();
        assert!(
            nbr.ls_upd_add(LsaKey::from(&header([3, 3, 3, 3], 1)))
                .is_err()
        );
    }
}
