use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::net::Ipv4Addr;

use ospf_packet::{OspfLsRequestEntry, OspfLsType, OspfLsa, OspfLsaHeader};
use serde::Serialize;

use super::error::{OspfError, OspfResult};

pub const OSPF_MAX_AGE: u16 = 3600;
pub const OSPF_MAX_AGE_DIFF: u16 = 900;

/// LSA identity: (type, link state ID, advertising router).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LsaKey {
    pub ls_type: u8,
    pub ls_id: Ipv4Addr,
    pub adv_router: Ipv4Addr,
}

impl LsaKey {
    pub fn new(ls_type: OspfLsType, ls_id: Ipv4Addr, adv_router: Ipv4Addr) -> Self {
        Self {
            ls_type: ls_type.into(),
            ls_id,
            adv_router,
        }
    }

    pub fn ls_type(&self) -> OspfLsType {
        self.ls_type.into()
    }

    fn first(ls_type: u8) -> Self {
        Self {
            ls_type,
            ls_id: Ipv4Addr::UNSPECIFIED,
            adv_router: Ipv4Addr::UNSPECIFIED,
        }
    }

    fn last(ls_type: u8) -> Self {
        Self {
            ls_type,
            ls_id: Ipv4Addr::BROADCAST,
            adv_router: Ipv4Addr::BROADCAST,
        }
    }
}

impl From<&OspfLsaHeader> for LsaKey {
    fn from(h: &OspfLsaHeader) -> Self {
        Self::new(h.ls_type, h.ls_id, h.adv_router)
    }
}

impl From<&OspfLsRequestEntry> for LsaKey {
    fn from(req: &OspfLsRequestEntry) -> Self {
        Self {
            ls_type: req.ls_type as u8,
            ls_id: req.ls_id,
            adv_router: req.adv_router,
        }
    }
}

impl Display for LsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.ls_type(), self.ls_id, self.adv_router)
    }
}

pub fn is_maxage(h: &OspfLsaHeader) -> bool {
    h.ls_age >= OSPF_MAX_AGE
}

/// Compare two instances of the same LSA. `Greater` means `a` is newer.
pub fn lsa_compare(a: &OspfLsaHeader, b: &OspfLsaHeader) -> Ordering {
    let (a_seq, b_seq) = (a.ls_seq_number as i32, b.ls_seq_number as i32);
    if a_seq != b_seq {
        return a_seq.cmp(&b_seq);
    }
    if a.ls_checksum != b.ls_checksum {
        return a.ls_checksum.cmp(&b.ls_checksum);
    }
    let (a_max, b_max) = (is_maxage(a), is_maxage(b));
    if a_max != b_max {
        return a_max.cmp(&b_max);
    }
    if a.ls_age.abs_diff(b.ls_age) > OSPF_MAX_AGE_DIFF {
        return b.ls_age.cmp(&a.ls_age);
    }
    Ordering::Equal
}

#[derive(Debug, Default)]
pub struct Lsdb {
    pub db: BTreeMap<LsaKey, OspfLsa>,
    pub max: usize,
}

impl Lsdb {
    pub fn new(max: usize) -> Self {
        Self {
            db: BTreeMap::new(),
            max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn lookup(&self, key: &LsaKey) -> Option<&OspfLsa> {
        self.db.get(key)
    }

    /// All LSAs of one type in key order.
    pub fn iter_type(&self, ls_type: OspfLsType) -> impl Iterator<Item = &OspfLsa> {
        let typ: u8 = ls_type.into();
        self.db
            .range(LsaKey::first(typ)..=LsaKey::last(typ))
            .map(|(_, lsa)| lsa)
    }

    /// Network-LSA by link state ID regardless of the advertising router.
    pub fn find_network(&self, ls_id: Ipv4Addr) -> Option<&OspfLsa> {
        let typ: u8 = OspfLsType::Network.into();
        let start = LsaKey {
            ls_type: typ,
            ls_id,
            adv_router: Ipv4Addr::UNSPECIFIED,
        };
        let end = LsaKey {
            ls_type: typ,
            ls_id,
            adv_router: Ipv4Addr::BROADCAST,
        };
        self.db
            .range(start..=end)
            .map(|(_, lsa)| lsa)
            .find(|lsa| !is_maxage(&lsa.h))
    }

    /// Install `lsa` when it is newer than the stored instance. Returns the
    /// accepted instance, or `None` when the stored one was kept.
    pub fn install(&mut self, lsa: OspfLsa) -> OspfResult<Option<OspfLsa>> {
        let key = LsaKey::from(&lsa.h);
        match self.db.get(&key) {
            Some(curr) => {
                if lsa_compare(&lsa.h, &curr.h) != Ordering::Greater {
                    return Ok(None);
                }
            }
            None => {
                if self.max != 0 && self.db.len() >= self.max {
                    return Err(OspfError::LsdbFull { limit: self.max });
                }
            }
        }
        self.db.insert(key, lsa.clone());
        Ok(Some(lsa))
    }

    pub fn remove(&mut self, key: &LsaKey) -> Option<OspfLsa> {
        self.db.remove(key)
    }

    /// Advance every age by `secs`, capped at MaxAge. Returns the identities
    /// which reached MaxAge by this call.
    pub fn age(&mut self, secs: u16) -> Vec<LsaKey> {
        let mut expired = Vec::new();
        for (key, lsa) in self.db.iter_mut() {
            if is_maxage(&lsa.h) {
                continue;
            }
            lsa.h.ls_age = lsa.h.ls_age.saturating_add(secs).min(OSPF_MAX_AGE);
            if is_maxage(&lsa.h) {
                expired.push(*key);
            }
        }
        expired
    }

    /// Purge MaxAge LSAs which are not on any retransmission list.
    pub fn maxage_remove(&mut self, in_use: &BTreeSet<LsaKey>) -> Vec<LsaKey> {
        let purge: Vec<LsaKey> = self
            .db
            .iter()
            .filter(|(key, lsa)| is_maxage(&lsa.h) && !in_use.contains(key))
            .map(|(key, _)| *key)
            .collect();
        for key in purge.iter() {
            self.db.remove(key);
        }
        purge
    }

    pub fn headers(&self) -> Vec<OspfLsaHeader> {
        self.db.values().map(|lsa| lsa.h.clone()).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ospf_packet::RouterLsa;

    pub(crate) fn router_lsa(adv_router: Ipv4Addr, seq: u32) -> OspfLsa {
        let mut h = OspfLsaHeader::new(OspfLsType::Router, adv_router, adv_router);
        h.ls_seq_number = seq;
        let mut lsa = OspfLsa::from(h, RouterLsa::default().into());
        lsa.update();
        lsa
    }

    fn header(seq: u32, checksum: u16, age: u16) -> OspfLsaHeader {
        let mut h = OspfLsaHeader::new(
            OspfLsType::Router,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(1, 1, 1, 1),
        );
        h.ls_seq_number = seq;
        h.ls_checksum = checksum;
        h.ls_age = age;
        h
    }

    #[test]
    fn compare_sequence_signed() {
        let a = header(0x80000002, 0, 0);
        let b = header(0x80000001, 0, 0);
        assert_eq!(lsa_compare(&a, &b), Ordering::Greater);
        // 0x80000001 is the smallest usable sequence number.
        let c = header(0x00000001, 0, 0);
        assert_eq!(lsa_compare(&c, &a), Ordering::Greater);
    }

    #[test]
    fn compare_checksum_maxage_age() {
        assert_eq!(
            lsa_compare(&header(1, 20, 0), &header(1, 10, 0)),
            Ordering::Greater
        );
        assert_eq!(
            lsa_compare(&header(1, 10, OSPF_MAX_AGE), &header(1, 10, 5)),
            Ordering::Greater
        );
        assert_eq!(
            lsa_compare(&header(1, 10, 100), &header(1, 10, 1100)),
            Ordering::Greater
        );
        assert_eq!(
            lsa_compare(&header(1, 10, 100), &header(1, 10, 900)),
            Ordering::Equal
        );
    }

    #[test]
    fn compare_is_ordering() {
        let headers = [
            header(0x80000001, 5, 0),
            header(0x80000001, 9, 0),
            header(0x80000002, 1, 0),
            header(0x80000003, 1, 0),
        ];
        for a in headers.iter() {
            assert_eq!(lsa_compare(a, a), Ordering::Equal);
            for b in headers.iter() {
                assert_eq!(lsa_compare(a, b), lsa_compare(b, a).reverse());
                for c in headers.iter() {
                    if lsa_compare(a, b) == Ordering::Greater
                        && lsa_compare(b, c) == Ordering::Greater
                    {
                        assert_eq!(lsa_compare(a, c), Ordering::Greater);
                    }
                }
            }
        }
    }

    #[test]
    fn install_idempotent() {
        let mut lsdb = Lsdb::new(0);
        let lsa = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001);
        assert!(lsdb.install(lsa.clone()).unwrap().is_some());
        assert!(lsdb.install(lsa.clone()).unwrap().is_none());
        assert_eq!(lsdb.len(), 1);

        let older = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000000);
        assert!(lsdb.install(older).unwrap().is_none());

        let newer = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000002);
        let accepted = lsdb.install(newer).unwrap().unwrap();
        assert_eq!(accepted.h.ls_seq_number, 0x80000002);
        assert_eq!(
            lsdb.lookup(&LsaKey::from(&lsa.h)).unwrap().h.ls_seq_number,
            0x80000002
        );
    }

    #[test]
    fn install_capacity() {
        let mut lsdb = Lsdb::new(1);
        lsdb.install(router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001))
            .unwrap();
        let err = lsdb
            .install(router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001))
            .unwrap_err();
        assert_eq!(err, OspfError::LsdbFull { limit: 1 });
        // Replacing an existing identity is still allowed.
        assert!(
            lsdb.install(router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000002))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn age_and_maxage_remove() {
        let mut lsdb = Lsdb::new(0);
        let a = router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001);
        let mut b = router_lsa(Ipv4Addr::new(2, 2, 2, 2), 0x80000001);
        b.h.ls_age = OSPF_MAX_AGE - 1;
        let (key_a, key_b) = (LsaKey::from(&a.h), LsaKey::from(&b.h));
        lsdb.install(a).unwrap();
        lsdb.install(b).unwrap();

        assert_eq!(lsdb.age(10), vec![key_b]);
        assert_eq!(lsdb.lookup(&key_a).unwrap().h.ls_age, 10);
        assert_eq!(lsdb.lookup(&key_b).unwrap().h.ls_age, OSPF_MAX_AGE);
        assert!(lsdb.age(10).is_empty());

        let mut in_use = BTreeSet::new();
        in_use.insert(key_b);
        assert!(lsdb.maxage_remove(&in_use).is_empty());
        assert_eq!(lsdb.maxage_remove(&BTreeSet::new()), vec![key_b]);
        assert_eq!(lsdb.headers().len(), 1);
    }

    #[test]
    fn find_network_any_advertiser() {
        let mut lsdb = Lsdb::new(0);
        lsdb.install(router_lsa(Ipv4Addr::new(1, 1, 1, 1), 0x80000001))
            .unwrap();
        let mut h = OspfLsaHeader::new(
            OspfLsType::Network,
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(2, 2, 2, 2),
        );
        h.ls_seq_number = 0x80000001;
        let mut lsa = OspfLsa::from(
            h,
            ospf_packet::NetworkLsa {
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                attached_routers: vec![Ipv4Addr::new(2, 2, 2, 2)],
            }
            .into(),
        );
        lsa.update();
        lsdb.install(lsa).unwrap();

        let found = lsdb.find_network(Ipv4Addr::new(10, 0, 0, 2)).unwrap();
        assert_eq!(found.h.adv_router, Ipv4Addr::new(2, 2, 2, 2));
        assert!(lsdb.find_network(Ipv4Addr::new(10, 0, 0, 1)).is_none());
        assert_eq!(lsdb.iter_type(OspfLsType::Router).count(), 1);
    }
}
