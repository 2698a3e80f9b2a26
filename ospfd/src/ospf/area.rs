use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use super::lsdb::Lsdb;
use super::spf::Vertex;

pub struct OspfArea {
    pub area_id: Ipv4Addr,
    pub links: BTreeSet<u32>,
    pub lsdb: Lsdb,
    pub vertices: Vec<Vertex>,
}

impl OspfArea {
    pub fn new(area_id: Ipv4Addr, lsdb_max: usize) -> Self {
        Self {
            area_id,
            links: BTreeSet::new(),
            lsdb: Lsdb::new(lsdb_max),
            vertices: Vec::new(),
        }
    }

    pub fn is_backbone(&self) -> bool {
        self.area_id.is_unspecified()
    }
}

/// Areas keyed by area ID. An area is created on first reference and never
/// removed.
#[derive(Default)]
pub struct OspfAreaMap {
    areas: BTreeMap<Ipv4Addr, OspfArea>,
    lsdb_max: usize,
}

impl OspfAreaMap {
    pub fn new(lsdb_max: usize) -> Self {
        Self {
            areas: BTreeMap::new(),
            lsdb_max,
        }
    }

    pub fn get(&self, area_id: &Ipv4Addr) -> Option<&OspfArea> {
        self.areas.get(area_id)
    }

    pub fn get_mut(&mut self, area_id: &Ipv4Addr) -> Option<&mut OspfArea> {
        self.areas.get_mut(area_id)
    }

    pub fn fetch(&mut self, area_id: Ipv4Addr) -> &mut OspfArea {
        let lsdb_max = self.lsdb_max;
        self.areas
            .entry(area_id)
            .or_insert_with(|| OspfArea::new(area_id, lsdb_max))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &OspfArea)> {
        self.areas.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Ipv4Addr, &mut OspfArea)> {
        self.areas.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Number of areas with at least one enabled interface.
    pub fn active_count(&self) -> usize {
        self.areas.values().filter(|a| !a.links.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_creates_once() {
        let mut areas = OspfAreaMap::new(10);
        let area_id = Ipv4Addr::new(0, 0, 0, 1);
        areas.fetch(area_id).links.insert(3);
        areas.fetch(area_id).links.insert(4);
        assert_eq!(areas.len(), 1);
        assert_eq!(areas.get(&area_id).unwrap().links.len(), 2);
        assert!(!areas.get(&area_id).unwrap().is_backbone());
        assert_eq!(areas.get(&area_id).unwrap().lsdb.max, 10);
        assert!(areas.get(&Ipv4Addr::UNSPECIFIED).is_none());
    }
}
