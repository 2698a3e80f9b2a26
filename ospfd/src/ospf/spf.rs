use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use ospf_packet::*;
use serde::Serialize;

use super::lsdb::{LsaKey, Lsdb, is_maxage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum VertexKind {
    Router,
    Network,
    Stub,
    Summary,
    Asbr,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathType {
    IntraArea,
    InterArea,
    External,
}

impl Display for PathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PathType::IntraArea => "intra-area",
            PathType::InterArea => "inter-area",
            PathType::External => "external",
        };
        write!(f, "{str}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpfNexthop {
    pub addr: Ipv4Addr,
    pub ifindex: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vertex {
    pub kind: VertexKind,
    pub id: Ipv4Addr,
    pub dist: u32,
    pub key: Option<LsaKey>,
    pub parent: Option<usize>,
    pub nexthop: Option<SpfNexthop>,
    pub dest: Option<Ipv4Net>,
    pub path: PathType,
}

/// Local interface as seen by SPF: its prefix and the neighbors heard on
/// it, router ID to interface address.
#[derive(Debug, Clone)]
pub struct SpfLink {
    pub ifindex: u32,
    pub prefix: Ipv4Net,
    pub nbrs: BTreeMap<Ipv4Addr, Ipv4Addr>,
}

pub struct SpfInput<'a> {
    pub router_id: Ipv4Addr,
    pub lsdb: &'a Lsdb,
    pub lsdb_as: &'a Lsdb,
    pub links: Vec<SpfLink>,
}

fn prefix_from_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Option<Ipv4Net> {
    let plen = ipnet::ipv4_mask_to_prefix(mask).ok()?;
    Ipv4Net::new(addr, plen).ok().map(|net| net.trunc())
}

fn router_body(lsa: &OspfLsa) -> Option<&RouterLsa> {
    match &lsa.lsp {
        OspfLsp::Router(body) => Some(body),
        _ => None,
    }
}

struct Spf<'a> {
    input: &'a SpfInput<'a>,
    vertices: Vec<Vertex>,
    index: BTreeMap<(VertexKind, Ipv4Addr), usize>,
    dests: BTreeSet<Ipv4Net>,
    // Stub leaves by destination; one network address may carry several masks.
    stubs: BTreeMap<Ipv4Net, usize>,
    settled: Vec<bool>,
    queue: BTreeSet<(u32, usize)>,
}

impl<'a> Spf<'a> {
    fn new(input: &'a SpfInput<'a>) -> Self {
        Self {
            input,
            vertices: Vec::new(),
            index: BTreeMap::new(),
            dests: BTreeSet::new(),
            stubs: BTreeMap::new(),
            settled: Vec::new(),
            queue: BTreeSet::new(),
        }
    }

    fn router_lsa(&self, router_id: Ipv4Addr) -> Option<&'a OspfLsa> {
        let key = LsaKey::new(OspfLsType::Router, router_id, router_id);
        self.input.lsdb.lookup(&key).filter(|lsa| !is_maxage(&lsa.h))
    }

    fn lookup(&self, kind: VertexKind, id: Ipv4Addr) -> Option<&Vertex> {
        self.index.get(&(kind, id)).map(|idx| &self.vertices[*idx])
    }

    fn push(&mut self, vertex: Vertex) -> usize {
        let idx = self.vertices.len();
        self.index.insert((vertex.kind, vertex.id), idx);
        if let Some(dest) = vertex.dest {
            self.dests.insert(dest);
        }
        self.vertices.push(vertex);
        self.settled.push(false);
        idx
    }

    fn link_by_addr(&self, addr: Ipv4Addr) -> Option<&'a SpfLink> {
        self.input.links.iter().find(|link| link.prefix.addr() == addr)
    }

    fn link_by_prefix(&self, addr: Ipv4Addr) -> Option<&'a SpfLink> {
        self.input
            .links
            .iter()
            .find(|link| link.prefix.contains(&addr))
    }

    // First hop toward `id` reached from `parent` over a link whose
    // link data is `link_data`.
    fn nexthop(
        &self,
        parent: usize,
        kind: VertexKind,
        id: Ipv4Addr,
        link_data: Ipv4Addr,
    ) -> Option<SpfNexthop> {
        let p = &self.vertices[parent];
        if p.parent.is_none() {
            return match kind {
                VertexKind::Network => self.link_by_prefix(id).map(|link| SpfNexthop {
                    addr: link.prefix.addr(),
                    ifindex: link.ifindex,
                }),
                _ => {
                    let link = self.link_by_addr(link_data)?;
                    let addr = link.nbrs.get(&id)?;
                    Some(SpfNexthop {
                        addr: *addr,
                        ifindex: link.ifindex,
                    })
                }
            };
        }
        if p.kind == VertexKind::Network && p.parent == Some(0) {
            let nexthop = p.nexthop?;
            let link = self
                .input
                .links
                .iter()
                .find(|link| link.ifindex == nexthop.ifindex)?;
            if let Some(addr) = link.nbrs.get(&id) {
                return Some(SpfNexthop {
                    addr: *addr,
                    ifindex: nexthop.ifindex,
                });
            }
            let addr = self
                .router_lsa(id)
                .and_then(router_body)?
                .links
                .iter()
                .find(|l| l.link_type == OspfLinkType::Transit && l.link_id == p.id)
                .map(|l| l.link_data)?;
            return Some(SpfNexthop {
                addr,
                ifindex: nexthop.ifindex,
            });
        }
        p.nexthop
    }

    fn relax(
        &mut self,
        parent: usize,
        kind: VertexKind,
        id: Ipv4Addr,
        key: LsaKey,
        dest: Option<Ipv4Net>,
        dist: u32,
        link_data: Ipv4Addr,
    ) {
        match self.index.get(&(kind, id)).copied() {
            Some(idx) => {
                if self.settled[idx] || dist >= self.vertices[idx].dist {
                    return;
                }
                let nexthop = self.nexthop(parent, kind, id, link_data);
                let v = &mut self.vertices[idx];
                self.queue.remove(&(v.dist, idx));
                v.dist = dist;
                v.parent = Some(parent);
                v.nexthop = nexthop;
                self.queue.insert((dist, idx));
            }
            None => {
                let nexthop = self.nexthop(parent, kind, id, link_data);
                let idx = self.push(Vertex {
                    kind,
                    id,
                    dist,
                    key: Some(key),
                    parent: Some(parent),
                    nexthop,
                    dest,
                    path: PathType::IntraArea,
                });
                self.queue.insert((dist, idx));
            }
        }
    }

    fn stub_add(&mut self, parent: usize, link: &RouterLsaLink) {
        let Some(dest) = prefix_from_mask(link.link_id, link.link_data) else {
            return;
        };
        let p = &self.vertices[parent];
        let dist = p.dist.saturating_add(link.tos_0_metric as u32);
        let nexthop = if p.parent.is_none() {
            self.input
                .links
                .iter()
                .find(|l| l.prefix.trunc() == dest)
                .map(|l| SpfNexthop {
                    addr: l.prefix.addr(),
                    ifindex: l.ifindex,
                })
        } else {
            p.nexthop
        };
        let key = p.key;

        if let Some(idx) = self.stubs.get(&dest).copied() {
            let v = &mut self.vertices[idx];
            if dist < v.dist {
                v.dist = dist;
                v.parent = Some(parent);
                v.nexthop = nexthop;
                v.key = key;
            }
            return;
        }
        let idx = self.push(Vertex {
            kind: VertexKind::Stub,
            id: dest.network(),
            dist,
            key,
            parent: Some(parent),
            nexthop,
            dest: Some(dest),
            path: PathType::IntraArea,
        });
        self.stubs.insert(dest, idx);
        self.settled[idx] = true;
    }

    fn router_expand(&mut self, idx: usize) {
        let v = &self.vertices[idx];
        let (vid, vdist) = (v.id, v.dist);
        let Some(lsa) = self.router_lsa(vid) else {
            return;
        };
        let Some(body) = router_body(lsa) else {
            return;
        };
        for link in body.links.iter() {
            let dist = vdist.saturating_add(link.tos_0_metric as u32);
            match link.link_type {
                OspfLinkType::P2p => {
                    let Some(w) = self.router_lsa(link.link_id) else {
                        continue;
                    };
                    let back = router_body(w).is_some_and(|body| {
                        body.links
                            .iter()
                            .any(|l| l.link_type == OspfLinkType::P2p && l.link_id == vid)
                    });
                    if back {
                        let key = LsaKey::from(&w.h);
                        self.relax(idx, VertexKind::Router, link.link_id, key, None, dist, link.link_data);
                    }
                }
                OspfLinkType::Transit => {
                    let Some(w) = self.input.lsdb.find_network(link.link_id) else {
                        continue;
                    };
                    let OspfLsp::Network(net) = &w.lsp else {
                        continue;
                    };
                    if !net.attached_routers.contains(&vid) {
                        continue;
                    }
                    let key = LsaKey::from(&w.h);
                    let dest = prefix_from_mask(link.link_id, net.netmask);
                    self.relax(idx, VertexKind::Network, link.link_id, key, dest, dist, link.link_data);
                }
                OspfLinkType::Stub => self.stub_add(idx, link),
                _ => {}
            }
        }
    }

    fn network_expand(&mut self, idx: usize) {
        let lsdb = self.input.lsdb;
        let v = &self.vertices[idx];
        let (vid, vdist) = (v.id, v.dist);
        let Some(lsa) = v.key.and_then(|key| lsdb.lookup(&key)) else {
            return;
        };
        let OspfLsp::Network(net) = &lsa.lsp else {
            return;
        };
        for router_id in net.attached_routers.iter() {
            let Some(w) = self.router_lsa(*router_id) else {
                continue;
            };
            let back = router_body(w).is_some_and(|body| {
                body.links
                    .iter()
                    .any(|l| l.link_type == OspfLinkType::Transit && l.link_id == vid)
            });
            if back {
                let key = LsaKey::from(&w.h);
                self.relax(idx, VertexKind::Router, *router_id, key, None, vdist, vid);
            }
        }
    }

    fn intra_area(&mut self) -> bool {
        let router_id = self.input.router_id;
        let Some(lsa) = self.router_lsa(router_id) else {
            return false;
        };
        let root = self.push(Vertex {
            kind: VertexKind::Router,
            id: router_id,
            dist: 0,
            key: Some(LsaKey::from(&lsa.h)),
            parent: None,
            nexthop: None,
            dest: None,
            path: PathType::IntraArea,
        });
        self.queue.insert((0, root));

        while let Some((_, idx)) = self.queue.pop_first() {
            self.settled[idx] = true;
            match self.vertices[idx].kind {
                VertexKind::Router => self.router_expand(idx),
                VertexKind::Network => self.network_expand(idx),
                _ => {}
            }
        }
        true
    }

    fn inter_area(&mut self) {
        let lsdb = self.input.lsdb;
        let summaries = lsdb
            .iter_type(OspfLsType::Summary)
            .chain(lsdb.iter_type(OspfLsType::SummaryAsbr));
        for lsa in summaries {
            if is_maxage(&lsa.h) || lsa.h.adv_router == self.input.router_id {
                continue;
            }
            let (kind, body) = match &lsa.lsp {
                OspfLsp::Summary(body) => (VertexKind::Summary, body),
                OspfLsp::SummaryAsbr(body) => (VertexKind::Asbr, body),
                _ => continue,
            };
            if body.metric >= LS_INFINITY {
                continue;
            }
            let Some(adv) = self.index.get(&(VertexKind::Router, lsa.h.adv_router)).copied() else {
                continue;
            };
            let dest = match kind {
                VertexKind::Summary => {
                    let Some(dest) = prefix_from_mask(lsa.h.ls_id, body.netmask) else {
                        continue;
                    };
                    if self.dests.contains(&dest) {
                        continue;
                    }
                    Some(dest)
                }
                _ => {
                    if self.lookup(VertexKind::Router, lsa.h.ls_id).is_some()
                        || self.lookup(VertexKind::Asbr, lsa.h.ls_id).is_some()
                    {
                        continue;
                    }
                    None
                }
            };
            let a = &self.vertices[adv];
            let vertex = Vertex {
                kind,
                id: lsa.h.ls_id,
                dist: a.dist.saturating_add(body.metric),
                key: Some(LsaKey::from(&lsa.h)),
                parent: Some(adv),
                nexthop: a.nexthop,
                dest,
                path: PathType::InterArea,
            };
            let idx = self.push(vertex);
            self.settled[idx] = true;
        }
    }

    // Vertex with the longest destination covering `addr`.
    fn longest_match(&self, addr: Ipv4Addr) -> Option<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.dest.is_some_and(|dest| dest.contains(&addr)))
            .max_by_key(|(idx, v)| (v.dest.map(|d| d.prefix_len()), std::cmp::Reverse(*idx)))
            .map(|(idx, _)| idx)
    }

    fn external(&mut self) {
        let lsdb_as = self.input.lsdb_as;
        for lsa in lsdb_as.iter_type(OspfLsType::AsExternal) {
            if is_maxage(&lsa.h) || lsa.h.adv_router == self.input.router_id {
                continue;
            }
            let OspfLsp::AsExternal(body) = &lsa.lsp else {
                continue;
            };
            if body.metric >= LS_INFINITY {
                continue;
            }
            let Some(dest) = prefix_from_mask(lsa.h.ls_id, body.netmask) else {
                continue;
            };
            if self.dests.contains(&dest) {
                continue;
            }
            let fwd = body.forwarding_address;
            let base = if fwd.is_unspecified() {
                self.index
                    .get(&(VertexKind::Router, lsa.h.adv_router))
                    .or_else(|| self.index.get(&(VertexKind::Asbr, lsa.h.adv_router)))
                    .copied()
            } else {
                self.longest_match(fwd)
            };
            let Some(base) = base else {
                continue;
            };
            let b = &self.vertices[base];
            // A forwarding address on a local segment is itself the next hop.
            let nexthop = match b.nexthop {
                Some(nh) if !fwd.is_unspecified() && b.parent == Some(0) => Some(SpfNexthop {
                    addr: fwd,
                    ifindex: nh.ifindex,
                }),
                nexthop => nexthop,
            };
            let vertex = Vertex {
                kind: VertexKind::External,
                id: lsa.h.ls_id,
                dist: b.dist.saturating_add(body.metric),
                key: Some(LsaKey::from(&lsa.h)),
                parent: Some(base),
                nexthop,
                dest: Some(dest),
                path: PathType::External,
            };
            let idx = self.push(vertex);
            self.settled[idx] = true;
        }
    }
}

/// Shortest path tree of one area plus inter-area and external
/// destinations. Returns no vertices when our own router-LSA is missing.
pub fn ospf_spf_calc(input: &SpfInput) -> Vec<Vertex> {
    let mut spf = Spf::new(input);
    if !spf.intra_area() {
        return vec![];
    }
    spf.inter_area();
    // Transit area re-optimization is not performed: virtual links are
    // not supported.
    spf.external();
    spf.vertices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn install(lsdb: &mut Lsdb, ls_type: OspfLsType, id: &str, adv: &str, lsp: OspfLsp) {
        let mut h = OspfLsaHeader::new(ls_type, addr(id), addr(adv));
        h.ls_seq_number = 0x80000001;
        let mut lsa = OspfLsa::from(h, lsp);
        lsa.update();
        lsdb.install(lsa).unwrap();
    }

    fn router(links: Vec<RouterLsaLink>) -> OspfLsp {
        let num_links = links.len() as u16;
        RouterLsa {
            flags: 0,
            num_links,
            links,
        }
        .into()
    }

    fn spf_link(ifindex: u32, prefix: &str, nbrs: &[(&str, &str)]) -> SpfLink {
        SpfLink {
            ifindex,
            prefix: prefix.parse().unwrap(),
            nbrs: nbrs.iter().map(|(rid, a)| (addr(rid), addr(a))).collect(),
        }
    }

    fn find<'a>(vertices: &'a [Vertex], dest: &str) -> &'a Vertex {
        let dest: Ipv4Net = dest.parse().unwrap();
        vertices
            .iter()
            .find(|v| v.dest == Some(dest))
            .unwrap_or_else(|| panic!("no vertex for {dest}"))
    }

    #[test]
    fn stub_only() {
        let mut lsdb = Lsdb::new(0);
        let lsdb_as = Lsdb::new(0);
        install(
            &mut lsdb,
            OspfLsType::Router,
            "1.1.1.1",
            "1.1.1.1",
            router(vec![RouterLsaLink::new("10.0.0.1/24".parse().unwrap(), 5)]),
        );
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[])],
        };
        let vertices = ospf_spf_calc(&input);
        assert_eq!(vertices.len(), 2);
        let stub = find(&vertices, "10.0.0.0/24");
        assert_eq!(stub.kind, VertexKind::Stub);
        assert_eq!(stub.dist, 5);
        assert_eq!(
            stub.nexthop,
            Some(SpfNexthop {
                addr: addr("10.0.0.1"),
                ifindex: 1
            })
        );
    }

    #[test]
    fn stub_same_network_distinct_masks() {
        let mut lsdb = Lsdb::new(0);
        let lsdb_as = Lsdb::new(0);
        install(
            &mut lsdb,
            OspfLsType::Router,
            "1.1.1.1",
            "1.1.1.1",
            router(vec![
                RouterLsaLink::new("10.0.0.1/24".parse().unwrap(), 5),
                RouterLsaLink::new("10.0.0.1/16".parse().unwrap(), 7),
            ]),
        );
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[]), spf_link(2, "10.0.0.1/16", &[])],
        };
        let vertices = ospf_spf_calc(&input);
        assert_eq!(vertices.len(), 3);

        let narrow = find(&vertices, "10.0.0.0/24");
        assert_eq!(narrow.dist, 5);
        assert_eq!(narrow.nexthop.unwrap().ifindex, 1);

        let wide = find(&vertices, "10.0.0.0/16");
        assert_eq!(wide.kind, VertexKind::Stub);
        assert_eq!(wide.dist, 7);
        assert_eq!(wide.nexthop.unwrap().ifindex, 2);
    }

    #[test]
    fn no_own_router_lsa() {
        let lsdb = Lsdb::new(0);
        let lsdb_as = Lsdb::new(0);
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![],
        };
        assert!(ospf_spf_calc(&input).is_empty());
    }

    // 1.1.1.1 and 2.2.2.2 share 10.0.0.0/24 with 2.2.2.2 as DR. 2.2.2.2
    // has a stub 192.168.2.0/24 and 3.3.3.3 behind a point-to-point link
    // which announces 172.16.0.0/16 as an external.
    fn transit_lsdb() -> (Lsdb, Lsdb) {
        let mut lsdb = Lsdb::new(0);
        let mut lsdb_as = Lsdb::new(0);
        install(
            &mut lsdb,
            OspfLsType::Router,
            "1.1.1.1",
            "1.1.1.1",
            router(vec![RouterLsaLink::transit(addr("10.0.0.2"), addr("10.0.0.1"), 10)]),
        );
        install(
            &mut lsdb,
            OspfLsType::Router,
            "2.2.2.2",
            "2.2.2.2",
            router(vec![
                RouterLsaLink::transit(addr("10.0.0.2"), addr("10.0.0.2"), 10),
                RouterLsaLink::new("192.168.2.1/24".parse().unwrap(), 1),
                RouterLsaLink::p2p(addr("3.3.3.3"), addr("10.1.0.1"), 4),
            ]),
        );
        install(
            &mut lsdb,
            OspfLsType::Router,
            "3.3.3.3",
            "3.3.3.3",
            router(vec![RouterLsaLink::p2p(addr("2.2.2.2"), addr("10.1.0.2"), 4)]),
        );
        install(
            &mut lsdb,
            OspfLsType::Network,
            "10.0.0.2",
            "2.2.2.2",
            NetworkLsa {
                netmask: addr("255.255.255.0"),
                attached_routers: vec![addr("2.2.2.2"), addr("1.1.1.1")],
            }
            .into(),
        );
        install(
            &mut lsdb_as,
            OspfLsType::AsExternal,
            "172.16.0.0",
            "3.3.3.3",
            AsExternalLsa {
                netmask: addr("255.255.0.0"),
                ext_and_resvd: 0x80,
                metric: 20,
                forwarding_address: Ipv4Addr::UNSPECIFIED,
                external_route_tag: 0,
                tos_list: vec![],
            }
            .into(),
        );
        (lsdb, lsdb_as)
    }

    #[test]
    fn transit_network() {
        let (lsdb, lsdb_as) = transit_lsdb();
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[("2.2.2.2", "10.0.0.2")])],
        };
        let vertices = ospf_spf_calc(&input);

        let net = find(&vertices, "10.0.0.0/24");
        assert_eq!(net.kind, VertexKind::Network);
        assert_eq!(net.dist, 10);
        assert_eq!(net.nexthop.unwrap().addr, addr("10.0.0.1"));

        let via = SpfNexthop {
            addr: addr("10.0.0.2"),
            ifindex: 1,
        };
        let stub = find(&vertices, "192.168.2.0/24");
        assert_eq!(stub.dist, 11);
        assert_eq!(stub.nexthop, Some(via));

        let ext = find(&vertices, "172.16.0.0/16");
        assert_eq!(ext.path, PathType::External);
        assert_eq!(ext.dist, 34);
        assert_eq!(ext.nexthop, Some(via));
    }

    #[test]
    fn missing_back_link() {
        let (mut lsdb, lsdb_as) = transit_lsdb();
        // 3.3.3.3 no longer lists 2.2.2.2.
        let mut h = OspfLsaHeader::new(OspfLsType::Router, addr("3.3.3.3"), addr("3.3.3.3"));
        h.ls_seq_number = 0x80000002;
        let mut lsa = OspfLsa::from(h, router(vec![]));
        lsa.update();
        lsdb.install(lsa).unwrap();

        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[("2.2.2.2", "10.0.0.2")])],
        };
        let vertices = ospf_spf_calc(&input);
        assert!(
            !vertices
                .iter()
                .any(|v| v.kind == VertexKind::Router && v.id == addr("3.3.3.3"))
        );
        assert!(!vertices.iter().any(|v| v.kind == VertexKind::External));
    }

    #[test]
    fn summary_and_infinity() {
        let (mut lsdb, lsdb_as) = transit_lsdb();
        for (id, metric) in [("172.20.0.0", 7), ("172.21.0.0", LS_INFINITY)] {
            install(
                &mut lsdb,
                OspfLsType::Summary,
                id,
                "2.2.2.2",
                OspfLsp::Summary(SummaryLsa {
                    netmask: addr("255.255.0.0"),
                    tos: 0,
                    metric,
                    tos_routes: vec![],
                }),
            );
        }
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[("2.2.2.2", "10.0.0.2")])],
        };
        let vertices = ospf_spf_calc(&input);
        let summary = find(&vertices, "172.20.0.0/16");
        assert_eq!(summary.path, PathType::InterArea);
        assert_eq!(summary.dist, 17);
        let infinity: Ipv4Net = "172.21.0.0/16".parse().unwrap();
        assert!(!vertices.iter().any(|v| v.dest == Some(infinity)));
    }

    #[test]
    fn deterministic() {
        let (lsdb, lsdb_as) = transit_lsdb();
        let input = SpfInput {
            router_id: addr("1.1.1.1"),
            lsdb: &lsdb,
            lsdb_as: &lsdb_as,
            links: vec![spf_link(1, "10.0.0.1/24", &[("2.2.2.2", "10.0.0.2")])],
        };
        let a: Vec<_> = ospf_spf_calc(&input)
            .into_iter()
            .map(|v| (v.kind, v.id, v.dist, v.nexthop))
            .collect();
        let b: Vec<_> = ospf_spf_calc(&input)
            .into_iter()
            .map(|v| (v.kind, v.id, v.dist, v.nexthop))
            .collect();
        assert_eq!(a, b);
    }
}
