use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::{ospf_warn, rib};

use super::error::OspfError;
use super::lsdb::LsaKey;
use super::spf::{PathType, Vertex};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OspfRoute {
    pub prefix: Ipv4Net,
    pub cost: u32,
    pub nexthop: Ipv4Addr,
    pub ifindex: u32,
    pub ifname: String,
    pub area_id: Ipv4Addr,
    pub path: PathType,
    pub key: Option<LsaKey>,
}

pub type RouteTable = BTreeMap<Ipv4Net, OspfRoute>;

/// Project the vertices of one area into routes. Vertices without a
/// destination are not routes; a destination without a resolved next hop
/// is skipped with a warning.
pub fn route_from_vertices<F>(area_id: Ipv4Addr, vertices: &[Vertex], ifname: F) -> Vec<OspfRoute>
where
    F: Fn(u32) -> Option<String>,
{
    vertices
        .iter()
        .filter_map(|v| {
            let prefix = v.dest?;
            if v.dist == u32::MAX {
                return None;
            }
            let Some(nexthop) = v.nexthop else {
                ospf_warn!("{}", OspfError::NoNexthop(prefix.to_string()));
                return None;
            };
            Some(OspfRoute {
                prefix,
                cost: v.dist,
                nexthop: nexthop.addr,
                ifindex: nexthop.ifindex,
                ifname: ifname(nexthop.ifindex).unwrap_or_default(),
                area_id,
                path: v.path,
                key: v.key,
            })
        })
        .collect()
}

/// Insert `route` unless an entry with a lower cost exists. On equal cost
/// the larger area ID wins; within an area the first entry stays.
pub fn route_merge(table: &mut RouteTable, route: OspfRoute) {
    match table.get(&route.prefix) {
        Some(curr) => {
            let replace = route.cost < curr.cost
                || (route.cost == curr.cost && route.area_id > curr.area_id);
            if replace {
                table.insert(route.prefix, route);
            }
        }
        None => {
            table.insert(route.prefix, route);
        }
    }
}

#[derive(Debug)]
pub struct DiffResult<'a> {
    pub only_curr: Vec<(&'a Ipv4Net, &'a OspfRoute)>,
    pub only_next: Vec<(&'a Ipv4Net, &'a OspfRoute)>,
    pub different: Vec<(&'a Ipv4Net, &'a OspfRoute, &'a OspfRoute)>,
    pub identical: Vec<(&'a Ipv4Net, &'a OspfRoute)>,
}

pub fn diff<'a>(curr: &'a RouteTable, next: &'a RouteTable) -> DiffResult<'a> {
    let mut res = DiffResult {
        only_curr: vec![],
        only_next: vec![],
        different: vec![],
        identical: vec![],
    };

    let mut curr_iter = curr.iter().peekable();
    let mut next_iter = next.iter().peekable();

    while let (Some(&(curr_prefix, curr_route)), Some(&(next_prefix, next_route))) =
        (curr_iter.peek(), next_iter.peek())
    {
        match curr_prefix.cmp(next_prefix) {
            std::cmp::Ordering::Less => {
                res.only_curr.push((curr_prefix, curr_route));
                curr_iter.next();
            }
            std::cmp::Ordering::Greater => {
                res.only_next.push((next_prefix, next_route));
                next_iter.next();
            }
            std::cmp::Ordering::Equal => {
                if curr_route == next_route {
                    res.identical.push((curr_prefix, curr_route));
                } else {
                    res.different.push((curr_prefix, curr_route, next_route));
                }
                curr_iter.next();
                next_iter.next();
            }
        }
    }

    for (prefix, curr_route) in curr_iter {
        res.only_curr.push((prefix, curr_route));
    }
    for (prefix, next_route) in next_iter {
        res.only_next.push((prefix, next_route));
    }

    res
}

fn rib_add(route: &OspfRoute) -> rib::Message {
    rib::Message::Ipv4Add {
        prefix: route.prefix,
        nexthop: route.nexthop,
        metric: route.cost,
        ifindex: route.ifindex,
        ifname: route.ifname.clone(),
    }
}

/// Push the delta to the RIB: withdrawals first, then replacements, then
/// new prefixes.
pub fn diff_apply(rib_tx: &UnboundedSender<rib::Message>, diff: &DiffResult) {
    for (prefix, _) in diff.only_curr.iter() {
        let _ = rib_tx.send(rib::Message::Ipv4Del { prefix: **prefix });
    }
    for (_, _, next) in diff.different.iter() {
        let _ = rib_tx.send(rib_add(next));
    }
    for (_, next) in diff.only_next.iter() {
        let _ = rib_tx.send(rib_add(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::spf::{SpfNexthop, VertexKind};
    use tokio::sync::mpsc;

    fn route(prefix: &str, cost: u32, area: &str) -> OspfRoute {
        OspfRoute {
            prefix: prefix.parse().unwrap(),
            cost,
            nexthop: "10.0.0.2".parse().unwrap(),
            ifindex: 1,
            ifname: "eth0".into(),
            area_id: area.parse().unwrap(),
            path: PathType::IntraArea,
            key: None,
        }
    }

    #[test]
    fn merge_lower_cost_wins() {
        let mut table = RouteTable::new();
        route_merge(&mut table, route("10.1.0.0/16", 20, "0.0.0.0"));
        route_merge(&mut table, route("10.1.0.0/16", 10, "0.0.0.0"));
        route_merge(&mut table, route("10.1.0.0/16", 15, "0.0.0.1"));
        let entry = table.values().next().unwrap();
        assert_eq!(entry.cost, 10);
        assert_eq!(entry.area_id, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn merge_tie_larger_area() {
        let mut table = RouteTable::new();
        route_merge(&mut table, route("10.1.0.0/16", 10, "0.0.0.1"));
        route_merge(&mut table, route("10.1.0.0/16", 10, "0.0.0.0"));
        assert_eq!(table.values().next().unwrap().area_id, "0.0.0.1".parse::<Ipv4Addr>().unwrap());
        route_merge(&mut table, route("10.1.0.0/16", 10, "0.0.0.2"));
        assert_eq!(table.values().next().unwrap().area_id, "0.0.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn vertices_without_nexthop_skipped() {
        let vertex = |dest: Option<&str>, nexthop: bool| Vertex {
            kind: VertexKind::Stub,
            id: Ipv4Addr::UNSPECIFIED,
            dist: 3,
            key: None,
            parent: Some(0),
            nexthop: nexthop.then_some(SpfNexthop {
                addr: "10.0.0.1".parse().unwrap(),
                ifindex: 1,
            }),
            dest: dest.map(|d| d.parse().unwrap()),
            path: PathType::IntraArea,
        };
        let vertices = vec![
            vertex(None, true),
            vertex(Some("10.0.0.0/24"), true),
            vertex(Some("10.9.0.0/24"), false),
        ];
        let routes = route_from_vertices(Ipv4Addr::UNSPECIFIED, &vertices, |_| Some("eth0".into()));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, "10.0.0.0/24".parse::<Ipv4Net>().unwrap());
        assert_eq!(routes[0].ifname, "eth0");
        assert_eq!(routes[0].cost, 3);
    }

    #[test]
    fn diff_and_apply() {
        let mut curr = RouteTable::new();
        let mut next = RouteTable::new();
        for r in [route("10.1.0.0/16", 10, "0.0.0.0"), route("10.2.0.0/16", 10, "0.0.0.0")] {
            route_merge(&mut curr, r);
        }
        for r in [route("10.2.0.0/16", 20, "0.0.0.0"), route("10.3.0.0/16", 10, "0.0.0.0")] {
            route_merge(&mut next, r);
        }
        let res = diff(&curr, &next);
        assert_eq!(res.only_curr.len(), 1);
        assert_eq!(res.different.len(), 1);
        assert_eq!(res.only_next.len(), 1);
        assert!(res.identical.is_empty());

        let (tx, mut rx) = mpsc::unbounded_channel();
        diff_apply(&tx, &res);
        let mut msgs = vec![];
        while let Ok(msg) = rx.try_recv() {
            msgs.push(msg);
        }
        assert_eq!(msgs.len(), 3);
        assert!(matches!(msgs[0], rib::Message::Ipv4Del { prefix } if prefix == "10.1.0.0/16".parse::<Ipv4Net>().unwrap()));
        assert!(matches!(msgs[1], rib::Message::Ipv4Add { metric: 20, .. }));
        assert!(matches!(msgs[2], rib::Message::Ipv4Add { metric: 10, .. }));
    }
}
