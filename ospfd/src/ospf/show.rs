use std::fmt::Write;
use std::net::Ipv4Addr;

use itertools::Itertools;
use ospf_packet::{OspfLsa, OspfLsp};
use serde::Serialize;

use super::inst::{Ospf, ShowCallback};
use super::link::OspfLink;
use super::lsdb::{LsaKey, Lsdb};
use super::neigh::Neighbor;

impl Ospf {
    fn show_add(&mut self, path: &str, cb: ShowCallback) {
        self.show_cb.insert(path.to_string(), cb);
    }

    pub fn show_build(&mut self) {
        self.show_add("/show/ip/ospf", show_ospf);
        self.show_add("/show/ip/ospf/interface", show_ospf_interface);
        self.show_add("/show/ip/ospf/neighbor", show_ospf_neighbor);
        self.show_add("/show/ip/ospf/database", show_ospf_database);
        self.show_add("/show/ip/ospf/route", show_ospf_route);
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, std::fmt::Error> {
    serde_json::to_string_pretty(value).map_err(|_| std::fmt::Error)
}

#[derive(Serialize)]
struct OspfSummary {
    router_id: Ipv4Addr,
    areas: usize,
    active_areas: usize,
    external_lsas: usize,
    routes: usize,
    spf_interval: u64,
}

fn show_ospf(ospf: &Ospf, json: bool) -> Result<String, std::fmt::Error> {
    let summary = OspfSummary {
        router_id: ospf.router_id,
        areas: ospf.areas.len(),
        active_areas: ospf.areas.active_count(),
        external_lsas: ospf.lsdb_as.len(),
        routes: ospf.table.len(),
        spf_interval: ospf.spf_interval,
    };
    if json {
        return to_json(&summary);
    }
    let mut buf = String::new();
    writeln!(buf, " OSPF Routing Process, Router ID: {}", summary.router_id)?;
    writeln!(buf, " SPF schedule interval {} secs", summary.spf_interval)?;
    writeln!(
        buf,
        " Number of areas attached to this router: {} ({} active)",
        summary.areas, summary.active_areas
    )?;
    writeln!(buf, " Number of external LSA {}", summary.external_lsas)?;
    writeln!(buf, " Number of routes {}", summary.routes)?;
    Ok(buf)
}

#[derive(Serialize)]
struct LinkJson {
    name: String,
    ifindex: u32,
    address: String,
    area_id: Ipv4Addr,
    state: String,
    network_type: String,
    cost: u16,
    priority: u8,
    d_router: Ipv4Addr,
    bd_router: Ipv4Addr,
    hello_interval: u16,
    dead_interval: u32,
    neighbors: usize,
    adjacent: usize,
    passive: bool,
}

impl From<&OspfLink> for LinkJson {
    fn from(oi: &OspfLink) -> Self {
        Self {
            name: oi.name.clone(),
            ifindex: oi.index,
            address: oi.ident.prefix.to_string(),
            area_id: oi.area_id,
            state: oi.state.to_string(),
            network_type: if oi.is_pointopoint() {
                "point-to-point".into()
            } else {
                "broadcast".into()
            },
            cost: oi.cost(),
            priority: oi.ident.priority,
            d_router: oi.ident.d_router,
            bd_router: oi.ident.bd_router,
            hello_interval: oi.hello_interval(),
            dead_interval: oi.dead_interval(),
            neighbors: oi.nbrs.len(),
            adjacent: oi.full_nbrs().count(),
            passive: oi.is_passive(),
        }
    }
}

fn show_ospf_interface(ospf: &Ospf, json: bool) -> Result<String, std::fmt::Error> {
    let links: Vec<LinkJson> = ospf
        .links
        .values()
        .filter(|oi| oi.enabled)
        .map(LinkJson::from)
        .collect();
    if json {
        return to_json(&links);
    }
    let mut buf = String::new();
    for l in links.iter() {
        writeln!(buf, "{} is up, ifindex {}", l.name, l.ifindex)?;
        writeln!(buf, "  Internet Address {}, Area {}", l.address, l.area_id)?;
        writeln!(
            buf,
            "  Router ID {}, Network Type {}, Cost: {}",
            ospf.router_id, l.network_type, l.cost
        )?;
        writeln!(
            buf,
            "  State {}, Priority {}{}",
            l.state,
            l.priority,
            if l.passive { ", passive" } else { "" }
        )?;
        writeln!(
            buf,
            "  Designated Router {}, Backup Designated Router {}",
            l.d_router, l.bd_router
        )?;
        writeln!(
            buf,
            "  Timer intervals configured, Hello {}s, Dead {}s",
            l.hello_interval, l.dead_interval
        )?;
        writeln!(
            buf,
            "  Neighbor Count is {}, Adjacent neighbor count is {}",
            l.neighbors, l.adjacent
        )?;
    }
    Ok(buf)
}

#[derive(Serialize)]
struct NeighborJson {
    router_id: Ipv4Addr,
    address: Ipv4Addr,
    interface: String,
    priority: u8,
    state: String,
    d_router: Ipv4Addr,
    bd_router: Ipv4Addr,
    dead_time: u32,
    ls_request: usize,
    ls_retransmit: usize,
}

fn nbr_json(oi: &OspfLink, nbr: &Neighbor) -> NeighborJson {
    NeighborJson {
        router_id: nbr.ident.router_id,
        address: nbr.addr(),
        interface: oi.name.clone(),
        priority: nbr.ident.priority,
        state: nbr.state.to_string(),
        d_router: nbr.ident.d_router,
        bd_router: nbr.ident.bd_router,
        dead_time: oi.dead_interval().saturating_sub(nbr.timer.inactivity),
        ls_request: nbr.ls_req.len(),
        ls_retransmit: nbr.ls_rxmt.len(),
    }
}

fn show_ospf_neighbor(ospf: &Ospf, json: bool) -> Result<String, std::fmt::Error> {
    let nbrs: Vec<NeighborJson> = ospf
        .links
        .values()
        .filter(|oi| oi.enabled)
        .flat_map(|oi| oi.nbrs.values().map(move |nbr| nbr_json(oi, nbr)))
        .collect();
    if json {
        return to_json(&nbrs);
    }
    let mut buf = String::new();
    writeln!(
        buf,
        "{:<15} {:>3} {:<15} {:>8} {:<15} {:<10}",
        "Neighbor ID", "Pri", "State", "Dead", "Address", "Interface"
    )?;
    for n in nbrs.iter() {
        writeln!(
            buf,
            "{:<15} {:>3} {:<15} {:>7}s {:<15} {:<10}",
            n.router_id.to_string(),
            n.priority,
            n.state,
            n.dead_time,
            n.address.to_string(),
            n.interface
        )?;
    }
    Ok(buf)
}

#[derive(Serialize)]
struct LsaJson {
    area_id: Option<Ipv4Addr>,
    ls_type: String,
    ls_id: Ipv4Addr,
    adv_router: Ipv4Addr,
    age: u16,
    seq_number: String,
    checksum: String,
    detail: String,
}

fn lsa_detail(lsa: &OspfLsa) -> String {
    match &lsa.lsp {
        OspfLsp::Router(body) => format!("links {}", body.links.len()),
        OspfLsp::Network(body) => format!(
            "mask {} attached {}",
            body.netmask,
            body.attached_routers.iter().join(", ")
        ),
        OspfLsp::Summary(body) | OspfLsp::SummaryAsbr(body) => {
            format!("mask {} metric {}", body.netmask, body.metric)
        }
        OspfLsp::AsExternal(body) => format!(
            "mask {} metric {} E{}",
            body.netmask,
            body.metric,
            if body.is_type2() { 2 } else { 1 }
        ),
        OspfLsp::Unknown(_) => String::new(),
    }
}

fn lsdb_json(area_id: Option<Ipv4Addr>, lsdb: &Lsdb) -> impl Iterator<Item = LsaJson> + '_ {
    lsdb.db.iter().map(move |(key, lsa): (&LsaKey, &OspfLsa)| LsaJson {
        area_id,
        ls_type: key.ls_type().to_string(),
        ls_id: key.ls_id,
        adv_router: key.adv_router,
        age: lsa.h.ls_age,
        seq_number: format!("0x{:08x}", lsa.h.ls_seq_number),
        checksum: format!("0x{:04x}", lsa.h.ls_checksum),
        detail: lsa_detail(lsa),
    })
}

fn show_ospf_database(ospf: &Ospf, json: bool) -> Result<String, std::fmt::Error> {
    let lsas: Vec<LsaJson> = ospf
        .areas
        .iter()
        .flat_map(|(area_id, area)| lsdb_json(Some(*area_id), &area.lsdb))
        .chain(lsdb_json(None, &ospf.lsdb_as))
        .collect();
    if json {
        return to_json(&lsas);
    }
    let mut buf = String::new();
    writeln!(buf, "       OSPF Router with ID ({})", ospf.router_id)?;
    for (area_id, group) in &lsas.iter().chunk_by(|lsa| lsa.area_id) {
        match area_id {
            Some(area_id) => writeln!(buf, "\n                Area {}", area_id)?,
            None => writeln!(buf, "\n                AS External")?,
        }
        writeln!(
            buf,
            "{:<12} {:<15} {:<15} {:>4} {:<10} {:<6} Detail",
            "Type", "Link ID", "ADV Router", "Age", "Seq#", "CkSum"
        )?;
        for lsa in group {
            writeln!(
                buf,
                "{:<12} {:<15} {:<15} {:>4} {:<10} {:<6} {}",
                lsa.ls_type,
                lsa.ls_id.to_string(),
                lsa.adv_router.to_string(),
                lsa.age,
                lsa.seq_number,
                lsa.checksum,
                lsa.detail
            )?;
        }
    }
    Ok(buf)
}

fn show_ospf_route(ospf: &Ospf, json: bool) -> Result<String, std::fmt::Error> {
    if json {
        let routes: Vec<_> = ospf.table.values().collect();
        return to_json(&routes);
    }
    let mut buf = String::new();
    for (path, routes) in &ospf.table.values().sorted_by_key(|r| r.path as u8).chunk_by(|r| r.path) {
        writeln!(buf, "============ OSPF {} routing table ============", path)?;
        for r in routes {
            writeln!(
                buf,
                "N    {:<20} [{}] area: {}",
                r.prefix.to_string(),
                r.cost,
                r.area_id
            )?;
            writeln!(buf, "                           via {}, {}", r.nexthop, r.ifname)?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::inst::Message;
    use crate::ospf::inst::tests::{eth0, ospf_new};
    use tokio::sync::oneshot;

    fn show(ospf: &mut Ospf, path: &str, json: bool) -> String {
        let (tx, mut rx) = oneshot::channel();
        ospf.process_msg(Message::Show(path.into(), json, tx));
        rx.try_recv().unwrap()
    }

    #[test]
    fn interface_text_and_json() {
        let (mut ospf, _prx, _rib_rx) = ospf_new(vec![eth0()]);
        let text = show(&mut ospf, "/show/ip/ospf/interface", false);
        assert!(text.contains("eth0 is up"));
        assert!(text.contains("State Waiting"));

        let json = show(&mut ospf, "/show/ip/ospf/interface", true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "eth0");
        assert_eq!(value[0]["cost"], 10);
    }

    #[test]
    fn database_lists_own_router_lsa() {
        let (mut ospf, _prx, _rib_rx) = ospf_new(vec![eth0()]);
        let json = show(&mut ospf, "/show/ip/ospf/database", true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["adv_router"], "1.1.1.1");
        assert_eq!(value[0]["seq_number"], "0x80000001");

        let text = show(&mut ospf, "/show/ip/ospf/database", false);
        assert!(text.contains("Area 0.0.0.0"));
    }
}
