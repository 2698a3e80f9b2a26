use std::fmt::{Display, Formatter, Result};

use super::*;

// Compact, tcpdump-like rendering used by packet tracing. Repeated items go
// on their own indented lines.

fn flag(f: &mut Formatter<'_>, set: bool, name: &str) -> Result {
    if set { write!(f, "{name}") } else { Ok(()) }
}

impl Display for Ospfv2Packet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(
            f,
            "OSPFv{} {} len {} rid {} area {} cksum {:#06x} auth {}/{}",
            self.version,
            self.typ,
            self.len,
            self.router_id,
            self.area_id,
            self.checksum,
            self.auth_type,
            self.auth,
        )?;
        write!(f, "{}", self.payload)
    }
}

impl Display for Ospfv2Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:016x}", self.auth)
    }
}

impl Display for Ospfv2Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Hello(v) => v.fmt(f),
            Self::DbDesc(v) => v.fmt(f),
            Self::LsRequest(v) => v.fmt(f),
            Self::LsUpdate(v) => v.fmt(f),
            Self::LsAck(v) => v.fmt(f),
            Self::Unknown(v) => write!(f, "  type {} with {} bytes", v.typ, v.payload.len()),
        }
    }
}

impl Display for OspfOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "[")?;
        flag(f, self.dn(), "DN")?;
        flag(f, self.o(), "O")?;
        flag(f, self.demand_circuits(), "DC")?;
        flag(f, self.lls_data(), "L")?;
        flag(f, self.nssa(), "N")?;
        flag(f, self.multicast(), "MC")?;
        flag(f, self.external(), "E")?;
        flag(f, self.multi_topology(), "MT")?;
        write!(f, "]")
    }
}

impl Display for OspfHello {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "  mask {} hello {} dead {} pri {} options {} dr {} bdr {}",
            self.netmask,
            self.hello_interval,
            self.router_dead_interval,
            self.priority,
            self.options,
            self.d_router,
            self.bd_router,
        )?;
        for nbr in self.neighbors.iter() {
            write!(f, "\n    neighbor {nbr}")?;
        }
        Ok(())
    }
}

impl Display for DbDescFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "[")?;
        flag(f, self.init(), "I")?;
        flag(f, self.more(), "M")?;
        flag(f, self.master(), "MS")?;
        flag(f, self.oob_resync(), "R")?;
        write!(f, "]")
    }
}

impl Display for OspfDbDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "  mtu {} options {} flags {} seq {:#010x}",
            self.if_mtu, self.options, self.flags, self.seqnum,
        )?;
        for h in self.lsa_headers.iter() {
            write!(f, "\n    {h}")?;
        }
        Ok(())
    }
}

impl Display for OspfLsaHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{} id {} adv {} seq {:#010x} age {} cksum {:#06x} len {}",
            self.ls_type,
            self.ls_id,
            self.adv_router,
            self.ls_seq_number,
            self.ls_age,
            self.ls_checksum,
            self.length,
        )
    }
}

impl Display for OspfLsRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "  {} requests", self.reqs.len())?;
        for req in self.reqs.iter() {
            write!(f, "\n    {req}")?;
        }
        Ok(())
    }
}

impl Display for OspfLsRequestEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        // The type is carried in a 32 bit field on the wire.
        let ls_type = u8::try_from(self.ls_type).map_or(OspfLsType::Unknown(0), OspfLsType::from);
        write!(f, "{} id {} adv {}", ls_type, self.ls_id, self.adv_router)
    }
}

impl Display for OspfLsUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "  {} advertisements", self.num_adv)?;
        for lsa in self.lsas.iter() {
            write!(f, "\n    {lsa}")?;
        }
        Ok(())
    }
}

impl Display for OspfLsAck {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "  {} acknowledgements", self.lsa_headers.len())?;
        for h in self.lsa_headers.iter() {
            write!(f, "\n    {h}")?;
        }
        Ok(())
    }
}

impl Display for OspfLsa {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.h)?;
        match &self.lsp {
            OspfLsp::Router(v) => write!(f, "\n      {v}"),
            OspfLsp::Network(v) => write!(f, "\n      {v}"),
            OspfLsp::Summary(v) | OspfLsp::SummaryAsbr(v) => write!(f, "\n      {v}"),
            OspfLsp::AsExternal(v) => write!(f, "\n      {v}"),
            OspfLsp::Unknown(v) => write!(f, "\n      opaque body {} bytes", v.data.len()),
        }
    }
}

impl Display for OspfLinkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::P2p => write!(f, "p2p"),
            Self::Transit => write!(f, "transit"),
            Self::Stub => write!(f, "stub"),
            Self::Virtual => write!(f, "virtual"),
            Self::Unknown(v) => write!(f, "link-type({v})"),
        }
    }
}

impl Display for RouterLsa {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "flags {:#06x} links {}", self.flags, self.num_links)?;
        for link in self.links.iter() {
            write!(f, "\n        {link}")?;
        }
        Ok(())
    }
}

impl Display for RouterLsaLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{} id {} data {} metric {}",
            self.link_type, self.link_id, self.link_data, self.tos_0_metric
        )?;
        if self.num_tos > 0 {
            write!(f, " tos {}", self.num_tos)?;
        }
        Ok(())
    }
}

impl Display for NetworkLsa {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "mask {} attached", self.netmask)?;
        for router in self.attached_routers.iter() {
            write!(f, " {router}")?;
        }
        Ok(())
    }
}

impl Display for SummaryLsa {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "mask {} metric {}", self.netmask, self.metric)
    }
}

impl Display for AsExternalLsa {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "mask {} E{} metric {} fwd {} tag {}",
            self.netmask,
            if self.is_type2() { 2 } else { 1 },
            self.metric,
            self.forwarding_address,
            self.external_route_tag,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn options_and_flags_render_as_letters() {
        let options = OspfOptions::new().with_external(true).with_o(true);
        assert_eq!(options.to_string(), "[OE]");

        let flags = DbDescFlags::new().with_init(true).with_more(true).with_master(true);
        assert_eq!(flags.to_string(), "[IMMS]");
    }

    #[test]
    fn hello_lists_neighbors() {
        let hello = OspfHello {
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            hello_interval: 10,
            router_dead_interval: 40,
            priority: 1,
            neighbors: vec![Ipv4Addr::new(2, 2, 2, 2)],
            ..Default::default()
        };
        let text = hello.to_string();
        assert!(text.starts_with("  mask 255.255.255.0 hello 10 dead 40 pri 1"));
        assert!(text.ends_with("neighbor 2.2.2.2"));
    }
}
