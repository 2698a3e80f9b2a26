use std::net::Ipv4Addr;

use ospf_packet::{
    OSPF_HEADER_LEN, OSPF_LSA_HEADER_LEN, OspfDbDesc, OspfHello, OspfLsType, Ospfv2Packet,
    Ospfv2Payload,
};

use super::ident::Identity;
use super::ifsm::{IfsmEvent, IfsmState};
use super::inst::{Message, OspfInterface};
use super::link::OspfLink;
use super::lsdb::{LsaKey, lsa_compare};
use super::neigh::Neighbor;
use super::nfsm::{NfsmEvent, NfsmState, ospf_nfsm};
use super::tracing::OspfTracing;
use crate::{ospf_debug, ospf_pdu_handler, ospf_pkt_trace, ospf_trace, ospf_warn};

pub const IPV4_HEADER_LEN: usize = 20;

// DD fixed part: MTU, options, flags and sequence number.
const DB_DESC_FIXED_LEN: usize = 8;

/// Number of LSA headers which fit in one DD packet on this MTU.
pub fn ospf_db_desc_max(mtu: u16) -> usize {
    let room = (mtu as usize).saturating_sub(IPV4_HEADER_LEN + OSPF_HEADER_LEN + DB_DESC_FIXED_LEN);
    (room / OSPF_LSA_HEADER_LEN).max(1)
}

pub fn lsa_type_valid(ls_type: OspfLsType) -> bool {
    ls_type.is_base()
}

pub fn ospf_hello_packet(link: &OspfLink) -> Ospfv2Packet {
    let mut hello = OspfHello {
        netmask: link.ident.prefix.netmask(),
        hello_interval: link.hello_interval(),
        priority: link.ident.priority,
        router_dead_interval: link.dead_interval(),
        d_router: link.ident.d_router,
        bd_router: link.ident.bd_router,
        ..Default::default()
    };
    hello.options.set_external(true);
    for nbr in link.nbrs.values() {
        if nbr.state == NfsmState::Down {
            continue;
        }
        hello.neighbors.push(nbr.ident.router_id);
    }
    Ospfv2Packet::new(
        &link.ident.router_id,
        &link.area_id,
        Ospfv2Payload::Hello(hello),
    )
}

pub fn ospf_hello_send(link: &mut OspfLink) {
    ospf_trace!(
        "Send Hello on {} with hello_sent flag {}",
        link.name,
        link.flags.hello_sent()
    );
    let packet = ospf_hello_packet(link);
    let _ = link.ptx.send(Message::Send(packet, link.index, None));

    link.flags.set_hello_sent(true);
    link.timer.hello = 0;
}

/// Parameter checks done before a Hello may create a neighbor.
pub fn ospf_hello_validate(
    link: &OspfLink,
    hello: &OspfHello,
    src: &Ipv4Addr,
    tracing: &OspfTracing,
) -> bool {
    ospf_pdu_handler!(Hello, Recv);

    if !link.enabled || link.is_passive() || link.state == IfsmState::Down {
        return false;
    }
    // Non point-to-point interface's network mask check.
    if !link.is_pointopoint() && hello.netmask != link.ident.prefix.netmask() {
        ospf_pkt_trace!(
            tracing,
            "[Hello] netmask mismatch from {} on {}: {} != {}",
            src,
            link.name,
            hello.netmask,
            link.ident.prefix.netmask()
        );
        return false;
    }
    if hello.hello_interval != link.hello_interval() {
        ospf_pkt_trace!(
            tracing,
            "[Hello] hello interval mismatch from {} on {}: {}",
            src,
            link.name,
            hello.hello_interval
        );
        return false;
    }
    if hello.router_dead_interval != link.dead_interval() {
        ospf_pkt_trace!(
            tracing,
            "[Hello] dead interval mismatch from {} on {}: {}",
            src,
            link.name,
            hello.router_dead_interval
        );
        return false;
    }
    true
}

fn ospf_hello_twoway_check(router_id: &Ipv4Addr, hello: &OspfHello) -> bool {
    hello.neighbors.iter().any(|neighbor| router_id == neighbor)
}

fn ospf_hello_is_nbr_changed(nbr: &Neighbor, prev: &Identity) -> bool {
    let current = nbr.ident;
    let nbr_addr = nbr.addr();

    // Check if any of these conditions indicate a change.
    nbr_addr != prev.d_router && nbr_addr == current.d_router || // Non DR -> DR
        nbr_addr == prev.d_router && nbr_addr != current.d_router || // DR -> Non DR
        nbr_addr != prev.bd_router && nbr_addr == current.bd_router || // Non Backup -> Backup
        nbr_addr == prev.bd_router && nbr_addr != current.bd_router || // Backup -> Non Backup
        prev.priority != current.priority // Priority changed
}

pub fn ospf_hello_recv(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    router_id: &Ipv4Addr,
    hello: &OspfHello,
    init: bool,
) {
    ospf_pdu_handler!(Hello, Recv);
    ospf_pkt_trace!(
        oi.tracing,
        "[Hello] recv from {} ({}) on {}",
        nbr.addr(),
        router_id,
        oi.name
    );

    // Remember identity.
    let prev = nbr.ident;

    // Update identity.
    nbr.ident.router_id = *router_id;
    nbr.ident.priority = hello.priority;
    nbr.ident.d_router = hello.d_router;
    nbr.ident.bd_router = hello.bd_router;

    ospf_nfsm(oi, nbr, NfsmEvent::HelloReceived);

    if !ospf_hello_twoway_check(oi.router_id, hello) {
        ospf_nfsm(oi, nbr, NfsmEvent::OneWayReceived);
        return;
    }
    ospf_nfsm(oi, nbr, NfsmEvent::TwoWayReceived);
    nbr.options = (nbr.options.into_bits() | hello.options.into_bits()).into();

    if oi.state == IfsmState::Waiting {
        let addr = nbr.addr();
        if addr == hello.bd_router || (addr == hello.d_router && hello.bd_router.is_unspecified())
        {
            let _ = oi.tx.send(Message::Ifsm(oi.ifindex, IfsmEvent::BackupSeen));
        }
    }

    if !init && ospf_hello_is_nbr_changed(nbr, &prev) {
        let _ = oi
            .tx
            .send(Message::Ifsm(oi.ifindex, IfsmEvent::NeighborChange));
    }
}

pub fn ospf_db_desc_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    ospf_pdu_handler!(Dd, Send);

    let mut dd = OspfDbDesc {
        if_mtu: oi.mtu,
        seqnum: nbr.dd.seqnum,
        ..Default::default()
    };
    dd.options.set_external(true);

    // LSA headers only after negotiation.
    if nbr.state >= NfsmState::Exchange {
        let count = ospf_db_desc_max(oi.mtu).min(nbr.db_sum.len());
        dd.lsa_headers = nbr.db_sum.drain(..count).collect();
        if nbr.db_sum.is_empty() {
            nbr.dd.flags.set_more(false);
        }
    }
    dd.flags = nbr.dd.flags;

    ospf_pkt_trace!(
        oi.tracing,
        "[DD] send to {} on {}: flags {}{}{} seq {:08x} headers {}",
        nbr.ident.router_id,
        oi.name,
        if dd.flags.init() { "I" } else { "-" },
        if dd.flags.more() { "M" } else { "-" },
        if dd.flags.master() { "MS" } else { "-" },
        dd.seqnum,
        dd.lsa_headers.len()
    );

    let packet = oi.packet(Ospfv2Payload::DbDesc(dd));
    nbr.dd.last_sent = Some(packet.clone());
    nbr.timer.db_desc = 0;
    oi.send(packet, Some(nbr.addr()));
}

/// Resend the last DD verbatim.
pub fn ospf_db_desc_resend(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    nbr.timer.db_desc = 0;
    match nbr.dd.last_sent.clone() {
        Some(packet) => oi.send(packet, Some(nbr.addr())),
        None => ospf_db_desc_send(oi, nbr),
    }
}

fn ospf_db_desc_proc(oi: &mut OspfInterface, nbr: &mut Neighbor, dd: &OspfDbDesc) {
    for lsah in dd.lsa_headers.iter() {
        if !lsa_type_valid(lsah.ls_type) {
            ospf_warn!(
                "DD from {} carries invalid LS type {}",
                nbr.ident.router_id,
                u8::from(lsah.ls_type)
            );
            ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
            return;
        }
        let key = LsaKey::from(lsah);
        let need = match oi.lsa_lookup(&key) {
            Some(lsa) => lsa_compare(lsah, &lsa.h).is_gt(),
            None => true,
        };
        if need {
            if let Err(err) = nbr.ls_req_add(lsah) {
                ospf_warn!("Neighbor {}: {}", nbr.ident.router_id, err);
            }
        }
    }
    nbr.dd.recv = dd.clone();

    if nbr.is_master() {
        nbr.dd.seqnum = nbr.dd.seqnum.wrapping_add(1);

        // When both side does not have more, exchange is done.
        if !dd.flags.more() && !nbr.dd.flags.more() {
            ospf_nfsm(oi, nbr, NfsmEvent::ExchangeDone);
        } else {
            ospf_db_desc_send(oi, nbr);
        }
    } else {
        // Slave echoes the master's sequence number.
        nbr.dd.seqnum = dd.seqnum;
        ospf_db_desc_send(oi, nbr);

        if !dd.flags.more() && !nbr.dd.flags.more() {
            ospf_nfsm(oi, nbr, NfsmEvent::ExchangeDone);
        }
    }
}

fn is_dd_dup(dd: &OspfDbDesc, prev: &OspfDbDesc) -> bool {
    dd.options == prev.options && dd.flags == prev.flags && dd.seqnum == prev.seqnum
}

pub fn ospf_db_desc_recv(oi: &mut OspfInterface, nbr: &mut Neighbor, dd: &OspfDbDesc) {
    use NfsmState::*;
    ospf_pdu_handler!(Dd, Recv);
    ospf_pkt_trace!(
        oi.tracing,
        "[DD] recv from {} on {}: flags {}{}{} seq {:08x} headers {}",
        nbr.ident.router_id,
        oi.name,
        if dd.flags.init() { "I" } else { "-" },
        if dd.flags.more() { "M" } else { "-" },
        if dd.flags.master() { "MS" } else { "-" },
        dd.seqnum,
        dd.lsa_headers.len()
    );

    // MTU check.
    if dd.if_mtu > oi.mtu {
        ospf_warn!(
            "DD from {} on {}: MTU {} exceeds ours {}",
            nbr.ident.router_id,
            oi.name,
            dd.if_mtu,
            oi.mtu
        );
        return;
    }

    match nbr.state {
        Down | Attempt => {
            return;
        }
        Init | TwoWay => {
            nbr.flags.set_dd_init(true);
            let event = match nbr.state {
                Init => NfsmEvent::TwoWayReceived,
                _ => NfsmEvent::AdjOk,
            };
            ospf_nfsm(oi, nbr, event);
            if nbr.state != ExStart {
                nbr.flags.set_dd_init(false);
                return;
            }
        }
        _ => {
            // Fall through to next match.
        }
    }

    match nbr.state {
        Down | Attempt | Init | TwoWay => {
            // Already handled.
        }
        ExStart => {
            if dd.flags.is_all()
                && dd.lsa_headers.is_empty()
                && nbr.ident.router_id > *oi.router_id
            {
                ospf_debug!("DD negotiation with {}: slave", nbr.ident.router_id);
                nbr.dd.seqnum = dd.seqnum;
                nbr.dd.flags.set_master(false);
                nbr.dd.flags.set_init(false);
            } else if !dd.flags.master()
                && !dd.flags.init()
                && dd.seqnum == nbr.dd.seqnum
                && nbr.ident.router_id < *oi.router_id
            {
                ospf_debug!("DD negotiation with {}: master", nbr.ident.router_id);
                nbr.dd.flags.set_init(false);
            } else {
                ospf_debug!("DD negotiation with {} ignored", nbr.ident.router_id);
                return;
            }
            nbr.flags.set_dd_init(false);
            nbr.options = dd.options;
            ospf_nfsm(oi, nbr, NfsmEvent::NegotiationDone);

            ospf_db_desc_proc(oi, nbr, dd);
        }
        Exchange => {
            if is_dd_dup(dd, &nbr.dd.recv) {
                if !nbr.is_master() {
                    ospf_db_desc_resend(oi, nbr);
                }
                return;
            }
            if dd.flags.master() == nbr.is_master() {
                ospf_debug!("DD from {}: MS-bit mismatch", nbr.ident.router_id);
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
                return;
            }
            if dd.flags.init() {
                ospf_debug!("DD from {}: I-bit set", nbr.ident.router_id);
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
                return;
            }
            if dd.options != nbr.options {
                ospf_debug!("DD from {}: options changed", nbr.ident.router_id);
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
                return;
            }
            let expected = if nbr.is_master() {
                nbr.dd.seqnum
            } else {
                nbr.dd.seqnum.wrapping_add(1)
            };
            if dd.seqnum != expected {
                ospf_debug!(
                    "DD from {}: sequence number {:08x} expected {:08x}",
                    nbr.ident.router_id,
                    dd.seqnum,
                    expected
                );
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
                return;
            }

            ospf_db_desc_proc(oi, nbr, dd);
        }
        Loading | Full => {
            if is_dd_dup(dd, &nbr.dd.recv) {
                if !nbr.is_master() {
                    ospf_db_desc_resend(oi, nbr);
                }
                return;
            }
            ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch);
        }
    }
}
