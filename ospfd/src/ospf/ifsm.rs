use std::fmt::Display;
use std::net::Ipv4Addr;

use super::ident::Identity;
use super::inst::Message;
use super::link::OspfLink;
use super::nfsm::{NfsmEvent, NfsmState};
use super::packet::ospf_hello_send;
use super::tracing::OspfTracing;
use crate::{ospf_event_trace, ospf_fsm_trace, ospf_info};

// Interface state machine.
#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Copy)]
pub enum IfsmState {
    Down,
    Waiting,
    PointToPoint,
    DROther,
    Backup,
    DR,
}

impl Display for IfsmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use IfsmState::*;
        let state = match self {
            Down => "Down",
            Waiting => "Waiting",
            PointToPoint => "Point-To-Point",
            DROther => "DROther",
            Backup => "Backup",
            DR => "DR",
        };
        write!(f, "{state}")
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IfsmEvent {
    InterfaceUp,
    WaitTimer,
    BackupSeen,
    NeighborChange,
    InterfaceDown,
}

impl Display for IfsmEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type IfsmFunc = fn(&mut OspfLink) -> Option<IfsmState>;

impl IfsmState {
    pub fn fsm(&self, ev: IfsmEvent) -> (IfsmFunc, Option<Self>) {
        use IfsmEvent::*;
        use IfsmState::*;

        match self {
            Down => match ev {
                InterfaceUp => (ospf_ifsm_interface_up, None),
                WaitTimer => (ospf_ifsm_ignore, Some(Down)),
                BackupSeen => (ospf_ifsm_ignore, Some(Down)),
                NeighborChange => (ospf_ifsm_ignore, Some(Down)),
                InterfaceDown => (ospf_ifsm_ignore, Some(Down)),
            },
            Waiting => match ev {
                InterfaceUp => (ospf_ifsm_ignore, Some(Waiting)),
                WaitTimer => (ospf_ifsm_dr_election, None),
                BackupSeen => (ospf_ifsm_dr_election, None),
                NeighborChange => (ospf_ifsm_ignore, Some(Waiting)),
                InterfaceDown => (ospf_ifsm_interface_down, Some(Down)),
            },
            PointToPoint => match ev {
                InterfaceUp => (ospf_ifsm_ignore, Some(PointToPoint)),
                WaitTimer => (ospf_ifsm_ignore, Some(PointToPoint)),
                BackupSeen => (ospf_ifsm_ignore, Some(PointToPoint)),
                NeighborChange => (ospf_ifsm_ignore, Some(PointToPoint)),
                InterfaceDown => (ospf_ifsm_interface_down, Some(Down)),
            },
            DROther => match ev {
                InterfaceUp => (ospf_ifsm_ignore, Some(DROther)),
                WaitTimer => (ospf_ifsm_ignore, Some(DROther)),
                BackupSeen => (ospf_ifsm_ignore, Some(DROther)),
                NeighborChange => (ospf_ifsm_dr_election, None),
                InterfaceDown => (ospf_ifsm_interface_down, Some(Down)),
            },
            Backup => match ev {
                InterfaceUp => (ospf_ifsm_ignore, Some(Backup)),
                WaitTimer => (ospf_ifsm_ignore, Some(Backup)),
                BackupSeen => (ospf_ifsm_ignore, Some(Backup)),
                NeighborChange => (ospf_ifsm_dr_election, None),
                InterfaceDown => (ospf_ifsm_interface_down, Some(Down)),
            },
            DR => match ev {
                InterfaceUp => (ospf_ifsm_ignore, Some(DR)),
                WaitTimer => (ospf_ifsm_ignore, Some(DR)),
                BackupSeen => (ospf_ifsm_ignore, Some(DR)),
                NeighborChange => (ospf_ifsm_dr_election, None),
                InterfaceDown => (ospf_ifsm_interface_down, Some(Down)),
            },
        }
    }
}

pub fn ospf_ifsm_ignore(_link: &mut OspfLink) -> Option<IfsmState> {
    None
}

pub fn ospf_ifsm_interface_up(link: &mut OspfLink) -> Option<IfsmState> {
    link.ident.d_router = Ipv4Addr::UNSPECIFIED;
    link.ident.bd_router = Ipv4Addr::UNSPECIFIED;
    link.timer.hello = 0;
    link.timer.wait = 0;

    if !link.is_passive() {
        ospf_hello_send(link);
    }

    if link.is_pointopoint() {
        Some(IfsmState::PointToPoint)
    } else if !link.ident.is_eligible() || link.is_passive() {
        Some(IfsmState::DROther)
    } else {
        Some(IfsmState::Waiting)
    }
}

pub fn ospf_ifsm_interface_down(link: &mut OspfLink) -> Option<IfsmState> {
    // Neighbors go away with the interface.
    link.nbrs.clear();
    link.ident.d_router = Ipv4Addr::UNSPECIFIED;
    link.ident.bd_router = Ipv4Addr::UNSPECIFIED;
    link.flags.set_hello_sent(false);
    link.dr_reachable_update();
    None
}

fn ospf_elect_best<'a>(cands: impl Iterator<Item = &'a Identity>) -> Option<&'a Identity> {
    cands.max_by_key(|c| c.rank())
}

fn ospf_elect_bdr(cands: &[Identity]) -> Ipv4Addr {
    let declared = ospf_elect_best(
        cands
            .iter()
            .filter(|c| !c.is_declared_dr() && c.is_declared_bdr()),
    );
    declared
        .or_else(|| ospf_elect_best(cands.iter().filter(|c| !c.is_declared_dr())))
        .map(|c| c.addr())
        .unwrap_or(Ipv4Addr::UNSPECIFIED)
}

fn ospf_elect_dr(cands: &[Identity], bdr: Ipv4Addr) -> Ipv4Addr {
    ospf_elect_best(cands.iter().filter(|c| c.is_declared_dr()))
        .map(|c| c.addr())
        .unwrap_or(bdr)
}

fn ospf_elect_candidates(link: &OspfLink) -> Vec<Identity> {
    let mut cands = Vec::new();
    if link.ident.is_eligible() {
        cands.push(link.ident);
    }
    for nbr in link.nbrs.values() {
        if nbr.state >= NfsmState::TwoWay && nbr.ident.is_eligible() {
            cands.push(nbr.ident);
        }
    }
    cands
}

fn ospf_elect_state(link: &OspfLink) -> IfsmState {
    if link.ident.is_declared_dr() {
        IfsmState::DR
    } else if link.ident.is_declared_bdr() {
        IfsmState::Backup
    } else {
        IfsmState::DROther
    }
}

fn ospf_elect_pass(link: &mut OspfLink) -> IfsmState {
    let cands = ospf_elect_candidates(link);
    let bdr = ospf_elect_bdr(&cands);
    let dr = ospf_elect_dr(&cands, bdr);
    link.ident.bd_router = bdr;
    link.ident.d_router = dr;
    ospf_elect_state(link)
}

pub fn ospf_ifsm_dr_election(link: &mut OspfLink) -> Option<IfsmState> {
    let prev = link.ident;
    let old_state = link.state;

    let mut new_state = ospf_elect_pass(link);

    // Our own role changed: run the election once more with the new
    // declaration.
    if new_state != old_state
        && !(new_state == IfsmState::DROther && old_state < IfsmState::DROther)
    {
        new_state = ospf_elect_pass(link);
    }

    if prev.d_router != link.ident.d_router || prev.bd_router != link.ident.bd_router {
        for nbr in link.nbrs.values() {
            if nbr.state >= NfsmState::TwoWay {
                link.event(Message::Nfsm(link.index, nbr.addr(), NfsmEvent::AdjOk));
            }
        }
        link.event(Message::LsaOriginate);
    }

    Some(new_state)
}

fn ospf_ifsm_change_state(link: &mut OspfLink, state: IfsmState) {
    link.ostate = link.state;
    link.state = state;
    link.state_change += 1;

    if state == IfsmState::Waiting {
        link.timer.wait = 0;
    }
    link.dr_reachable_update();
    link.event(Message::LsaOriginate);
}

pub fn ospf_ifsm(link: &mut OspfLink, event: IfsmEvent, tracing: &OspfTracing) {
    let (fsm_func, fsm_next_state) = link.state.fsm(event);

    let next_state = fsm_func(link).or(fsm_next_state);

    if matches!(event, IfsmEvent::WaitTimer | IfsmEvent::BackupSeen | IfsmEvent::NeighborChange) {
        ospf_event_trace!(
            tracing,
            DrElection,
            "DR election on {}: DR {} BDR {}",
            link.name,
            link.ident.d_router,
            link.ident.bd_router
        );
    }

    if let Some(new_state) = next_state {
        if new_state != link.state {
            ospf_fsm_trace!(
                tracing,
                Ifsm,
                false,
                "IFSM {}: {} -> {} by {}",
                link.name,
                link.state,
                new_state,
                event
            );
            if new_state == IfsmState::Down || link.state == IfsmState::Down {
                ospf_info!("Interface {} {} -> {}", link.name, link.state, new_state);
            }
            ospf_ifsm_change_state(link, new_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterfaceConfig, NetworkType};
    use crate::ospf::neigh::Neighbor;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct TestLink {
        link: OspfLink,
        rx: UnboundedReceiver<Message>,
        prx: UnboundedReceiver<Message>,
    }

    fn link(addr: &str, rid: &str, priority: u8) -> TestLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ptx, prx) = mpsc::unbounded_channel();
        let mut config = InterfaceConfig::new("eth0", addr.parse().unwrap(), Ipv4Addr::UNSPECIFIED);
        config.priority = priority;
        let link = OspfLink::from(&config, 1, rid.parse().unwrap(), tx, ptx);
        TestLink { link, rx, prx }
    }

    fn nbr_add(link: &mut OspfLink, addr: &str, rid: &str, priority: u8, state: NfsmState) {
        let prefix = format!("{}/24", addr).parse().unwrap();
        let mut nbr = Neighbor::new(1, prefix, &rid.parse().unwrap(), 0);
        nbr.ident.priority = priority;
        nbr.state = state;
        link.nbrs.insert(addr.parse().unwrap(), nbr);
    }

    #[test]
    fn interface_up_states() {
        let tracing = OspfTracing::default();

        let mut t = link("10.0.0.1/24", "1.1.1.1", 1);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        assert_eq!(t.link.state, IfsmState::Waiting);
        // Hello goes out immediately.
        assert!(matches!(t.prx.try_recv(), Ok(Message::Send(_, 1, None))));
        assert!(t.link.flags.hello_sent());

        let mut t = link("10.0.0.1/24", "1.1.1.1", 0);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        assert_eq!(t.link.state, IfsmState::DROther);

        let mut t = link("10.0.0.1/30", "1.1.1.1", 1);
        t.link.config.network_type = NetworkType::PointToPoint;
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        assert_eq!(t.link.state, IfsmState::PointToPoint);
        // Already up.
        ospf_ifsm(&mut t.link, IfsmEvent::WaitTimer, &tracing);
        assert_eq!(t.link.state, IfsmState::PointToPoint);
    }

    #[test]
    fn highest_router_id_becomes_dr() {
        let tracing = OspfTracing::default();
        let mut t = link("10.0.0.2/24", "2.2.2.2", 1);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        nbr_add(&mut t.link, "10.0.0.1", "1.1.1.1", 1, NfsmState::TwoWay);

        ospf_ifsm(&mut t.link, IfsmEvent::WaitTimer, &tracing);
        assert_eq!(t.link.state, IfsmState::DR);
        assert_eq!(t.link.ident.d_router, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(t.link.ident.bd_router, Ipv4Addr::new(10, 0, 0, 1));

        // Neighbors at 2-Way are re-evaluated for adjacency.
        let mut adj_ok = false;
        while let Ok(msg) = t.rx.try_recv() {
            if let Message::Nfsm(1, addr, NfsmEvent::AdjOk) = msg {
                assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 1));
                adj_ok = true;
            }
        }
        assert!(adj_ok);
    }

    #[test]
    fn declared_dr_is_kept() {
        let tracing = OspfTracing::default();
        let mut t = link("10.0.0.9/24", "9.9.9.9", 1);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        nbr_add(&mut t.link, "10.0.0.1", "1.1.1.1", 1, NfsmState::TwoWay);
        if let Some(nbr) = t.link.nbrs.get_mut(&Ipv4Addr::new(10, 0, 0, 1)) {
            nbr.ident.d_router = Ipv4Addr::new(10, 0, 0, 1);
        }
        // Ineligible and one-way neighbors do not take part.
        nbr_add(&mut t.link, "10.0.0.5", "5.5.5.5", 0, NfsmState::TwoWay);
        nbr_add(&mut t.link, "10.0.0.7", "7.7.7.7", 1, NfsmState::Init);

        ospf_ifsm(&mut t.link, IfsmEvent::BackupSeen, &tracing);
        assert_eq!(t.link.ident.d_router, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(t.link.ident.bd_router, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(t.link.state, IfsmState::Backup);
    }

    #[test]
    fn interface_down_clears_neighbors() {
        let tracing = OspfTracing::default();
        let mut t = link("10.0.0.1/24", "1.1.1.1", 1);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceUp, &tracing);
        nbr_add(&mut t.link, "10.0.0.2", "2.2.2.2", 1, NfsmState::Full);
        ospf_ifsm(&mut t.link, IfsmEvent::InterfaceDown, &tracing);
        assert_eq!(t.link.state, IfsmState::Down);
        assert!(t.link.nbrs.is_empty());
    }
}
