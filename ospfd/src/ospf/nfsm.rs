use std::fmt::Display;

use rand::Rng;

use super::flood::ospf_ls_req_send;
use super::ifsm::IfsmEvent;
use super::inst::{Message, OspfInterface};
use super::neigh::Neighbor;
use super::packet::ospf_db_desc_send;
use crate::{ospf_fsm_trace, ospf_info};

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Copy)]
pub enum NfsmState {
    Down,
    Attempt,
    Init,
    TwoWay,
    ExStart,
    Exchange,
    Loading,
    Full,
}

impl Display for NfsmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use NfsmState::*;
        let state = match self {
            Down => "Down",
            Attempt => "Attempt",
            Init => "Init",
            TwoWay => "2-Way",
            ExStart => "ExStart",
            Exchange => "Exchange",
            Loading => "Loading",
            Full => "Full",
        };
        write!(f, "{state}")
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NfsmEvent {
    HelloReceived,
    Start,
    TwoWayReceived,
    NegotiationDone,
    ExchangeDone,
    BadLSReq,
    LoadingDone,
    AdjOk,
    AdjNo,
    SeqNumberMismatch,
    OneWayReceived,
    KillNbr,
    InactivityTimer,
    LLDown,
}

impl Display for NfsmEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type NfsmFunc = fn(&mut OspfInterface, &mut Neighbor) -> Option<NfsmState>;

impl NfsmState {
    pub fn fsm(&self, ev: NfsmEvent) -> (NfsmFunc, Option<Self>) {
        use NfsmEvent::*;
        use NfsmState::*;

        match self {
            Down => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_start, Some(Attempt)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Down)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Down)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Down)),
                BadLSReq => (ospf_nfsm_ignore, Some(Down)),
                LoadingDone => (ospf_nfsm_ignore, Some(Down)),
                AdjOk => (ospf_nfsm_ignore, Some(Down)),
                AdjNo => (ospf_nfsm_ignore, Some(Down)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Down)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Down)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            Attempt => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_ignore, Some(Attempt)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Attempt)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Attempt)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Attempt)),
                BadLSReq => (ospf_nfsm_ignore, Some(Attempt)),
                LoadingDone => (ospf_nfsm_ignore, Some(Attempt)),
                AdjOk => (ospf_nfsm_ignore, Some(Attempt)),
                AdjNo => (ospf_nfsm_ignore, Some(Attempt)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Attempt)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Attempt)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            Init => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_ignore, Some(Init)),
                TwoWayReceived => (ospf_nfsm_twoway_received, None),
                NegotiationDone => (ospf_nfsm_ignore, Some(Init)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Init)),
                BadLSReq => (ospf_nfsm_ignore, Some(Init)),
                LoadingDone => (ospf_nfsm_ignore, Some(Init)),
                AdjOk => (ospf_nfsm_ignore, Some(Init)),
                AdjNo => (ospf_nfsm_ignore, Some(Init)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Init)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            TwoWay => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(TwoWay)),
                Start => (ospf_nfsm_ignore, Some(TwoWay)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(TwoWay)),
                NegotiationDone => (ospf_nfsm_ignore, Some(TwoWay)),
                ExchangeDone => (ospf_nfsm_ignore, Some(TwoWay)),
                BadLSReq => (ospf_nfsm_ignore, Some(TwoWay)),
                LoadingDone => (ospf_nfsm_ignore, Some(TwoWay)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                AdjNo => (ospf_nfsm_ignore, Some(TwoWay)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(TwoWay)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            ExStart => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(ExStart)),
                Start => (ospf_nfsm_ignore, Some(ExStart)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(ExStart)),
                NegotiationDone => (ospf_nfsm_negotiation_done, Some(Exchange)),
                ExchangeDone => (ospf_nfsm_ignore, Some(ExStart)),
                BadLSReq => (ospf_nfsm_ignore, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(ExStart)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                AdjNo => (ospf_nfsm_adj_no, Some(TwoWay)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            Exchange => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Exchange)),
                Start => (ospf_nfsm_ignore, Some(Exchange)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Exchange)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Exchange)),
                ExchangeDone => (ospf_nfsm_exchange_done, Some(Loading)),
                BadLSReq => (ospf_nfsm_restart, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Exchange)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                AdjNo => (ospf_nfsm_adj_no, Some(TwoWay)),
                SeqNumberMismatch => (ospf_nfsm_restart, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            Loading => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Loading)),
                Start => (ospf_nfsm_ignore, Some(Loading)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Loading)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Loading)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Loading)),
                BadLSReq => (ospf_nfsm_restart, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Full)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                AdjNo => (ospf_nfsm_adj_no, Some(TwoWay)),
                SeqNumberMismatch => (ospf_nfsm_restart, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
            Full => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Full)),
                Start => (ospf_nfsm_ignore, Some(Full)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Full)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Full)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Full)),
                BadLSReq => (ospf_nfsm_restart, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Full)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                AdjNo => (ospf_nfsm_adj_no, Some(TwoWay)),
                SeqNumberMismatch => (ospf_nfsm_restart, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_kill_nbr, Some(Down)),
                LLDown => (ospf_nfsm_kill_nbr, Some(Down)),
            },
        }
    }
}

pub fn ospf_nfsm_reset_nbr(nbr: &mut Neighbor) {
    nbr.lists_clear();
    nbr.timer.db_desc = 0;
    nbr.timer.ls_req = 0;
    nbr.timer.ls_rxmt = 0;
}

/// Whether an adjacency should be formed with this neighbor.
pub fn ospf_nfsm_adj_should(oi: &OspfInterface, nbr: &Neighbor) -> bool {
    if oi.is_pointopoint() {
        return true;
    }
    // I'm DR or BDR.
    if oi.ident.is_declared_dr() || oi.ident.is_declared_bdr() {
        return true;
    }
    // Neighbor is DR or BDR.
    nbr.addr() == oi.ident.d_router || nbr.addr() == oi.ident.bd_router
}

pub fn ospf_nfsm_ignore(_oi: &mut OspfInterface, _nbr: &mut Neighbor) -> Option<NfsmState> {
    None
}

pub fn ospf_nfsm_hello_received(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    // Restart inactivity timer.
    nbr.timer.inactivity = 0;
    None
}

pub fn ospf_nfsm_start(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    nbr.timer.inactivity = 0;
    None
}

pub fn ospf_nfsm_twoway_received(oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    if ospf_nfsm_adj_should(oi, nbr) {
        Some(NfsmState::ExStart)
    } else {
        Some(NfsmState::TwoWay)
    }
}

pub fn ospf_nfsm_negotiation_done(oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    // Database summary list from the area and AS databases.
    nbr.db_sum.clear();
    nbr.db_sum.extend(oi.lsdb.headers());
    nbr.db_sum.extend(oi.lsdb_as.headers());
    None
}

pub fn ospf_nfsm_exchange_done(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    nbr.db_sum.clear();
    None
}

pub fn ospf_nfsm_restart(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(nbr);
    None
}

pub fn ospf_nfsm_adj_ok(oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    let adj_ok = ospf_nfsm_adj_should(oi, nbr);

    if nbr.state == NfsmState::TwoWay && adj_ok {
        Some(NfsmState::ExStart)
    } else if nbr.state >= NfsmState::ExStart && !adj_ok {
        ospf_nfsm_reset_nbr(nbr);
        Some(NfsmState::TwoWay)
    } else {
        Some(nbr.state)
    }
}

pub fn ospf_nfsm_adj_no(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(nbr);
    None
}

pub fn ospf_nfsm_oneway_received(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(nbr);
    None
}

pub fn ospf_nfsm_kill_nbr(_oi: &mut OspfInterface, nbr: &mut Neighbor) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(nbr);
    nbr.ls_ack.clear();
    None
}

fn ospf_nfsm_change_state(oi: &mut OspfInterface, nbr: &mut Neighbor, state: NfsmState) {
    use NfsmState::*;

    nbr.ostate = nbr.state;
    nbr.state = state;
    nbr.state_change += 1;

    if nbr.state < nbr.ostate {
        nbr.options = 0.into();
    }

    // Crossing the 2-Way boundary changes the DR election input.
    if (nbr.ostate < TwoWay) != (nbr.state < TwoWay) {
        let _ = oi
            .tx
            .send(Message::Ifsm(oi.ifindex, IfsmEvent::NeighborChange));
    }

    // Router-LSA (and network-LSA at the DR) depends on full adjacencies.
    if nbr.state == Full || nbr.ostate == Full {
        let _ = oi.tx.send(Message::LsaOriginate);
    }

    match nbr.state {
        ExStart => {
            if nbr.ostate < ExStart {
                *oi.db_desc_in += 1;
            }
            if nbr.dd.seqnum == 0 {
                let mut rng = rand::rng();
                nbr.dd.seqnum = rng.random_range(1..=u32::MAX >> 1);
            } else {
                nbr.dd.seqnum = nbr.dd.seqnum.wrapping_add(1);
            }
            nbr.dd.flags.set_master(true);
            nbr.dd.flags.set_more(true);
            nbr.dd.flags.set_init(true);
            nbr.dd.recv = Default::default();

            ospf_db_desc_send(oi, nbr);
        }
        Loading => {
            if !nbr.ls_req.is_empty() {
                ospf_ls_req_send(oi, nbr);
            }
        }
        _ => {}
    }
}

pub fn ospf_nfsm(oi: &mut OspfInterface, nbr: &mut Neighbor, event: NfsmEvent) {
    // Decompose the result of the state function into the transition function
    // and next state.
    let (fsm_func, fsm_next_state) = nbr.state.fsm(event);

    // The state returned by the action takes priority over the table.
    let next_state = fsm_func(oi, nbr).or(fsm_next_state);

    if let Some(new_state) = next_state {
        if new_state != nbr.state {
            ospf_fsm_trace!(
                oi.tracing,
                Nfsm,
                false,
                "NFSM {} {}: {} -> {} by {}",
                oi.name,
                nbr.ident.router_id,
                nbr.state,
                new_state,
                event
            );
            if new_state == NfsmState::Full || nbr.state == NfsmState::Full {
                ospf_info!(
                    "Adjacency {} {} on {}: {} -> {} ({})",
                    nbr.ident.router_id,
                    nbr.addr(),
                    oi.name,
                    nbr.state,
                    new_state,
                    event
                );
            }
            ospf_nfsm_change_state(oi, nbr, new_state);
        }
    }

    // Nothing to request: loading completes at once.
    if nbr.state == NfsmState::Loading && nbr.ls_req.is_empty() {
        ospf_nfsm(oi, nbr, NfsmEvent::LoadingDone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::inst::tests::{TestInterface, nbr_new};
    use ospf_packet::Ospfv2Payload;

    #[test]
    fn table_noop_pairs() {
        use NfsmEvent::*;
        use NfsmState::*;
        // Events absent from the table leave the state as it is.
        for (state, ev) in [
            (Down, TwoWayReceived),
            (Init, AdjOk),
            (TwoWay, NegotiationDone),
            (ExStart, ExchangeDone),
            (Exchange, LoadingDone),
            (Full, TwoWayReceived),
        ] {
            let (_, next) = state.fsm(ev);
            assert_eq!(next, Some(state));
        }
        assert_eq!(Exchange.fsm(SeqNumberMismatch).1, Some(ExStart));
        assert_eq!(Full.fsm(OneWayReceived).1, Some(Init));
        assert_eq!(Loading.fsm(InactivityTimer).1, Some(Down));
        assert_eq!(Full.fsm(AdjNo).1, Some(TwoWay));
    }

    #[test]
    fn hello_to_twoway_without_adjacency() {
        let mut t = TestInterface::new();
        // Neither side is DR/BDR on a broadcast segment.
        t.ident.d_router = "10.0.0.9".parse().unwrap();
        t.ident.bd_router = "10.0.0.8".parse().unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        let mut oi = t.oi();

        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::HelloReceived);
        assert_eq!(nbr.state, NfsmState::Init);
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::TwoWayReceived);
        assert_eq!(nbr.state, NfsmState::TwoWay);
        // Nothing sent, NeighborChange queued.
        drop(oi);
        assert!(t.sent().is_empty());
        assert!(matches!(
            t.events().as_slice(),
            [Message::Ifsm(1, IfsmEvent::NeighborChange)]
        ));
    }

    #[test]
    fn adjacency_with_dr_enters_exstart() {
        let mut t = TestInterface::new();
        t.ident.d_router = "10.0.0.2".parse().unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        let mut oi = t.oi();

        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::HelloReceived);
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::TwoWayReceived);
        assert_eq!(nbr.state, NfsmState::ExStart);
        assert!(nbr.dd.flags.is_all());
        assert_ne!(nbr.dd.seqnum, 0);
        drop(oi);

        // The initial empty DD goes out at once.
        let sent = t.sent();
        assert_eq!(sent.len(), 1);
        let Message::Send(packet, 1, Some(dst)) = &sent[0] else {
            panic!("unexpected message");
        };
        assert_eq!(*dst, "10.0.0.2".parse::<std::net::Ipv4Addr>().unwrap());
        let Ospfv2Payload::DbDesc(dd) = &packet.payload else {
            panic!("not a DD");
        };
        assert!(dd.flags.is_all());
        assert!(dd.lsa_headers.is_empty());
    }

    #[test]
    fn seq_mismatch_restarts_exchange() {
        let mut t = TestInterface::new();
        t.ident.d_router = "10.0.0.2".parse().unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        let mut oi = t.oi();
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::HelloReceived);
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::TwoWayReceived);
        let seq = nbr.dd.seqnum;
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::NegotiationDone);
        assert_eq!(nbr.state, NfsmState::Exchange);

        nbr.ls_req.push(ospf_packet::OspfLsaHeader::new(
            ospf_packet::OspfLsType::Router,
            "3.3.3.3".parse().unwrap(),
            "3.3.3.3".parse().unwrap(),
        ));
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::SeqNumberMismatch);
        assert_eq!(nbr.state, NfsmState::ExStart);
        assert!(nbr.ls_req.is_empty());
        assert_eq!(nbr.dd.seqnum, seq.wrapping_add(1));
    }

    #[test]
    fn exchange_done_with_empty_request_list_is_full() {
        let mut t = TestInterface::new();
        t.ident.d_router = "10.0.0.2".parse().unwrap();
        let mut nbr = nbr_new("10.0.0.2", "2.2.2.2");
        let mut oi = t.oi();
        nbr.state = NfsmState::Exchange;
        ospf_nfsm(&mut oi, &mut nbr, NfsmEvent::ExchangeDone);
        assert_eq!(nbr.state, NfsmState::Full);
        drop(oi);
        assert!(
            t.events()
                .iter()
                .any(|m| matches!(m, Message::LsaOriginate))
        );
    }
}
