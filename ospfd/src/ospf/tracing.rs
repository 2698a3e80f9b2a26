// OSPF conditional tracing.
//
// Fine grained switches for packet, event, FSM and database tracing. The
// switches are filled from the `tracing` section of the YAML configuration.

use std::str::FromStr;

use strum_macros::{Display, EnumString};

use crate::config::TracingConfig;
use crate::ospf_warn;

#[derive(Debug, Clone, Default)]
pub struct OspfTracing {
    // Enable all OSPF tracing
    pub all: bool,
    pub packet: PacketTracing,
    pub event: EventTracing,
    pub fsm: FsmTracing,
    pub database: DatabaseTracing,
}

#[derive(Debug, Clone, Default)]
pub struct PacketTracing {
    pub hello: PacketConfig,
    pub dd: PacketConfig,
    pub ls_req: PacketConfig,
    pub ls_update: PacketConfig,
    pub ls_ack: PacketConfig,
    pub all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PacketConfig {
    pub enabled: bool,
    pub direction: PacketDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, EnumString)]
pub enum PacketDirection {
    #[strum(serialize = "send")]
    Send,
    #[strum(serialize = "recv", serialize = "receive")]
    Recv,
    #[default]
    #[strum(serialize = "both")]
    Both,
}

impl PacketDirection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PacketDirection::Send => "Send",
            PacketDirection::Recv => "Receive",
            PacketDirection::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventTracing {
    pub dr_election: bool,
    pub lsa_originate: bool,
    pub lsa_flush: bool,
    pub spf_calculation: bool,
    pub adjacency: bool,
    pub flooding: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FsmTracing {
    pub ifsm: FsmConfig,
    pub nfsm: FsmConfig,
    pub all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FsmConfig {
    pub enabled: bool,
    pub detail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseTracing {
    pub lsdb: bool,
    pub spf_tree: bool,
    pub route: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
pub enum PacketType {
    #[strum(serialize = "hello")]
    Hello,
    #[strum(serialize = "dd")]
    Dd,
    #[strum(serialize = "ls-request", serialize = "ls-req")]
    LsRequest,
    #[strum(serialize = "ls-update")]
    LsUpdate,
    #[strum(serialize = "ls-ack")]
    LsAck,
}

impl PacketType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PacketType::Hello => "Hello",
            PacketType::Dd => "DD",
            PacketType::LsRequest => "LSRequest",
            PacketType::LsUpdate => "LSUpdate",
            PacketType::LsAck => "LSAck",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
pub enum EventType {
    #[strum(serialize = "dr-election")]
    DrElection,
    #[strum(serialize = "lsa-originate")]
    LsaOriginate,
    #[strum(serialize = "lsa-flush")]
    LsaFlush,
    #[strum(serialize = "spf-calculation")]
    SpfCalculation,
    #[strum(serialize = "adjacency")]
    Adjacency,
    #[strum(serialize = "flooding")]
    Flooding,
}

#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
pub enum FsmType {
    #[strum(serialize = "ifsm")]
    Ifsm,
    #[strum(serialize = "nfsm")]
    Nfsm,
}

#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
pub enum DatabaseType {
    #[strum(serialize = "lsdb")]
    Lsdb,
    #[strum(serialize = "spf-tree")]
    SpfTree,
    #[strum(serialize = "route")]
    Route,
}

impl OspfTracing {
    pub fn should_trace_packet(&self, packet_type: PacketType, direction: PacketDirection) -> bool {
        if self.all || self.packet.all {
            return true;
        }
        let config = match packet_type {
            PacketType::Hello => &self.packet.hello,
            PacketType::Dd => &self.packet.dd,
            PacketType::LsRequest => &self.packet.ls_req,
            PacketType::LsUpdate => &self.packet.ls_update,
            PacketType::LsAck => &self.packet.ls_ack,
        };
        if !config.enabled {
            return false;
        }
        config.direction == PacketDirection::Both || config.direction == direction
    }

    pub fn should_trace_event(&self, event_type: EventType) -> bool {
        if self.all || self.event.all {
            return true;
        }
        match event_type {
            EventType::DrElection => self.event.dr_election,
            EventType::LsaOriginate => self.event.lsa_originate,
            EventType::LsaFlush => self.event.lsa_flush,
            EventType::SpfCalculation => self.event.spf_calculation,
            EventType::Adjacency => self.event.adjacency,
            EventType::Flooding => self.event.flooding,
        }
    }

    pub fn should_trace_fsm(&self, fsm_type: FsmType, detail: bool) -> bool {
        if self.all || self.fsm.all {
            return true;
        }
        let config = match fsm_type {
            FsmType::Ifsm => &self.fsm.ifsm,
            FsmType::Nfsm => &self.fsm.nfsm,
        };
        config.enabled && (!detail || config.detail)
    }

    pub fn should_trace_database(&self, db_type: DatabaseType) -> bool {
        if self.all || self.database.all {
            return true;
        }
        match db_type {
            DatabaseType::Lsdb => self.database.lsdb,
            DatabaseType::SpfTree => self.database.spf_tree,
            DatabaseType::Route => self.database.route,
        }
    }

    fn packet_config_mut(&mut self, typ: PacketType) -> &mut PacketConfig {
        match typ {
            PacketType::Hello => &mut self.packet.hello,
            PacketType::Dd => &mut self.packet.dd,
            PacketType::LsRequest => &mut self.packet.ls_req,
            PacketType::LsUpdate => &mut self.packet.ls_update,
            PacketType::LsAck => &mut self.packet.ls_ack,
        }
    }

    fn set_event(&mut self, typ: EventType) {
        match typ {
            EventType::DrElection => self.event.dr_election = true,
            EventType::LsaOriginate => self.event.lsa_originate = true,
            EventType::LsaFlush => self.event.lsa_flush = true,
            EventType::SpfCalculation => self.event.spf_calculation = true,
            EventType::Adjacency => self.event.adjacency = true,
            EventType::Flooding => self.event.flooding = true,
        }
    }

    fn set_database(&mut self, typ: DatabaseType) {
        match typ {
            DatabaseType::Lsdb => self.database.lsdb = true,
            DatabaseType::SpfTree => self.database.spf_tree = true,
            DatabaseType::Route => self.database.route = true,
        }
    }
}

impl From<&TracingConfig> for OspfTracing {
    fn from(config: &TracingConfig) -> Self {
        let mut tracing = OspfTracing {
            all: config.all,
            ..Default::default()
        };
        for packet in config.packet.iter() {
            let direction = packet
                .direction
                .as_deref()
                .and_then(|d| PacketDirection::from_str(d).ok())
                .unwrap_or_default();
            if packet.typ == "all" {
                tracing.packet.all = direction == PacketDirection::Both;
                for typ in [
                    PacketType::Hello,
                    PacketType::Dd,
                    PacketType::LsRequest,
                    PacketType::LsUpdate,
                    PacketType::LsAck,
                ] {
                    *tracing.packet_config_mut(typ) = PacketConfig {
                        enabled: true,
                        direction,
                    };
                }
                continue;
            }
            match PacketType::from_str(&packet.typ) {
                Ok(typ) => {
                    *tracing.packet_config_mut(typ) = PacketConfig {
                        enabled: true,
                        direction,
                    };
                }
                Err(_) => {
                    ospf_warn!("Unknown packet type for tracing: {}", packet.typ);
                }
            }
        }
        for event in config.event.iter() {
            if event == "all" {
                tracing.event.all = true;
            } else if let Ok(typ) = EventType::from_str(event) {
                tracing.set_event(typ);
            } else {
                ospf_warn!("Unknown event type for tracing: {}", event);
            }
        }
        for fsm in config.fsm.iter() {
            match fsm.as_str() {
                "all" => tracing.fsm.all = true,
                "ifsm-detail" => tracing.fsm.ifsm = FsmConfig { enabled: true, detail: true },
                "nfsm-detail" => tracing.fsm.nfsm = FsmConfig { enabled: true, detail: true },
                _ => match FsmType::from_str(fsm) {
                    Ok(FsmType::Ifsm) => tracing.fsm.ifsm.enabled = true,
                    Ok(FsmType::Nfsm) => tracing.fsm.nfsm.enabled = true,
                    Err(_) => ospf_warn!("Unknown fsm type for tracing: {}", fsm),
                },
            }
        }
        for db in config.database.iter() {
            if db == "all" {
                tracing.database.all = true;
            } else if let Ok(typ) = DatabaseType::from_str(db) {
                tracing.set_database(typ);
            } else {
                ospf_warn!("Unknown database type for tracing: {}", db);
            }
        }
        tracing
    }
}

// Log an info-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_info {
    ($($arg:tt)*) => {
        ::tracing::info!(proto = "ospf", $($arg)*)
    };
}

// Log a warning-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!(proto = "ospf", $($arg)*)
    };
}

// Log an error-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_error {
    ($($arg:tt)*) => {
        ::tracing::error!(proto = "ospf", $($arg)*)
    };
}

// Log a debug-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!(proto = "ospf", $($arg)*)
    };
}

// Log a trace-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_trace {
    ($($arg:tt)*) => {
        ::tracing::trace!(proto = "ospf", $($arg)*)
    };
}

// Conditional event tracing macro
#[macro_export]
macro_rules! ospf_event_trace {
    ($tracing:expr, $event_type:ident, $($arg:tt)*) => {
        if $tracing.should_trace_event($crate::ospf::tracing::EventType::$event_type) {
            ::tracing::info!(
                proto = "ospf",
                category = "event",
                event_type = stringify!($event_type),
                $($arg)*
            )
        }
    };
}

// Conditional FSM tracing macro
#[macro_export]
macro_rules! ospf_fsm_trace {
    ($tracing:expr, $fsm_type:ident, $detail:expr, $($arg:tt)*) => {
        if $tracing.should_trace_fsm(
            $crate::ospf::tracing::FsmType::$fsm_type,
            $detail
        ) {
            ::tracing::info!(
                proto = "ospf",
                category = "fsm",
                fsm_type = stringify!($fsm_type),
                detail = $detail,
                $($arg)*
            )
        }
    };
}

// Conditional database tracing macro
#[macro_export]
macro_rules! ospf_database_trace {
    ($tracing:expr, $db_type:ident, $($arg:tt)*) => {
        if $tracing.should_trace_database($crate::ospf::tracing::DatabaseType::$db_type) {
            ::tracing::info!(
                proto = "ospf",
                category = "database",
                db_type = stringify!($db_type),
                $($arg)*
            )
        }
    };
}

// Defines the packet type and direction of a handler for `ospf_pkt_trace!`.
//
// Usage:
// ```ignore
// ospf_pdu_handler!(Hello, Recv);
// ospf_pkt_trace!(oi.tracing, "[Hello] recv on {}", oi.name);
// ```
#[macro_export]
macro_rules! ospf_pdu_handler {
    ($packet_type:ident, $direction:ident) => {
        const _OSPF_PKT_TYPE: $crate::ospf::tracing::PacketType =
            $crate::ospf::tracing::PacketType::$packet_type;
        const _OSPF_PKT_DIR: $crate::ospf::tracing::PacketDirection =
            $crate::ospf::tracing::PacketDirection::$direction;
    };
}

// Packet tracing with the context defined by `ospf_pdu_handler!` in the same
// scope.
#[macro_export]
macro_rules! ospf_pkt_trace {
    ($tracing:expr, $($arg:tt)*) => {
        if $tracing.should_trace_packet(_OSPF_PKT_TYPE, _OSPF_PKT_DIR) {
            ::tracing::info!(
                proto = "ospf",
                category = "packet",
                packet_type = _OSPF_PKT_TYPE.as_str(),
                direction = _OSPF_PKT_DIR.as_str(),
                $($arg)*
            )
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacketTraceConfig;

    #[test]
    fn tracing_from_config() {
        let config = TracingConfig {
            all: false,
            packet: vec![
                PacketTraceConfig {
                    typ: "hello".into(),
                    direction: Some("recv".into()),
                },
                PacketTraceConfig {
                    typ: "ls-update".into(),
                    direction: None,
                },
            ],
            event: vec!["spf-calculation".into()],
            fsm: vec!["nfsm-detail".into()],
            database: vec!["bogus".into()],
        };
        let tracing = OspfTracing::from(&config);

        assert!(tracing.should_trace_packet(PacketType::Hello, PacketDirection::Recv));
        assert!(!tracing.should_trace_packet(PacketType::Hello, PacketDirection::Send));
        assert!(tracing.should_trace_packet(PacketType::LsUpdate, PacketDirection::Send));
        assert!(!tracing.should_trace_packet(PacketType::Dd, PacketDirection::Recv));

        assert!(tracing.should_trace_event(EventType::SpfCalculation));
        assert!(!tracing.should_trace_event(EventType::Flooding));

        assert!(tracing.should_trace_fsm(FsmType::Nfsm, true));
        assert!(!tracing.should_trace_fsm(FsmType::Ifsm, false));

        assert!(!tracing.should_trace_database(DatabaseType::Lsdb));
    }

    #[test]
    fn tracing_all() {
        let tracing = OspfTracing {
            all: true,
            ..Default::default()
        };
        assert!(tracing.should_trace_packet(PacketType::LsAck, PacketDirection::Send));
        assert!(tracing.should_trace_database(DatabaseType::Route));
    }
}
