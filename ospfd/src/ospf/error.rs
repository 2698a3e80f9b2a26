use std::net::Ipv4Addr;

use ospf_packet::OspfParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OspfError {
    #[error("{list} list is full (limit {limit})")]
    ListFull { list: &'static str, limit: usize },

    #[error("LSDB is full (limit {limit})")]
    LsdbFull { limit: usize },

    #[error("Unknown interface: {0}")]
    UnknownInterface(String),

    #[error("Area {0} not found")]
    AreaNotFound(Ipv4Addr),

    #[error("No nexthop for {0}")]
    NoNexthop(String),

    #[error("Packet parse error: {0}")]
    Parse(#[from] OspfParseError),
}

pub type OspfResult<T> = Result<T, OspfError>;
