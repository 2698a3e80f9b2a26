pub mod inst;
pub use inst::{Message, Ospf, OspfInterface, ShowCallback, serve};

pub mod area;
pub use area::{OspfArea, OspfAreaMap};

pub mod error;
pub use error::{OspfError, OspfResult};

pub mod ident;
pub use ident::Identity;

pub mod link;
pub use link::OspfLink;

pub mod neigh;
pub use neigh::Neighbor;

pub mod ifsm;
pub use ifsm::{IfsmEvent, IfsmState};

pub mod nfsm;
pub use nfsm::{NfsmEvent, NfsmState};

pub mod lsdb;
pub use lsdb::{LsaKey, Lsdb};

pub mod lsa;

pub mod packet;

pub mod flood;

pub mod spf;

pub mod route;
pub use route::{OspfRoute, RouteTable};

pub mod network;

pub mod socket;

pub mod show;

pub mod tracing;
pub use self::tracing::OspfTracing;
