pub mod config;
pub mod logging;
pub mod ospf;
pub mod rib;
pub mod tasks;
