mod ospf;
pub use ospf::*;
