mod checksum;
mod disp;
mod error;
mod lsa;
mod parser;
mod typ;
mod util;

pub use checksum::{lsa_checksum_calc, lsa_checksum_valid};
pub use error::{OspfParseError, OspfParseResult};
pub use typ::{OspfLsType, OspfType};
pub use lsa::*;
pub use parser::*;
pub use util::{Emit, ParseBe};
