pub mod inst;
pub use inst::{Message, Rib, RibEntry, serve};
