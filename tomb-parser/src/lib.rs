// Modular parser structure
mod parser;
pub use parser::{Parser, TopLevelItem};
