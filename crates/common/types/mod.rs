mod chain_config;
mod code;
mod receipt;
mod transaction;

pub use chain_config::{ChainConfig, Rules};
pub use code::Code;
pub use receipt::{Log, Receipt};
pub use transaction::{Transaction, TxKind};
