pub use bytes::Bytes;
pub use ethereum_types::*;
pub mod evm;
pub mod serde_utils;
pub mod types;
pub mod utils;
