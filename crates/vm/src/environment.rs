use std::fmt;
use std::sync::Arc;

use fuzzvm_common::{Address, H256, U256};

use crate::db::StateDb;
use crate::errors::DatabaseError;
use crate::utils;

/// Whether `from` can afford `value`.
pub type CanTransferFn = fn(&dyn StateDb, Address, U256) -> Result<bool, DatabaseError>;
/// Move `value` from the first address to the second.
pub type TransferFn = fn(&mut dyn StateDb, Address, Address, U256) -> Result<(), DatabaseError>;
/// Hash of the block at the given height.
pub type GetHashFn = Arc<dyn Fn(u64) -> H256 + Send + Sync>;

/// Block and transaction parameters plus the host's transfer callbacks.
///
/// Set once when the VM is built and never mutated afterwards.
#[derive(Clone)]
pub struct Environment {
    pub can_transfer: CanTransferFn,
    pub transfer: TransferFn,
    pub get_hash: GetHashFn,

    /// The sender address of the external transaction.
    pub origin: Address,
    pub gas_price: U256,
    /// Hash of the transaction being executed. Watchers only accept writes
    /// scoped to this hash.
    pub tx_hash: Option<H256>,

    pub coinbase: Address,
    pub block_gas_limit: u64,
    pub block_number: u64,
    pub timestamp: u64,
    pub difficulty: U256,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            can_transfer: utils::can_transfer,
            transfer: utils::transfer,
            get_hash: Arc::new(|_| H256::zero()),
            origin: Address::zero(),
            gas_price: U256::zero(),
            tx_hash: None,
            coinbase: Address::zero(),
            block_gas_limit: 0,
            block_number: 0,
            timestamp: 0,
            difficulty: U256::zero(),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("origin", &self.origin)
            .field("gas_price", &self.gas_price)
            .field("tx_hash", &self.tx_hash)
            .field("coinbase", &self.coinbase)
            .field("block_gas_limit", &self.block_gas_limit)
            .field("block_number", &self.block_number)
            .field("timestamp", &self.timestamp)
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}
