use bytes::Bytes;
use fuzzvm_common::{Address, H256, U256, types::Code};

use crate::errors::DatabaseError;

pub mod in_memory;

pub use in_memory::InMemoryStateDb;

/// Opaque checkpoint over persistent state.
pub type SnapshotId = usize;

/// Persistent state as seen by the dispatcher.
///
/// Every mutation between [`StateDb::snapshot`] and
/// [`StateDb::revert_to_snapshot`] must be undone by the revert, including
/// account creation.
pub trait StateDb {
    fn exist(&self, address: Address) -> Result<bool, DatabaseError>;
    /// Create `address`, replacing any account already there. A balance the
    /// address already held is kept.
    fn create_account(&mut self, address: Address) -> Result<(), DatabaseError>;

    fn get_balance(&self, address: Address) -> Result<U256, DatabaseError>;
    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError>;
    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), DatabaseError>;

    fn get_nonce(&self, address: Address) -> Result<u64, DatabaseError>;
    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), DatabaseError>;

    fn get_code(&self, address: Address) -> Result<Code, DatabaseError>;
    /// Zero for accounts that do not exist.
    fn get_code_hash(&self, address: Address) -> Result<H256, DatabaseError>;
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DatabaseError>;

    fn get_state(&self, address: Address, key: H256) -> Result<H256, DatabaseError>;
    fn set_state(&mut self, address: Address, key: H256, value: H256)
    -> Result<(), DatabaseError>;

    fn snapshot(&mut self) -> SnapshotId;
    fn revert_to_snapshot(&mut self, snapshot: SnapshotId) -> Result<(), DatabaseError>;
}
