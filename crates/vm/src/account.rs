use fuzzvm_common::{H256, U256, types::Code};
use rustc_hash::FxHashMap;

/// Account as held by [`crate::db::InMemoryStateDb`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Code,
    pub storage: FxHashMap<H256, H256>,
}

impl Account {
    pub fn new(balance: U256, code: Code, nonce: u64, storage: FxHashMap<H256, H256>) -> Self {
        Self {
            balance,
            nonce,
            code,
            storage,
        }
    }

    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}
