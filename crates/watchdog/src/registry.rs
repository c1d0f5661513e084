//! Deduplication of armed transactions.

use std::sync::Mutex;

use fuzzvm_common::H256;
use rustc_hash::FxHashSet;

/// Set of transaction hashes a watchdog has already armed for.
///
/// Check and insert happen under one lock, so two threads racing to arm the
/// same transaction cannot both win.
#[derive(Debug, Default)]
pub struct TxRegistry {
    seen: Mutex<FxHashSet<H256>>,
}

impl TxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `tx_hash` as seen. Returns `true` only the first time.
    pub fn try_claim(&self, tx_hash: H256) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(tx_hash)
    }

    pub fn contains(&self, tx_hash: &H256) -> bool {
        let seen = match self.seen.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.contains(tx_hash)
    }

    pub fn len(&self) -> usize {
        let seen = match self.seen.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
