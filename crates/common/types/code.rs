use bytes::Bytes;
use ethereum_types::H256;

use crate::utils::keccak;

/// Contract bytecode together with its keccak hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub hash: H256,
    pub bytecode: Bytes,
}

impl Code {
    /// Wraps `bytecode`, computing its hash.
    pub fn from_bytecode(bytecode: Bytes) -> Self {
        Self {
            hash: keccak(&bytecode),
            bytecode,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytecode.len()
    }
}

impl Default for Code {
    fn default() -> Self {
        Self::from_bytecode(Bytes::new())
    }
}
