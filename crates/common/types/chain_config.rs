use serde::{Deserialize, Serialize};

/// Fork activation heights for the chain. A fork whose block is `None` never
/// activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub homestead_block: Option<u64>,
    /// EIP-158 (state clearing): empty accounts are not created by zero-value
    /// calls and newly created contracts start with nonce 1.
    pub eip158_block: Option<u64>,
}

impl ChainConfig {
    /// Every fork active from genesis.
    pub fn all_forks_active(chain_id: u64) -> Self {
        Self {
            chain_id,
            homestead_block: Some(0),
            eip158_block: Some(0),
        }
    }

    pub fn is_homestead(&self, block_number: u64) -> bool {
        is_activated(self.homestead_block, block_number)
    }

    pub fn is_eip158(&self, block_number: u64) -> bool {
        is_activated(self.eip158_block, block_number)
    }

    /// Resolves every fork predicate for `block_number` at once.
    pub fn rules(&self, block_number: u64) -> Rules {
        Rules {
            chain_id: self.chain_id,
            is_homestead: self.is_homestead(block_number),
            is_eip158: self.is_eip158(block_number),
        }
    }
}

fn is_activated(fork_block: Option<u64>, block_number: u64) -> bool {
    fork_block.is_some_and(|fork_block| fork_block <= block_number)
}

/// Fork rules in effect for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rules {
    pub chain_id: u64,
    pub is_homestead: bool,
    pub is_eip158: bool,
}
