use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Result of a transaction
#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: H256,
    pub succeeded: bool,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    /// Set for creation transactions that deployed code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn new(tx_hash: H256, succeeded: bool, gas_used: u64, cumulative_gas_used: u64) -> Self {
        Self {
            tx_hash,
            succeeded,
            gas_used,
            cumulative_gas_used,
            contract_address: None,
            logs: Vec::new(),
        }
    }
}

/// Data record produced during the execution of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
}
