use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// The transaction's kind: call or create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

/// An externally submitted transaction, already decoded and signature-checked
/// by the host. Its hash is carried as-is; this crate never recomputes it.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: H256,
    pub from: Address,
    pub to: TxKind,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
}

impl Transaction {
    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn to(&self) -> TxKind {
        self.to
    }

    /// Target account of a call transaction, `None` for contract creation.
    pub fn call_target(&self) -> Option<Address> {
        match self.to {
            TxKind::Call(address) => Some(address),
            TxKind::Create => None,
        }
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}
