//! The document shipped to the collector for one watched transaction.

use std::collections::BTreeMap;

use fuzzvm_common::{H256, U256, serde_utils, types::Receipt};
use serde::{Deserialize, Serialize};

/// Trace and state diff of one transaction, in the collector's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Trace lines in the order they were written.
    pub trace: Vec<String>,
    /// Transaction hash.
    pub hash: H256,
    /// Last differing value per storage slot.
    pub storage_new: BTreeMap<H256, H256>,
    /// First-seen value per storage slot.
    pub storage_old: BTreeMap<H256, H256>,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub balance_new: U256,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub balance_old: U256,
    pub receipt: Receipt,
    /// Call-tracer output, only present in tracer watchdog reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracer: Option<serde_json::Value>,
    #[serde(rename = "hasThrow")]
    pub has_throw: bool,
}

impl TraceReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
