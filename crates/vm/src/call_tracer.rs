use bytes::Bytes;
use fuzzvm_common::{Address, U256, serde_utils};
use serde::{Deserialize, Serialize};

use crate::errors::VMError;

/// One observation of the dispatcher, in the order it happened.
///
/// Every frame that reaches setup emits exactly one opening event followed,
/// after its nested events, by one `Close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CallEvent {
    Call {
        from: Address,
        to: Address,
        #[serde(with = "serde_utils::u256::dec_str")]
        value: U256,
        gas: u64,
        #[serde(with = "serde_utils::bytes")]
        input: Bytes,
        depth: usize,
    },
    CallCode {
        from: Address,
        to: Address,
        #[serde(with = "serde_utils::u256::dec_str")]
        value: U256,
        gas: u64,
        #[serde(with = "serde_utils::bytes")]
        input: Bytes,
        depth: usize,
    },
    DelegateCall {
        from: Address,
        to: Address,
        gas: u64,
        #[serde(with = "serde_utils::bytes")]
        input: Bytes,
        depth: usize,
    },
    Create {
        from: Address,
        address: Address,
        #[serde(with = "serde_utils::u256::dec_str")]
        value: U256,
        gas: u64,
        depth: usize,
    },
    #[serde(rename_all = "camelCase")]
    Close {
        gas_left: u64,
        depth: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Event log of every frame the dispatcher sets up.
/// Use `CallTracer::disabled()` when tracing is not wanted.
#[derive(Debug, Default, Clone)]
pub struct CallTracer {
    events: Vec<CallEvent>,
    /// If active is set to false it won't trace.
    pub active: bool,
}

impl CallTracer {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            active: true,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CallEvent] {
        &self.events
    }

    pub fn on_call(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: &Bytes,
        depth: usize,
    ) {
        self.record(|| CallEvent::Call {
            from,
            to,
            value,
            gas,
            input: input.clone(),
            depth,
        });
    }

    pub fn on_call_code(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: &Bytes,
        depth: usize,
    ) {
        self.record(|| CallEvent::CallCode {
            from,
            to,
            value,
            gas,
            input: input.clone(),
            depth,
        });
    }

    pub fn on_delegate_call(
        &mut self,
        from: Address,
        to: Address,
        gas: u64,
        input: &Bytes,
        depth: usize,
    ) {
        self.record(|| CallEvent::DelegateCall {
            from,
            to,
            gas,
            input: input.clone(),
            depth,
        });
    }

    pub fn on_create(
        &mut self,
        from: Address,
        address: Address,
        value: U256,
        gas: u64,
        depth: usize,
    ) {
        self.record(|| CallEvent::Create {
            from,
            address,
            value,
            gas,
            depth,
        });
    }

    pub fn on_close(&mut self, gas_left: u64, depth: usize, error: Option<&VMError>) {
        self.record(|| CallEvent::Close {
            gas_left,
            depth,
            error: error.map(ToString::to_string),
        });
    }

    /// The event log as JSON, `null` if it cannot be represented.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.events).unwrap_or_default()
    }

    fn record(&mut self, event: impl FnOnce() -> CallEvent) {
        if self.active {
            self.events.push(event());
        }
    }
}
