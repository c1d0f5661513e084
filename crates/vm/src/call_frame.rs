use bytes::Bytes;
use fuzzvm_common::{Address, U256, types::Code};

/// Execution record of one call primitive invocation.
///
/// `to` is the account whose storage and balance the frame acts on, while
/// `code_address` is where `bytecode` was loaded from. They differ for
/// `CALLCODE` and `DELEGATECALL` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Address of the account that sent the message
    pub caller: Address,
    /// Address of the recipient of the message
    pub to: Address,
    /// Address of the code to execute. Usually the same as `to`, but can be different
    pub code_address: Address,
    /// Bytecode to execute
    pub bytecode: Code,
    /// Value sent along the transaction
    pub value: U256,
    pub calldata: Bytes,
    pub gas_limit: u64,
    pub gas_remaining: u64,
    /// Foreign code running on the caller's storage, sender and value.
    pub is_delegate: bool,
    /// Dispatch depth, 0 for the root frame.
    pub depth: usize,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: Address,
        to: Address,
        code_address: Address,
        bytecode: Code,
        value: U256,
        calldata: Bytes,
        gas_limit: u64,
        depth: usize,
    ) -> Self {
        Self {
            caller,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            gas_limit,
            gas_remaining: gas_limit,
            is_delegate: false,
            depth,
        }
    }

    /// Turn this frame into a delegate of `parent`: sender and value are the
    /// parent's.
    pub fn as_delegate(mut self, parent: &CallFrame) -> Self {
        self.caller = parent.caller;
        self.value = parent.value;
        self.is_delegate = true;
        self
    }

    /// Charge `gas`. Returns `false`, charging nothing, when not enough is left.
    pub fn use_gas(&mut self, gas: u64) -> bool {
        match self.gas_remaining.checked_sub(gas) {
            Some(left) => {
                self.gas_remaining = left;
                true
            }
            None => false,
        }
    }

    pub fn consume_all_gas(&mut self) {
        self.gas_remaining = 0;
    }
}
