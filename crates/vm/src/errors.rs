use bytes::Bytes;
use fuzzvm_common::Address;
use serde::{Deserialize, Serialize};

/// Errors that halt the program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VMError {
    /// Errors that break execution, they shouldn't ever happen. Contains subcategory `DatabaseError`.
    #[error("Internal Error: {0}")]
    Internal(#[from] InternalError),
    /// Returned when the state backend fails. Propagated like internal errors.
    #[error("Database Error: {0}")]
    Database(#[from] DatabaseError),
    /// Errors contemplated by the EVM, they revert and consume all gas of the current context.
    #[error("Exceptional Halt: {0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    /// Revert Opcode called. It behaves like an exceptional halt in this VM.
    #[error("Revert Opcode")]
    RevertOpcode,
    #[error("Max call depth exceeded")]
    DepthExceeded,
    #[error("Insufficient balance for transfer")]
    InsufficientBalance,
    #[error("Contract creation code storage out of gas")]
    CodeStoreOutOfGas,
}

impl VMError {
    /// These errors are unexpected and indicate critical issues.
    /// They should not cause a transaction to revert silently but instead fail loudly, propagating the error.
    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ExceptionalHalt {
    #[error("Out Of Gas")]
    OutOfGas,
    #[error("Invalid Opcode")]
    InvalidOpcode,
    #[error("Stack Underflow")]
    StackUnderflow,
    #[error("Stack Overflow")]
    StackOverflow,
    #[error("Execution cancelled")]
    Cancelled,
    #[error("Precompile execution error: {0}")]
    Precompile(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum InternalError {
    #[error("Arithmetic operation overflowed")]
    Overflow,
    #[error("Arithmetic operation underflowed")]
    Underflow,
    #[error("Execution panicked: {0}")]
    Panic(String),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DatabaseError {
    #[error("Snapshot {0} does not exist")]
    InvalidSnapshot(usize),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }

    pub fn error(&self) -> Option<&VMError> {
        match self {
            TxResult::Success => None,
            TxResult::Revert(err) => Some(err),
        }
    }
}

/// What a call primitive hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub result: TxResult,
    /// Gas left to refund to the caller.
    pub gas_left: u64,
    pub output: Bytes,
}

impl CallOutcome {
    pub fn success(gas_left: u64, output: Bytes) -> Self {
        Self {
            result: TxResult::Success,
            gas_left,
            output,
        }
    }

    pub fn revert(error: VMError, gas_left: u64) -> Self {
        Self {
            result: TxResult::Revert(error),
            gas_left,
            output: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub result: TxResult,
    pub gas_left: u64,
    /// Runtime code returned by the init code, empty on any failure.
    pub output: Bytes,
    /// Derived address of the new contract. Zero when creation never got as
    /// far as deriving it.
    pub address: Address,
}

impl CreateOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
