//! # fuzzvm-vm
//!
//! Message-call dispatch core of the fuzzing EVM.
//!
//! ## Overview
//!
//! The [`vm::VM`] owns the four call primitives (`call`, `call_code`,
//! `delegate_call`, `create`). Each primitive checks its preconditions, takes a
//! snapshot of the [`db::StateDb`], builds a [`call_frame::CallFrame`], runs it
//! through the precompile fast path or the pluggable
//! [`interpreter::Interpreter`], and then either keeps the state or rolls back
//! to the snapshot.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                            VM                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │  │  CallFrame  │  │ Precompiles │  │   Environment    │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────┘  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │  │ Interpreter │  │ CallTracer  │  │ Watchers (trace) │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                         StateDb                          │
//! │          (balances, nonces, code, storage, journal)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error model
//!
//! Failures inside a frame (out of gas, depth, insufficient balance, a
//! failing precompile...) never escape a primitive as `Err`: they roll the
//! state back, forfeit the frame's gas and come back as
//! [`errors::TxResult::Revert`]. Only internal and database errors propagate,
//! see [`errors::VMError::should_propagate`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut db = InMemoryStateDb::new();
//! let mut vm = VM::new(env, &mut db, chain_config, VmConfig::default(), interpreter)
//!     .with_watchers(watchdogs.watchers());
//!
//! let report = driver::execute_transaction(&mut vm, &tx, &watchdogs)?;
//! ```

pub mod account;
pub mod call_frame;
pub mod call_tracer;
pub mod config;
pub mod constants;
pub mod db;
pub mod driver;
pub mod environment;
pub mod errors;
pub mod interpreter;
pub mod precompiles;
pub mod utils;
pub mod vm;

pub use account::Account;
pub use call_frame::CallFrame;
pub use call_tracer::{CallEvent, CallTracer};
pub use config::VmConfig;
pub use db::{InMemoryStateDb, SnapshotId, StateDb};
pub use environment::Environment;
pub use errors::{CallOutcome, CreateOutcome, VMError};
pub use interpreter::Interpreter;
pub use vm::{CancelHandle, VM};

#[cfg(test)]
mod tests;
