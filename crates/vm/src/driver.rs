//! Top-level transaction execution.
//!
//! [`execute_transaction`] is the only place where the watchdogs are armed
//! and finalized, and [`run_guarded`] is the only place where a fault inside
//! an interpreter is caught.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use fuzzvm_common::{
    Address,
    types::{Receipt, Transaction, TxKind},
};
use fuzzvm_watchdog::{WatchdogError, WatchdogSet, Watcher};
use tracing::{error, warn};

use crate::errors::{InternalError, TxResult, VMError};
use crate::vm::VM;

/// Result of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_left: u64,
    pub output: Bytes,
    /// Address of the deployed contract, for successful creations only.
    pub contract_address: Option<Address>,
    pub receipt: Receipt,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Run `f` against `vm`, turning a panic into [`InternalError::Panic`].
///
/// On a panic the state is rolled back to where it was when `f` started and
/// the VM's depth counter is restored, so `vm` stays usable.
pub fn run_guarded<T>(
    vm: &mut VM<'_>,
    f: impl FnOnce(&mut VM<'_>) -> Result<T, VMError>,
) -> Result<T, VMError> {
    let snapshot = vm.db.snapshot();
    let depth = vm.depth;

    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *vm))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let backtrace = Backtrace::force_capture();
            error!("Execution fault caught at depth {}: {message}\n{backtrace}", vm.depth);

            vm.db.revert_to_snapshot(snapshot)?;
            vm.depth = depth;
            Err(InternalError::Panic(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Execute `tx` as the root call tree of `vm`.
///
/// Arms both watchdogs, bumps the sender nonce for call transactions, runs
/// the root primitive under [`run_guarded`], and finalizes both watchdogs
/// with the resulting receipt. The tracer watchdog also gets the VM's call
/// tracer log. `vm` must have been built for this transaction, i.e. with
/// `env.tx_hash == Some(tx.hash())`, and with `watchdogs.watchers()` attached.
///
/// Intrinsic gas and fees are not charged.
pub fn execute_transaction(
    vm: &mut VM<'_>,
    tx: &Transaction,
    watchdogs: &WatchdogSet,
) -> Result<ExecutionReport, VMError> {
    if vm.env().tx_hash != Some(tx.hash()) {
        return Err(InternalError::Custom(format!(
            "VM environment is not bound to transaction {:#x}",
            tx.hash()
        ))
        .into());
    }

    watchdogs.general.watch(&*vm, tx).map_err(watchdog_error)?;
    if let Err(err) = watchdogs.tracer.watch(&*vm, tx) {
        watchdogs.general.disarm(tx.hash());
        return Err(watchdog_error(err));
    }

    let execution = run_root(vm, tx);

    let (result, gas_left, output, contract_address) = match execution {
        Ok(execution) => execution,
        Err(err) => {
            // The transaction never produced a result; still close the
            // watchdogs so they are not left armed.
            let receipt = Receipt::new(tx.hash(), false, tx.gas_limit, tx.gas_limit);
            mark_thrown(watchdogs, tx);
            if let Err(finalize_err) = finalize(vm, watchdogs, &receipt) {
                warn!("Failed to finalize watchdogs for {:#x}: {finalize_err}", tx.hash());
            }
            return Err(err);
        }
    };

    if !result.is_success() {
        mark_thrown(watchdogs, tx);
    }

    let gas_used = tx
        .gas_limit
        .checked_sub(gas_left)
        .ok_or(InternalError::Underflow)?;
    let mut receipt = Receipt::new(tx.hash(), result.is_success(), gas_used, gas_used);
    receipt.contract_address = contract_address;

    finalize(vm, watchdogs, &receipt)?;

    Ok(ExecutionReport {
        result,
        gas_used,
        gas_left,
        output,
        contract_address,
        receipt,
    })
}

type RootExecution = (TxResult, u64, Bytes, Option<Address>);

fn run_root(vm: &mut VM<'_>, tx: &Transaction) -> Result<RootExecution, VMError> {
    match tx.to() {
        TxKind::Call(to) => {
            let nonce = vm.db.get_nonce(tx.from)?;
            let next_nonce = nonce.checked_add(1).ok_or(InternalError::Overflow)?;
            vm.db.set_nonce(tx.from, next_nonce)?;

            let input = tx.data().clone();
            let outcome = run_guarded(vm, |vm| {
                vm.call(tx.from, to, input, tx.gas_limit, tx.value())
            })?;
            Ok((outcome.result, outcome.gas_left, outcome.output, None))
        }
        TxKind::Create => {
            let code = tx.data().clone();
            let outcome = run_guarded(vm, |vm| {
                vm.create(tx.from, code, tx.gas_limit, tx.value())
            })?;
            let contract_address = outcome.is_success().then_some(outcome.address);
            Ok((
                outcome.result,
                outcome.gas_left,
                outcome.output,
                contract_address,
            ))
        }
    }
}

fn mark_thrown(watchdogs: &WatchdogSet, tx: &Transaction) {
    watchdogs.general.throw_error(tx.hash());
    watchdogs.tracer.throw_error(tx.hash());
}

/// Finalize both watchdogs, even when the first one fails.
fn finalize(vm: &VM<'_>, watchdogs: &WatchdogSet, receipt: &Receipt) -> Result<(), VMError> {
    let general = watchdogs.general.end(vm, receipt);
    let tracer = watchdogs
        .tracer
        .end_with_tracer(vm, receipt, vm.tracer.to_json());
    general.and(tracer).map(|_| ()).map_err(watchdog_error)
}

fn watchdog_error(err: WatchdogError) -> VMError {
    InternalError::Custom(format!("watchdog: {err}")).into()
}
