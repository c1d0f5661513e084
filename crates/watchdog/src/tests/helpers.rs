//! Shared fixtures for watchdog tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fuzzvm_common::{
    Address, H256, U256,
    types::{Receipt, Transaction, TxKind},
};

use crate::error::{DeliveryError, WatchdogError};
use crate::report::TraceReport;
use crate::sink::ReportSink;
use crate::watchdog::{BalanceSource, WatchDog, WatchdogKind};

pub const TARGET_ADDR: u64 = 0x42;
pub const SENDER_ADDR: u64 = 0x100;

/// Keeps every delivered report in memory.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<TraceReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<TraceReport> {
        self.reports.lock().expect("sink lock").clone()
    }
}

impl ReportSink for RecordingSink {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError> {
        self.reports.lock().expect("sink lock").push(report.clone());
        Ok(())
    }
}

/// Rejects every report with the given HTTP status.
pub struct RejectingSink(pub u16);

impl ReportSink for RejectingSink {
    fn deliver(&self, _report: &TraceReport) -> Result<(), DeliveryError> {
        Err(DeliveryError::Status(self.0))
    }
}

/// Balance table the tests mutate between arm and finalize.
#[derive(Default)]
pub struct Balances {
    balances: Mutex<HashMap<Address, U256>>,
}

impl Balances {
    pub fn with(address: Address, balance: U256) -> Self {
        let balances = Self::default();
        balances.set(address, balance);
        balances
    }

    pub fn set(&self, address: Address, balance: U256) {
        self.balances
            .lock()
            .expect("balances lock")
            .insert(address, balance);
    }
}

impl BalanceSource for Balances {
    fn balance_of(&self, address: Address) -> Result<U256, WatchdogError> {
        Ok(self
            .balances
            .lock()
            .expect("balances lock")
            .get(&address)
            .copied()
            .unwrap_or_default())
    }
}

/// Always fails, standing in for a broken state backend.
pub struct BrokenState;

impl BalanceSource for BrokenState {
    fn balance_of(&self, _address: Address) -> Result<U256, WatchdogError> {
        Err(WatchdogError::State("backend unavailable".to_string()))
    }
}

pub fn target() -> Address {
    Address::from_low_u64_be(TARGET_ADDR)
}

pub fn slot(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn call_tx(hash: u64) -> Transaction {
    Transaction {
        hash: H256::from_low_u64_be(hash),
        from: Address::from_low_u64_be(SENDER_ADDR),
        to: TxKind::Call(target()),
        gas_limit: 100_000,
        ..Default::default()
    }
}

pub fn create_tx(hash: u64) -> Transaction {
    Transaction {
        hash: H256::from_low_u64_be(hash),
        from: Address::from_low_u64_be(SENDER_ADDR),
        to: TxKind::Create,
        gas_limit: 100_000,
        ..Default::default()
    }
}

pub fn receipt_for(tx: &Transaction, succeeded: bool) -> Receipt {
    Receipt::new(tx.hash(), succeeded, 21_000, 21_000)
}

pub fn general_with_sink() -> (WatchDog, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let watchdog = WatchDog::new(WatchdogKind::General, sink.clone());
    (watchdog, sink)
}
