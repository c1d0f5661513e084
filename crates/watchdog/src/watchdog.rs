use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use fuzzvm_common::{
    Address, H256, U256,
    types::{Receipt, Transaction},
};
use tracing::{debug, info, warn};

use crate::error::WatchdogError;
use crate::registry::TxRegistry;
use crate::report::TraceReport;
use crate::sink::{ReportDispatcher, ReportSink};

/// Which of the two process watchdogs an instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogKind {
    General,
    Tracer,
}

impl fmt::Display for WatchdogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogKind::General => write!(f, "general"),
            WatchdogKind::Tracer => write!(f, "tracer"),
        }
    }
}

/// Read access to account balances, used at arm and finalize time.
pub trait BalanceSource {
    fn balance_of(&self, address: Address) -> Result<U256, WatchdogError>;
}

/// The execution-side view of a watchdog.
///
/// Every call carries the hash of the transaction the caller is executing;
/// calls for any transaction other than the armed one are dropped.
pub trait Watcher: Send + Sync {
    fn is_watching(&self, tx_hash: H256) -> bool;
    fn record_storage(&self, tx_hash: H256, location: H256, value: H256);
    fn write_trace(&self, tx_hash: H256, note: &str);
    fn throw_error(&self, tx_hash: H256);
}

/// Net storage diff of one transaction.
///
/// The first value seen for a slot is kept in `before` and never replaced.
/// `after` holds the latest value only while it differs from `before`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageDiff {
    before: BTreeMap<H256, H256>,
    after: BTreeMap<H256, H256>,
}

impl StorageDiff {
    pub fn record(&mut self, location: H256, value: H256) {
        match self.before.get(&location) {
            None => {
                self.before.insert(location, value);
            }
            Some(first) if *first == value => {
                self.after.remove(&location);
            }
            Some(_) => {
                self.after.insert(location, value);
            }
        }
    }

    pub fn before(&self) -> &BTreeMap<H256, H256> {
        &self.before
    }

    pub fn after(&self) -> &BTreeMap<H256, H256> {
        &self.after
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
    }
}

/// Buffers of the transaction currently being watched.
#[derive(Debug)]
struct Session {
    tx_hash: H256,
    target: Address,
    balance_before: U256,
    trace: Vec<String>,
    storage: StorageDiff,
    has_throw: bool,
}

impl Session {
    fn new(tx_hash: H256, target: Address, balance_before: U256) -> Self {
        Self {
            tx_hash,
            target,
            balance_before,
            trace: Vec::new(),
            storage: StorageDiff::default(),
            has_throw: false,
        }
    }

    fn into_report(
        self,
        balance_after: U256,
        receipt: Receipt,
        tracer: Option<serde_json::Value>,
    ) -> TraceReport {
        TraceReport {
            trace: self.trace,
            hash: self.tx_hash,
            storage_new: self.storage.after,
            storage_old: self.storage.before,
            balance_new: balance_after,
            balance_old: self.balance_before,
            receipt,
            tracer,
            has_throw: self.has_throw,
        }
    }
}

/// Trace and storage-diff observer for one transaction at a time.
///
/// `None` in `session` is the idle state. All buffer access, including the
/// read-check-write on the storage diff, happens under that one lock, so VMs
/// running on other threads can report into the same watchdog.
pub struct WatchDog {
    kind: WatchdogKind,
    enabled: bool,
    registry: Arc<TxRegistry>,
    sink: Arc<dyn ReportSink>,
    session: Mutex<Option<Session>>,
}

impl WatchDog {
    pub fn new(kind: WatchdogKind, sink: Arc<dyn ReportSink>) -> Self {
        Self::with_registry(kind, Arc::new(TxRegistry::new()), sink)
    }

    /// Build a watchdog deduplicating against a caller-provided registry.
    pub fn with_registry(
        kind: WatchdogKind,
        registry: Arc<TxRegistry>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            kind,
            enabled: true,
            registry,
            sink,
            session: Mutex::new(None),
        }
    }

    /// A watchdog that never arms.
    pub fn disabled(kind: WatchdogKind) -> Self {
        Self {
            enabled: false,
            ..Self::new(kind, Arc::new(ReportDispatcher::default()))
        }
    }

    pub fn kind(&self) -> WatchdogKind {
        self.kind
    }

    pub fn registry(&self) -> &Arc<TxRegistry> {
        &self.registry
    }

    /// Arm for `tx`, capturing the target's balance and starting with empty
    /// buffers.
    ///
    /// Arming only happens from idle. Returns `Ok(false)` without touching
    /// anything when the watchdog is disabled, when `tx` creates a contract,
    /// when `tx` was armed before, or while another transaction is armed.
    /// A failed balance read leaves `tx` unclaimed.
    pub fn watch(
        &self,
        state: &dyn BalanceSource,
        tx: &Transaction,
    ) -> Result<bool, WatchdogError> {
        if !self.enabled {
            return Ok(false);
        }
        let Some(target) = tx.call_target() else {
            return Ok(false);
        };
        if self.registry.contains(&tx.hash()) {
            debug!(kind = %self.kind, "tx {:#x} already watched, not re-arming", tx.hash());
            return Ok(false);
        }

        let balance_before = state.balance_of(target)?;

        let mut session = self.lock_session();
        if let Some(current) = session.as_ref() {
            warn!(
                kind = %self.kind,
                "not arming for {:#x}, still watching {:#x}",
                tx.hash(),
                current.tx_hash
            );
            return Ok(false);
        }
        // Claimed under the session lock, so a racing watch of the same tx
        // either sees the session or loses the claim.
        if !self.registry.try_claim(tx.hash()) {
            debug!(kind = %self.kind, "tx {:#x} already watched, not re-arming", tx.hash());
            return Ok(false);
        }

        info!(kind = %self.kind, "balance before tx {:#x}: {balance_before}", tx.hash());
        *session = Some(Session::new(tx.hash(), target, balance_before));
        Ok(true)
    }

    /// Drop the session for `tx_hash` without reporting. The transaction
    /// stays claimed. Returns whether a session was dropped.
    pub fn disarm(&self, tx_hash: H256) -> bool {
        let dropped = self.take_session(tx_hash).is_some();
        if dropped {
            debug!(kind = %self.kind, "disarmed for {tx_hash:#x}");
        }
        dropped
    }

    pub fn is_armed(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Hash of the transaction currently armed, if any.
    pub fn armed_tx(&self) -> Option<H256> {
        self.lock_session().as_ref().map(|session| session.tx_hash)
    }

    /// Snapshot of the current storage diff, for inspection while armed.
    pub fn storage_diff(&self) -> Option<StorageDiff> {
        self.lock_session()
            .as_ref()
            .map(|session| session.storage.clone())
    }

    /// Finalize the transaction `receipt` belongs to and return to idle.
    ///
    /// Does nothing unless the watchdog is armed for `receipt.tx_hash`. The
    /// report is only built and delivered when at least one trace line was
    /// written. Delivery failures are logged, never returned.
    pub fn end(
        &self,
        state: &dyn BalanceSource,
        receipt: &Receipt,
    ) -> Result<Option<TraceReport>, WatchdogError> {
        self.finish(state, receipt, None)
    }

    /// Like [`WatchDog::end`], attaching the call-tracer output to the report.
    pub fn end_with_tracer(
        &self,
        state: &dyn BalanceSource,
        receipt: &Receipt,
        tracer_output: serde_json::Value,
    ) -> Result<Option<TraceReport>, WatchdogError> {
        self.finish(state, receipt, Some(tracer_output))
    }

    fn finish(
        &self,
        state: &dyn BalanceSource,
        receipt: &Receipt,
        tracer_output: Option<serde_json::Value>,
    ) -> Result<Option<TraceReport>, WatchdogError> {
        let Some(session) = self.take_session(receipt.tx_hash) else {
            if let Some(armed) = self.armed_tx() {
                debug!(
                    kind = %self.kind,
                    "ignoring end for {:#x}, armed for {armed:#x}",
                    receipt.tx_hash
                );
            }
            return Ok(None);
        };

        let balance_after = state.balance_of(session.target)?;
        info!(kind = %self.kind, "balance after tx {:#x}: {balance_after}", session.tx_hash);

        if session.trace.is_empty() {
            debug!(kind = %self.kind, "no trace recorded for {:#x}, nothing to report", session.tx_hash);
            return Ok(None);
        }

        let report = session.into_report(balance_after, receipt.clone(), tracer_output);
        info!(
            kind = %self.kind,
            "reporting execution trace and storage context to fuzzer for tx {:#x}",
            report.hash
        );
        if let Err(e) = self.sink.deliver(&report) {
            warn!(kind = %self.kind, "failed to deliver report for {:#x}: {e}", report.hash);
        }

        Ok(Some(report))
    }

    /// Take the session if it belongs to `tx_hash`, leaving any other alone.
    fn take_session(&self, tx_hash: H256) -> Option<Session> {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(|s| s.tx_hash == tx_hash) {
            session.take()
        } else {
            None
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        match self.session.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Watcher for WatchDog {
    fn is_watching(&self, tx_hash: H256) -> bool {
        self.armed_tx() == Some(tx_hash)
    }

    fn record_storage(&self, tx_hash: H256, location: H256, value: H256) {
        let mut session = self.lock_session();
        if let Some(session) = session.as_mut().filter(|s| s.tx_hash == tx_hash) {
            session.storage.record(location, value);
        }
    }

    fn write_trace(&self, tx_hash: H256, note: &str) {
        let mut session = self.lock_session();
        if let Some(session) = session.as_mut().filter(|s| s.tx_hash == tx_hash) {
            session.trace.push(note.to_string());
        }
    }

    fn throw_error(&self, tx_hash: H256) {
        let mut session = self.lock_session();
        if let Some(session) = session.as_mut().filter(|s| s.tx_hash == tx_hash) {
            session.has_throw = true;
        }
    }
}

impl fmt::Debug for WatchDog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchDog")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("armed_tx", &self.armed_tx())
            .finish()
    }
}
