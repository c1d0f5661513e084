//! Execution-trace watchdog.
//!
//! A [`WatchDog`] observes one in-flight transaction at a time. While armed it
//! accumulates free-form trace lines and a per-slot before/after storage diff;
//! when the transaction's owner finalizes it, the watchdog captures the target's
//! balance delta and ships a [`TraceReport`] to a [`ReportSink`], normally the
//! fuzzing collector's `POST /fuzz` endpoint.
//!
//! ```text
//!   idle ──watch(tx)──▶ armed ──record/write_trace──▶ armed
//!    ▲                                                  │
//!    └──────────────────────── end(receipt) ◀───────────┘
//! ```
//!
//! The VM never sees a `WatchDog` directly, only the [`Watcher`] trait, so
//! tests and alternative collectors can be swapped in.

pub mod config;
pub mod error;
pub mod registry;
pub mod report;
pub mod set;
pub mod sink;
pub mod watchdog;

pub use config::WatchdogConfig;
pub use error::{DeliveryError, WatchdogError};
pub use registry::TxRegistry;
pub use report::TraceReport;
pub use set::WatchdogSet;
pub use sink::{HttpReportSink, JsonlFileReportSink, ReportDispatcher, ReportSink};
pub use watchdog::{BalanceSource, StorageDiff, WatchDog, WatchdogKind, Watcher};

#[cfg(test)]
mod tests;
