//! Report delivery.
//!
//! A [`ReportSink`] receives each finalized [`TraceReport`]. Delivery is
//! fire-and-forget from the watchdog's point of view: errors come back to the
//! watchdog, which logs them and moves on. Nothing here retries.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DeliveryError;
use crate::report::TraceReport;

/// Destination for finalized reports.
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError>;
}

/// POSTs each report as JSON to the collector endpoint.
pub struct HttpReportSink {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpReportSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReportSink for HttpReportSink {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(report).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Appends each report as a single JSON line to a file.
///
/// The file is reopened in append mode on every write, so external rotation
/// can rename it between reports.
pub struct JsonlFileReportSink {
    path: PathBuf,
}

impl JsonlFileReportSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportSink for JsonlFileReportSink {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError> {
        let json = report.to_json()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

/// Hands one report to several sinks in registration order.
///
/// Every sink is attempted; the first failure is reported.
#[derive(Default)]
pub struct ReportDispatcher {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl ReportDispatcher {
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    pub fn add_sink(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }
}

impl ReportSink for ReportDispatcher {
    fn deliver(&self, report: &TraceReport) -> Result<(), DeliveryError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(report) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
