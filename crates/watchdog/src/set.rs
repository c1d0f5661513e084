//! The process-wide watchdog pair.

use std::sync::Arc;

use crate::config::WatchdogConfig;
use crate::sink::ReportSink;
use crate::watchdog::{WatchDog, WatchdogKind, Watcher};

/// A general watchdog and a tracer watchdog.
///
/// Each keeps its own arming registry, so both can watch the same
/// transaction. Only the tracer's report carries call-tracer output.
#[derive(Debug, Clone)]
pub struct WatchdogSet {
    pub general: Arc<WatchDog>,
    pub tracer: Arc<WatchDog>,
}

impl WatchdogSet {
    /// Both watchdogs delivering to `sink`.
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            general: Arc::new(WatchDog::new(WatchdogKind::General, sink.clone())),
            tracer: Arc::new(WatchDog::new(WatchdogKind::Tracer, sink)),
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(config.build_sink())
    }

    pub fn disabled() -> Self {
        Self {
            general: Arc::new(WatchDog::disabled(WatchdogKind::General)),
            tracer: Arc::new(WatchDog::disabled(WatchdogKind::Tracer)),
        }
    }

    /// The pair as the VM sees it, general first.
    pub fn watchers(&self) -> Vec<Arc<dyn Watcher>> {
        vec![
            self.general.clone() as Arc<dyn Watcher>,
            self.tracer.clone() as Arc<dyn Watcher>,
        ]
    }
}
