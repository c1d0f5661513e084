//! Error types for the watchdog.

#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    #[error("State read failed: {0}")]
    State(String),

    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to hand a report to its collector. Never escapes [`crate::WatchDog`];
/// it is logged and dropped there.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector answered HTTP {0}")]
    Status(u16),

    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
