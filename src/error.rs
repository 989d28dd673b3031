use thiserror::Error;

/// Errors returned by the orchestrator *before* any batch is sent.
///
/// Gateway failures never surface here; they are reported in-band as
/// `Fail` outcomes on the summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Request rejected before any network activity.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Dispatcher cannot operate with the supplied configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons a single `send-many` call failed.
///
/// One of these marks every recipient of the batch as failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Fatal configuration problems, detected at startup or first use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
