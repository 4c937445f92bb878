//! Error types for acquisition and configuration.

/// Tick-local failures. The poll loop logs these and moves on to the next tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquisitionError {
    /// Connection refused, host unreachable, DNS failure.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Non-success HTTP status, or an error object reported by the device.
    #[error("Protocol error (status {status}): {message}")]
    Protocol { status: u16, message: String },

    /// Body is not JSON or does not have the current-conditions shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The payload parsed but no known condition block was present.
    #[error("Mapping error: {0}")]
    Mapping(String),
}

impl AcquisitionError {
    /// Whether the device could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for AcquisitionError {
    fn from(err: serde_json::Error) -> Self {
        AcquisitionError::Parse(err.to_string())
    }
}

/// The only failure tier a host is expected to treat as process-ending.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FatalAcquisitionError {
    #[error("{failures} consecutive failed polls (limit {limit}), last: {last}")]
    ThresholdExceeded {
        failures: u32,
        limit: u32,
        last: AcquisitionError,
    },

    #[error("Device unreachable at startup: {0}")]
    Startup(AcquisitionError),
}

/// Outcome of a failed tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Recoverable(#[from] AcquisitionError),

    #[error(transparent)]
    Fatal(#[from] FatalAcquisitionError),
}

impl TickError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TickError::Fatal(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
