//! Error type shared by the table engine, the form model and the network layer.

use thiserror::Error;

/// Everything that can go wrong while building, filtering or fetching a table.
#[derive(Debug, Error)]
pub enum CtableError {
    #[error("minimum frequency must be a non-negative integer, got '{0}'")]
    InvalidMinFreq(String),

    #[error("percentile threshold must satisfy 0 < x <= 100, got '{0}'")]
    PercentileOutOfRange(String),

    #[error("structures '{first}' and '{second}' cannot be cross-tabulated together")]
    StructsNotAllowed { first: String, second: String },

    #[error("invalid context position '{0}'")]
    InvalidPosition(String),

    #[error("ipm is not available when both attributes are structural")]
    IpmUnavailable,

    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// A command refused by the table state, e.g. ipm display without ipm.
    #[error("{0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CtableError {
    /// True for errors caused by user input that never reached the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMinFreq(_)
                | Self::PercentileOutOfRange(_)
                | Self::StructsNotAllowed { .. }
                | Self::InvalidPosition(_)
                | Self::IpmUnavailable
        )
    }
}
