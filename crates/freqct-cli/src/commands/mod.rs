pub mod fetch;
pub mod interval;
pub mod serve;

use freqct_core::{AlphaLevel, CtableError};

/// Parse an alpha level flag into the core error type.
pub fn parse_alpha(raw: &str) -> Result<AlphaLevel, CtableError> {
    raw.parse().map_err(|_| CtableError::UnknownValue {
        kind: "alpha level",
        value: raw.to_string(),
    })
}

/// Runtime for commands that drive async crates from the synchronous CLI.
pub fn runtime() -> Result<tokio::runtime::Runtime, CtableError> {
    Ok(tokio::runtime::Runtime::new()?)
}
