//! Binomial confidence intervals for contingency-table cells.
//!
//! A cell of a two-dimensional frequency table is a count `x` out of a domain
//! of `n` positions. This crate turns that pair into a Wilson score interval
//! for the underlying proportion at one of a fixed set of significance levels.
//! Callers scale the proportion bounds back into absolute counts (× `n`) or
//! instances per million (× 1e6).

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Significance level of a two-sided confidence interval.
///
/// Export payloads and query strings carry these as `"0.05"` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlphaLevel {
    /// 90% confidence.
    #[serde(rename = "0.1")]
    L0_1,
    /// 95% confidence (default).
    #[default]
    #[serde(rename = "0.05")]
    L0_05,
    /// 99% confidence.
    #[serde(rename = "0.01")]
    L0_01,
    /// 99.9% confidence.
    #[serde(rename = "0.001")]
    L0_001,
}

impl AlphaLevel {
    /// Every supported level, from the widest alpha to the narrowest.
    pub const ALL: [AlphaLevel; 4] = [Self::L0_1, Self::L0_05, Self::L0_01, Self::L0_001];

    /// Numeric alpha.
    pub fn alpha(self) -> f64 {
        match self {
            Self::L0_1 => 0.1,
            Self::L0_05 => 0.05,
            Self::L0_01 => 0.01,
            Self::L0_001 => 0.001,
        }
    }

    /// Wire representation, identical to the serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L0_1 => "0.1",
            Self::L0_05 => "0.05",
            Self::L0_01 => "0.01",
            Self::L0_001 => "0.001",
        }
    }

    /// Two-sided critical value of the standard normal distribution.
    pub fn z_value(self) -> f64 {
        z_critical(self.alpha())
    }
}

impl std::fmt::Display for AlphaLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the supported alpha levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAlphaLevelError(pub String);

impl std::fmt::Display for ParseAlphaLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported alpha level '{}' (expected one of 0.1, 0.05, 0.01, 0.001)",
            self.0
        )
    }
}

impl std::error::Error for ParseAlphaLevelError {}

impl std::str::FromStr for AlphaLevel {
    type Err = ParseAlphaLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| ParseAlphaLevelError(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Critical values
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard normal quantile at `1 - alpha/2`.
///
/// Returns NaN for alpha outside `(0, 1)`.
pub fn z_critical(alpha: f64) -> f64 {
    if !(alpha > 0.0 && alpha < 1.0) {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(dist) => dist.inverse_cdf(1.0 - alpha / 2.0),
        Err(_) => f64::NAN,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Wilson score interval
// ═══════════════════════════════════════════════════════════════════════════════

/// Wilson score interval for `successes` out of `total` at the given level.
///
/// Returns `(lower, upper)` proportion bounds clamped into `[0, 1]`.
/// An empty domain carries no information and yields `(0, 1)`; a success
/// count larger than the domain is clamped to it.
pub fn wilson_conf_interval(successes: u64, total: u64, alpha: AlphaLevel) -> (f64, f64) {
    wilson_interval_z(successes, total, alpha.z_value())
}

/// Wilson score interval with an explicit critical value `z`.
pub fn wilson_interval_z(successes: u64, total: u64, z: f64) -> (f64, f64) {
    if total == 0 {
        return (0.0, 1.0);
    }
    let n = total as f64;
    let p = successes.min(total) as f64 / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    // Bounds equal p analytically at p == 0 and p == 1.
    let lo = if successes == 0 {
        0.0
    } else {
        (center - half).clamp(0.0, p)
    };
    let hi = if successes >= total {
        1.0
    } else {
        (center + half).clamp(p, 1.0)
    };
    (lo, hi)
}
