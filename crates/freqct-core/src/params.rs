//! Parameters shared by the matrix and the flat projection.

use freqct_stats::AlphaLevel;

use crate::error::CtableError;
use crate::form::Position;
use crate::model::{CtQuery, MinFreqFilter, Quantity, is_struct_attr};

/// Attribute selection, filters and concordance context of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct CtParams {
    /// First attribute (matrix rows); dotted names are structural.
    pub attr1: String,
    /// Second attribute (matrix columns).
    pub attr2: String,
    pub ctfcrit1: Position,
    pub ctfcrit2: Position,
    /// Filter currently applied to the displayed data.
    pub min_freq: MinFreqFilter,
    /// Filter the server applied when producing the current data.
    pub server_min_freq: MinFreqFilter,
    pub alpha_level: AlphaLevel,
    /// Non-empty cells before server-side filtering.
    pub full_size: u64,
    /// Query arguments identifying the source concordance.
    pub conc_args: Vec<(String, String)>,
    /// Action the per-cell filter links point to.
    pub quick_filter_action: String,
}

impl CtParams {
    pub fn new(attr1: impl Into<String>, attr2: impl Into<String>) -> Self {
        Self {
            attr1: attr1.into(),
            attr2: attr2.into(),
            ctfcrit1: Position::KWIC,
            ctfcrit2: Position::KWIC,
            min_freq: MinFreqFilter::default(),
            server_min_freq: MinFreqFilter::default(),
            alpha_level: AlphaLevel::default(),
            full_size: 0,
            conc_args: Vec::new(),
            quick_filter_action: "quick_filter".to_string(),
        }
    }

    pub fn both_structural(&self) -> bool {
        is_struct_attr(&self.attr1) && is_struct_attr(&self.attr2)
    }

    /// Cells carry ipm unless both attributes are structural.
    pub fn has_ipm(&self) -> bool {
        !self.both_structural()
    }

    /// Reject ipm-based operations on tables without ipm.
    pub fn ensure_quantity(&self, quantity: Quantity) -> Result<(), CtableError> {
        if quantity == Quantity::Ipm && !self.has_ipm() {
            Err(CtableError::IpmUnavailable)
        } else {
            Ok(())
        }
    }

    /// Whether `requested` needs rows the server already dropped.
    ///
    /// A changed filter kind always refetches; for absolute kinds a threshold
    /// below the one the data was fetched with does too.
    pub fn requires_fetch(&self, requested: &MinFreqFilter) -> bool {
        requested.kind != self.server_min_freq.kind
            || (!requested.kind.is_percentile()
                && requested.threshold < self.server_min_freq.threshold)
    }

    /// Fetch query for the current attributes with the given filter.
    pub fn query_with(&self, min_freq: &MinFreqFilter) -> CtQuery {
        CtQuery {
            ctfcrit1: self.ctfcrit1.to_string(),
            ctfcrit2: self.ctfcrit2.to_string(),
            ctattr1: self.attr1.clone(),
            ctattr2: self.attr2.clone(),
            ctminfreq: min_freq.threshold_str(),
            ctminfreq_type: min_freq.kind,
        }
    }

    /// Fetch query for the current attributes and filter.
    pub fn to_query(&self) -> CtQuery {
        self.query_with(&self.min_freq)
    }

    /// Parameters with the two dimensions swapped.
    pub fn transposed(&self) -> Self {
        Self {
            attr1: self.attr2.clone(),
            attr2: self.attr1.clone(),
            ctfcrit1: self.ctfcrit2,
            ctfcrit2: self.ctfcrit1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MinFreqType;

    #[test]
    fn test_requires_fetch() {
        let mut params = CtParams::new("word", "tag");
        params.server_min_freq = MinFreqFilter::new(MinFreqType::Abs, 5.0);

        assert!(params.requires_fetch(&MinFreqFilter::new(MinFreqType::Abs, 4.0)));
        assert!(!params.requires_fetch(&MinFreqFilter::new(MinFreqType::Abs, 5.0)));
        assert!(!params.requires_fetch(&MinFreqFilter::new(MinFreqType::Abs, 50.0)));
        assert!(params.requires_fetch(&MinFreqFilter::new(MinFreqType::Ipm, 50.0)));
    }

    #[test]
    fn test_percentile_only_refetches_on_kind_change() {
        let mut params = CtParams::new("word", "tag");
        params.server_min_freq = MinFreqFilter::new(MinFreqType::PercentileAbs, 50.0);
        assert!(!params.requires_fetch(&MinFreqFilter::new(MinFreqType::PercentileAbs, 10.0)));
        assert!(params.requires_fetch(&MinFreqFilter::new(MinFreqType::PercentileIpm, 10.0)));
    }

    #[test]
    fn test_ipm_unavailable_for_struct_pairs() {
        let params = CtParams::new("doc.genre", "text.year");
        assert!(!params.has_ipm());
        assert!(params.ensure_quantity(Quantity::Ipm).is_err());
        assert!(params.ensure_quantity(Quantity::Abs).is_ok());
        assert!(CtParams::new("doc.genre", "word").has_ipm());
    }

    #[test]
    fn test_transposed_is_involutive() {
        let mut params = CtParams::new("word", "tag");
        params.ctfcrit2 = "2>0".parse().unwrap();
        let back = params.transposed().transposed();
        assert_eq!(back, params);
        assert_eq!(params.transposed().attr1, "tag");
        assert_eq!(params.transposed().ctfcrit1.to_string(), "2>0");
    }
}
