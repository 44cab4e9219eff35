//! Data model of a two-dimensional frequency table.
//!
//! A table cross-tabulates the values of two corpus attributes. Each non-empty
//! combination becomes a [`Cell`] carrying its absolute frequency, its
//! normalized frequency (instances per million) and the Wilson confidence
//! intervals of both. The wire types at the bottom of the module mirror the
//! JSON exchanged with the contingency-table endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CtableError;
use crate::params::CtParams;

/// Background of cells that are not part of the visible heatmap.
pub const NO_COLOR: &str = "transparent";

/// True when `attr` names a structural attribute (`struct.attr`).
pub fn is_struct_attr(attr: &str) -> bool {
    attr.contains('.')
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How the minimum-frequency threshold is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MinFreqType {
    /// Absolute frequency.
    #[default]
    #[serde(rename = "abs")]
    Abs,
    /// Instances per million.
    #[serde(rename = "ipm")]
    Ipm,
    /// Cumulative rank percentage by absolute frequency.
    #[serde(rename = "pabs")]
    PercentileAbs,
    /// Cumulative rank percentage by ipm.
    #[serde(rename = "pipm")]
    PercentileIpm,
}

impl MinFreqType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Ipm => "ipm",
            Self::PercentileAbs => "pabs",
            Self::PercentileIpm => "pipm",
        }
    }

    pub fn is_percentile(self) -> bool {
        matches!(self, Self::PercentileAbs | Self::PercentileIpm)
    }

    /// The cell quantity this filter kind is evaluated on.
    pub fn quantity(self) -> Quantity {
        match self {
            Self::Abs | Self::PercentileAbs => Quantity::Abs,
            Self::Ipm | Self::PercentileIpm => Quantity::Ipm,
        }
    }
}

impl std::fmt::Display for MinFreqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MinFreqType {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            "pabs" => Ok(Self::PercentileAbs),
            "pipm" => Ok(Self::PercentileIpm),
            _ => Err(CtableError::UnknownValue {
                kind: "minimum frequency type",
                value: s.to_string(),
            }),
        }
    }
}

/// Numeric quantity displayed in, and colored by, the matrix view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    #[default]
    Abs,
    Ipm,
}

impl Quantity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Ipm => "ipm",
        }
    }
}

impl std::str::FromStr for Quantity {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            _ => Err(CtableError::UnknownValue {
                kind: "quantity",
                value: s.to_string(),
            }),
        }
    }
}

/// Sort key for one label dimension of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortCriterion {
    /// Label text, ascending.
    Attr,
    /// Row/column total of absolute frequencies, descending.
    Abs,
    /// Row/column total of ipm, descending.
    Ipm,
}

impl std::str::FromStr for SortCriterion {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attr" => Ok(Self::Attr),
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            _ => Err(CtableError::UnknownValue {
                kind: "sort criterion",
                value: s.to_string(),
            }),
        }
    }
}

/// Column the flat list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlatSortColumn {
    Attr1,
    #[default]
    Abs,
    Ipm,
}

impl std::str::FromStr for FlatSortColumn {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attr1" => Ok(Self::Attr1),
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            _ => Err(CtableError::UnknownValue {
                kind: "flat sort column",
                value: s.to_string(),
            }),
        }
    }
}

/// Mapping from cell values to heatmap colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMapping {
    #[default]
    Linear,
    Percentile,
}

impl std::str::FromStr for ColorMapping {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "percentile" => Ok(Self::Percentile),
            _ => Err(CtableError::UnknownValue {
                kind: "color mapping",
                value: s.to_string(),
            }),
        }
    }
}

/// One of the two label axes of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// Values of the first attribute.
    Rows,
    /// Values of the second attribute.
    Columns,
}

impl Dimension {
    pub fn opposite(self) -> Self {
        match self {
            Self::Rows => Self::Columns,
            Self::Columns => Self::Rows,
        }
    }
}

/// Which projection is currently presented (and exported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Matrix,
    Flat,
}

impl std::str::FromStr for ViewMode {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matrix" => Ok(Self::Matrix),
            "flat" => Ok(Self::Flat),
            _ => Err(CtableError::UnknownValue {
                kind: "view mode",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Cells and labels
// ---------------------------------------------------------------------------

/// Minimum-frequency filter as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinFreqFilter {
    pub kind: MinFreqType,
    pub threshold: f64,
}

impl MinFreqFilter {
    pub fn new(kind: MinFreqType, threshold: f64) -> Self {
        Self { kind, threshold }
    }

    /// Threshold as sent in `ctminfreq` (integers without a fraction).
    pub fn threshold_str(&self) -> String {
        format!("{}", self.threshold)
    }
}

impl Default for MinFreqFilter {
    fn default() -> Self {
        Self {
            kind: MinFreqType::Abs,
            threshold: 1.0,
        }
    }
}

/// One non-empty cell of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Payload index assigned at import; stable across every transform.
    pub orig_order: usize,
    pub abs: u64,
    pub abs_conf_interval: (f64, f64),
    /// `None` when both attributes are structural.
    pub ipm: Option<f64>,
    pub ipm_conf_interval: Option<(f64, f64)>,
    pub domain_size: u64,
    pub bg_color: String,
    /// Link to the concordance filter restricted to this cell.
    pub pfilter: String,
}

impl Cell {
    /// Value of `quantity`; a missing ipm reads as zero.
    pub fn value(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Abs => self.abs as f64,
            Quantity::Ipm => self.ipm.unwrap_or(0.0),
        }
    }

    /// Confidence interval of `quantity`; a missing ipm interval reads as `(0, 0)`.
    pub fn interval(&self, quantity: Quantity) -> (f64, f64) {
        match quantity {
            Quantity::Abs => self.abs_conf_interval,
            Quantity::Ipm => self.ipm_conf_interval.unwrap_or((0.0, 0.0)),
        }
    }
}

/// A label of one matrix dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub value: String,
    pub visible: bool,
    /// First-appearance index in the imported payload.
    pub orig_order: usize,
}

/// A cell together with its coordinates, as held by the flat projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatCell {
    pub val1: String,
    pub val2: String,
    pub cell: Cell,
}

/// Nested `val1 → val2 → Cell` table; a missing entry is an absent cell.
pub type Table = HashMap<String, HashMap<String, Cell>>;

/// Immutable copy of freshly imported data handed to data listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct CtSnapshot {
    pub params: CtParams,
    /// Every imported cell in `orig_order`.
    pub cells: Vec<FlatCell>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One data row of the fetch response: `[val1, val2, abs, domain_size]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtDataRow(pub String, pub String, pub u64, pub u64);

/// Form arguments echoed back by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtFreqFormArgs {
    pub ctminfreq: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctminfreq_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctattr1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctattr2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctfcrit1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctfcrit2: Option<String>,
}

/// Body of the contingency-table endpoint (`format=json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtDataResponse {
    pub data: Vec<CtDataRow>,
    pub full_size: u64,
    pub ctfreq_form_args: CtFreqFormArgs,
}

/// Query parameters of the contingency-table endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtQuery {
    pub ctfcrit1: String,
    pub ctfcrit2: String,
    pub ctattr1: String,
    pub ctattr2: String,
    pub ctminfreq: String,
    pub ctminfreq_type: MinFreqType,
}

impl CtQuery {
    /// Query-string pairs in request order, ending with `format=json`.
    pub fn to_pairs(&self, conc_args: &[(String, String)]) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = conc_args.to_vec();
        pairs.extend([
            ("ctfcrit1".to_string(), self.ctfcrit1.clone()),
            ("ctfcrit2".to_string(), self.ctfcrit2.clone()),
            ("ctattr1".to_string(), self.ctattr1.clone()),
            ("ctattr2".to_string(), self.ctattr2.clone()),
            ("ctminfreq".to_string(), self.ctminfreq.clone()),
            (
                "ctminfreq_type".to_string(),
                self.ctminfreq_type.as_str().to_string(),
            ),
            ("format".to_string(), "json".to_string()),
        ]);
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_attr_detection() {
        assert!(is_struct_attr("doc.genre"));
        assert!(!is_struct_attr("word"));
    }

    #[test]
    fn test_min_freq_type_wire_names() {
        for kind in [
            MinFreqType::Abs,
            MinFreqType::Ipm,
            MinFreqType::PercentileAbs,
            MinFreqType::PercentileIpm,
        ] {
            assert_eq!(kind.as_str().parse::<MinFreqType>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("percentile".parse::<MinFreqType>().is_err());
    }

    #[test]
    fn test_threshold_str_drops_fraction_for_integers() {
        assert_eq!(MinFreqFilter::new(MinFreqType::Abs, 5.0).threshold_str(), "5");
        assert_eq!(
            MinFreqFilter::new(MinFreqType::PercentileAbs, 12.5).threshold_str(),
            "12.5"
        );
    }

    #[test]
    fn test_response_parses_array_rows() {
        let raw = r#"{
            "data": [["cat", "NN", 10, 1000], ["dog", "NN", 3, 1000]],
            "full_size": 2,
            "ctfreq_form_args": {"ctminfreq": "1", "ctminfreq_type": "abs"}
        }"#;
        let resp: CtDataResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data[0], CtDataRow("cat".into(), "NN".into(), 10, 1000));
        assert_eq!(resp.ctfreq_form_args.ctminfreq, "1");
        assert_eq!(resp.ctfreq_form_args.ctattr1, None);
    }

    #[test]
    fn test_query_pairs_order() {
        let q = CtQuery {
            ctfcrit1: "0<0".into(),
            ctfcrit2: "1<0".into(),
            ctattr1: "word".into(),
            ctattr2: "tag".into(),
            ctminfreq: "3".into(),
            ctminfreq_type: MinFreqType::Ipm,
        };
        let pairs = q.to_pairs(&[("corpname".into(), "susanne".into())]);
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "corpname",
                "ctfcrit1",
                "ctfcrit2",
                "ctattr1",
                "ctattr2",
                "ctminfreq",
                "ctminfreq_type",
                "format"
            ]
        );
        assert_eq!(pairs[6].1, "ipm");
        assert_eq!(pairs[7].1, "json");
    }
}
