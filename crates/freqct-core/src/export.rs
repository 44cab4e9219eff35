//! Export payloads for server-side file conversion.
//!
//! The matrix view exports one `[lo, mid, hi, color]` tuple per visible cell;
//! the flat view exports one eight-column row per cell. Both are posted as
//! JSON and converted to a file by the export endpoint; [`ExportPayload::to_csv`]
//! is the conversion used there.

use serde::{Deserialize, Serialize};

use freqct_stats::AlphaLevel;

use crate::model::MinFreqType;

/// `[lo, mid, hi, color]` of one matrix cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixExportCell(pub f64, pub f64, pub f64, pub String);

/// Matrix-mode export payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixExport {
    pub attr1: String,
    pub attr2: String,
    pub min_freq: f64,
    pub min_freq_type: MinFreqType,
    pub alpha_level: AlphaLevel,
    pub labels1: Vec<String>,
    pub labels2: Vec<String>,
    /// `data[i][j]` is the cell at `labels1[i]` × `labels2[j]`, `None` when absent.
    pub data: Vec<Vec<Option<MatrixExportCell>>>,
}

/// `[val1, val2, loAbs, abs, hiAbs, loIpm, ipm, hiIpm]` of one flat row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatExportRow(
    pub String,
    pub String,
    pub f64,
    pub u64,
    pub f64,
    pub Option<f64>,
    pub Option<f64>,
    pub Option<f64>,
);

/// Flat-mode export payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatExport {
    pub headings: Vec<String>,
    pub min_freq: f64,
    pub min_freq_type: MinFreqType,
    pub alpha_level: AlphaLevel,
    pub data: Vec<FlatExportRow>,
}

/// Either export payload; the shape tells them apart on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportPayload {
    Matrix(MatrixExport),
    Flat(FlatExport),
}

/// One `[lo, mid, hi]` item of a row/column interval chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupItem {
    /// Label on the opposite dimension.
    pub label: String,
    pub lo: f64,
    pub mid: f64,
    pub hi: f64,
}

// ---------------------------------------------------------------------------
// CSV conversion
// ---------------------------------------------------------------------------

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

impl ExportPayload {
    /// Render as CSV with a header row.
    ///
    /// Matrix payloads get three columns per column label (value, lower and
    /// upper bound); absent cells are left empty.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Matrix(m) => {
                let mut header = vec![format!("{}\\{}", m.attr1, m.attr2)];
                for label in &m.labels2 {
                    header.push(label.clone());
                    header.push(format!("{label} (lo)"));
                    header.push(format!("{label} (hi)"));
                }
                out.push_str(&csv_line(&header));
                for (label, row) in m.labels1.iter().zip(&m.data) {
                    let mut fields = vec![label.clone()];
                    for cell in row {
                        match cell {
                            Some(MatrixExportCell(lo, mid, hi, _)) => {
                                fields.push(mid.to_string());
                                fields.push(lo.to_string());
                                fields.push(hi.to_string());
                            }
                            None => fields.extend([String::new(), String::new(), String::new()]),
                        }
                    }
                    out.push_str(&csv_line(&fields));
                }
            }
            Self::Flat(f) => {
                out.push_str(&csv_line(&f.headings));
                for FlatExportRow(v1, v2, lo_abs, abs, hi_abs, lo_ipm, ipm, hi_ipm) in &f.data {
                    out.push_str(&csv_line(&[
                        v1.clone(),
                        v2.clone(),
                        lo_abs.to_string(),
                        abs.to_string(),
                        hi_abs.to_string(),
                        opt_num(*lo_ipm),
                        opt_num(*ipm),
                        opt_num(*hi_ipm),
                    ]));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> FlatExport {
        FlatExport {
            headings: ["word", "tag", "abs lo", "abs", "abs hi", "ipm lo", "ipm", "ipm hi"]
                .map(String::from)
                .to_vec(),
            min_freq: 1.0,
            min_freq_type: MinFreqType::Abs,
            alpha_level: AlphaLevel::L0_05,
            data: vec![FlatExportRow(
                "a,b".into(),
                "NN".into(),
                1.5,
                3,
                6.25,
                None,
                None,
                None,
            )],
        }
    }

    #[test]
    fn test_untagged_payload_distinguishes_shapes() {
        let json = serde_json::to_string(&ExportPayload::Flat(flat())).unwrap();
        assert!(json.contains("\"minFreqType\":\"abs\""));
        assert!(json.contains("\"alphaLevel\":\"0.05\""));
        let back: ExportPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ExportPayload::Flat(_)));

        let matrix = ExportPayload::Matrix(MatrixExport {
            attr1: "word".into(),
            attr2: "tag".into(),
            min_freq: 1.0,
            min_freq_type: MinFreqType::Abs,
            alpha_level: AlphaLevel::L0_01,
            labels1: vec!["cat".into()],
            labels2: vec!["NN".into(), "VB".into()],
            data: vec![vec![
                Some(MatrixExportCell(1.0, 2.0, 3.0, "#fff7f3".into())),
                None,
            ]],
        });
        let json = serde_json::to_string(&matrix).unwrap();
        assert!(json.contains("[[[1.0,2.0,3.0,\"#fff7f3\"],null]]"));
        let back: ExportPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_flat_csv_quotes_fields() {
        let csv = ExportPayload::Flat(flat()).to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "word,tag,abs lo,abs,abs hi,ipm lo,ipm,ipm hi");
        assert_eq!(lines[1], "\"a,b\",NN,1.5,3,6.25,,,");
    }

    #[test]
    fn test_matrix_csv_layout() {
        let payload = ExportPayload::Matrix(MatrixExport {
            attr1: "word".into(),
            attr2: "tag".into(),
            min_freq: 0.0,
            min_freq_type: MinFreqType::Abs,
            alpha_level: AlphaLevel::L0_05,
            labels1: vec!["cat".into()],
            labels2: vec!["NN".into(), "VB".into()],
            data: vec![vec![Some(MatrixExportCell(1.0, 2.0, 3.0, "x".into())), None]],
        });
        let csv = payload.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "word\\tag,NN,NN (lo),NN (hi),VB,VB (lo),VB (hi)");
        assert_eq!(lines[1], "cat,2,1,3,,,");
    }
}
