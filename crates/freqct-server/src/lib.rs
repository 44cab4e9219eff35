//! Reference contingency-table backend.
//!
//! Serves precomputed co-occurrence tables in the wire format the client
//! expects and converts export payloads to CSV. Tables are loaded once from a
//! JSON dataset and never change while the server runs.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use freqct_core::{
    CtDataResponse, CtDataRow, CtFreqFormArgs, CtableError, ExportPayload, MinFreqType,
    Position, calc_ipm, validate_min_freq,
};

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Precomputed table of one attribute pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetTable {
    pub attr1: String,
    pub attr2: String,
    /// Position the table was computed for; `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctfcrit1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctfcrit2: Option<String>,
    pub rows: Vec<CtDataRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub tables: Vec<DatasetTable>,
}

impl Dataset {
    /// Rows for `attr1` × `attr2`, transposing a table stored the other way round.
    pub fn lookup(
        &self,
        attr1: &str,
        attr2: &str,
        ctfcrit1: &str,
        ctfcrit2: &str,
    ) -> Option<Vec<CtDataRow>> {
        let fits =
            |crit: &Option<String>, wanted: &str| crit.as_deref().is_none_or(|c| c == wanted);
        if let Some(t) = self.tables.iter().find(|t| {
            t.attr1 == attr1
                && t.attr2 == attr2
                && fits(&t.ctfcrit1, ctfcrit1)
                && fits(&t.ctfcrit2, ctfcrit2)
        }) {
            return Some(t.rows.clone());
        }
        self.tables
            .iter()
            .find(|t| {
                t.attr1 == attr2
                    && t.attr2 == attr1
                    && fits(&t.ctfcrit1, ctfcrit2)
                    && fits(&t.ctfcrit2, ctfcrit1)
            })
            .map(|t| {
                t.rows
                    .iter()
                    .map(|CtDataRow(a, b, abs, ds)| CtDataRow(b.clone(), a.clone(), *abs, *ds))
                    .collect()
            })
    }
}

/// Load a dataset JSON file from disk.
pub fn load_dataset(path: &Path) -> Result<Dataset, CtableError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str::<Dataset>(&raw)
        .map_err(|e| CtableError::Parse(format!("failed to parse dataset {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct AppState {
    dataset: Dataset,
}

/// JSON error body with a status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CtableError> for ApiError {
    fn from(e: CtableError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

/// Query of `GET /freqct`; concordance arguments are accepted and ignored.
#[derive(Deserialize)]
struct FreqctParams {
    ctattr1: String,
    ctattr2: String,
    ctfcrit1: Option<String>,
    ctfcrit2: Option<String>,
    ctminfreq: Option<String>,
    ctminfreq_type: Option<String>,
}

fn checked_position(raw: Option<String>) -> Result<String, ApiError> {
    let raw = raw.unwrap_or_else(|| Position::KWIC.to_string());
    raw.parse::<Position>()?;
    Ok(raw)
}

async fn handle_freqct(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FreqctParams>,
) -> Result<Json<CtDataResponse>, ApiError> {
    let kind: MinFreqType = params
        .ctminfreq_type
        .as_deref()
        .unwrap_or("abs")
        .parse()?;
    let ctminfreq = params.ctminfreq.unwrap_or_else(|| "1".to_string());
    let threshold = validate_min_freq(&ctminfreq, kind)?;
    let ctfcrit1 = checked_position(params.ctfcrit1)?;
    let ctfcrit2 = checked_position(params.ctfcrit2)?;

    let rows = state
        .dataset
        .lookup(&params.ctattr1, &params.ctattr2, &ctfcrit1, &ctfcrit2)
        .ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!(
                "no table for {} x {}",
                params.ctattr1, params.ctattr2
            ),
        })?;
    let full_size = rows.len() as u64;
    let data: Vec<CtDataRow> = rows
        .into_iter()
        .filter(|CtDataRow(_, _, abs, ds)| match kind {
            MinFreqType::Abs => *abs as f64 >= threshold,
            MinFreqType::Ipm => calc_ipm(*abs, *ds) >= threshold,
            MinFreqType::PercentileAbs | MinFreqType::PercentileIpm => true,
        })
        .collect();
    debug!(
        "freqct {} x {}: {} of {} rows at {kind} {threshold}",
        params.ctattr1,
        params.ctattr2,
        data.len(),
        full_size
    );

    Ok(Json(CtDataResponse {
        data,
        full_size,
        ctfreq_form_args: CtFreqFormArgs {
            ctminfreq,
            ctminfreq_type: Some(kind.as_str().to_string()),
            ctattr1: Some(params.ctattr1),
            ctattr2: Some(params.ctattr2),
            ctfcrit1: Some(ctfcrit1),
            ctfcrit2: Some(ctfcrit2),
        },
    }))
}

#[derive(Deserialize)]
struct ExportParams {
    saveformat: Option<String>,
}

async fn handle_export(
    Query(params): Query<ExportParams>,
    Json(payload): Json<ExportPayload>,
) -> Result<Response, ApiError> {
    let format = params.saveformat.unwrap_or_else(|| "csv".to_string());
    if format != "csv" {
        return Err(ApiError::bad_request(format!(
            "unsupported save format '{format}'"
        )));
    }
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"freqct.csv\"",
            ),
        ],
        payload.to_csv(),
    )
        .into_response())
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "tables": state.dataset.tables.len(),
    }))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let pairs: Vec<String> = state
        .dataset
        .tables
        .iter()
        .map(|t| format!("{} x {}", t.attr1, t.attr2))
        .collect();

    Json(serde_json::json!({
        "name": "freqct reference server",
        "version": freqct_core::VERSION,
        "tables": pairs,
        "endpoints": {
            "/": "This API index",
            "/freqct": {
                "method": "GET",
                "description": "Contingency table of two attributes",
                "params": {
                    "ctattr1": "First attribute (rows)",
                    "ctattr2": "Second attribute (columns)",
                    "ctfcrit1": "Position of the first attribute, e.g. 0<0 (default: 0<0)",
                    "ctfcrit2": "Position of the second attribute (default: 0<0)",
                    "ctminfreq": "Minimum frequency (default: 1)",
                    "ctminfreq_type": "abs, ipm, pabs or pipm (default: abs)",
                }
            },
            "/export_freqct": {
                "method": "POST",
                "description": "Convert a matrix or flat export payload to a file",
                "params": { "saveformat": "csv" }
            },
            "/health": "Health check",
        },
        "examples": {
            "table": state.dataset.tables.first().map(|t| {
                format!("/freqct?ctattr1={}&ctattr2={}&ctminfreq=1&ctminfreq_type=abs", t.attr1, t.attr2)
            }),
        }
    }))
}

/// Build the axum router over a loaded dataset.
pub fn build_router(dataset: Dataset) -> Router {
    let state = Arc::new(AppState { dataset });

    Router::new()
        .route("/", get(handle_index))
        .route("/freqct", get(handle_freqct))
        .route("/export_freqct", post(handle_export))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve `dataset` on `host:port` until the process stops.
pub async fn run_server(dataset: Dataset, host: &str, port: u16) -> std::io::Result<()> {
    let tables = dataset.tables.len();
    let app = build_router(dataset);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("serving {tables} tables on http://{addr}");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset {
            tables: vec![DatasetTable {
                attr1: "word".into(),
                attr2: "tag".into(),
                ctfcrit1: None,
                ctfcrit2: Some("1<0".into()),
                rows: vec![CtDataRow("cat".into(), "NN".into(), 4, 100)],
            }],
        }
    }

    #[test]
    fn test_lookup_direct_and_swapped() {
        let ds = dataset();
        assert_eq!(ds.lookup("word", "tag", "0<0", "1<0").unwrap()[0].0, "cat");
        let swapped = ds.lookup("tag", "word", "1<0", "-2<0").unwrap();
        assert_eq!(swapped[0], CtDataRow("NN".into(), "cat".into(), 4, 100));
        assert!(ds.lookup("word", "tag", "0<0", "0<0").is_none());
        assert!(ds.lookup("lemma", "tag", "0<0", "1<0").is_none());
    }

    #[test]
    fn test_load_dataset() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"tables": [{"attr1": "word", "attr2": "tag", "rows": [["a", "b", 1, 2]]}]}"#,
        )
        .unwrap();
        let ds = load_dataset(file.path()).unwrap();
        assert_eq!(ds.tables[0].rows.len(), 1);
        assert_eq!(ds.tables[0].ctfcrit1, None);
    }
}
