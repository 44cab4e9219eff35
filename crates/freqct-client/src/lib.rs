//! # freqct-client
//!
//! Network side of a contingency-table session.
//!
//! [`ContingencyBackend`] is the seam between the pure table state and the
//! server: [`HttpBackend`] talks to a real endpoint over `reqwest`, tests plug
//! in an in-memory implementation. The [`controller`] runs the reducer on a
//! tokio task and executes its effects against a backend.

pub mod controller;

use std::future::Future;
use std::time::Duration;

use log::debug;

use freqct_core::{CtDataResponse, CtQuery, CtableError, ExportPayload, FreqctConfig};

pub use controller::{ControllerHandle, spawn_controller};

/// A server able to compute contingency tables and convert exports.
pub trait ContingencyBackend: Send + Sync + 'static {
    /// Fetch the table for `query` within the concordance named by `conc_args`.
    fn fetch(
        &self,
        query: &CtQuery,
        conc_args: &[(String, String)],
    ) -> impl Future<Output = Result<CtDataResponse, CtableError>> + Send;

    /// Convert an export payload into a file of `format` (e.g. `csv`).
    fn export(
        &self,
        payload: &ExportPayload,
        format: &str,
    ) -> impl Future<Output = Result<Vec<u8>, CtableError>> + Send;
}

/// Backend reached over HTTP.
pub struct HttpBackend {
    http_client: reqwest::Client,
    config: FreqctConfig,
}

impl HttpBackend {
    pub fn new(config: FreqctConfig) -> Result<Self, CtableError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("freqct/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CtableError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &FreqctConfig {
        &self.config
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CtableError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(CtableError::Server {
        status: status.as_u16(),
        message,
    })
}

impl ContingencyBackend for HttpBackend {
    async fn fetch(
        &self,
        query: &CtQuery,
        conc_args: &[(String, String)],
    ) -> Result<CtDataResponse, CtableError> {
        let url = self.config.endpoint(&self.config.fetch_path);
        let pairs = query.to_pairs(conc_args);
        debug!("GET {url} ({} x {})", query.ctattr1, query.ctattr2);

        let response = self
            .http_client
            .get(&url)
            .query(&pairs)
            .send()
            .await
            .map_err(|e| CtableError::Network(e.to_string()))?;
        check_status(response)
            .await?
            .json::<CtDataResponse>()
            .await
            .map_err(|e| CtableError::Parse(e.to_string()))
    }

    async fn export(&self, payload: &ExportPayload, format: &str) -> Result<Vec<u8>, CtableError> {
        let url = self.config.endpoint(&self.config.export_path);
        debug!("POST {url} (saveformat={format})");

        let response = self
            .http_client
            .post(&url)
            .query(&[("saveformat", format)])
            .json(payload)
            .send()
            .await
            .map_err(|e| CtableError::Network(e.to_string()))?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| CtableError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
