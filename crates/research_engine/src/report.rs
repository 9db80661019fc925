use reqwest::header::CONTENT_TYPE;
use research_logging::research_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EngineSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {status}: {detail}")]
    HttpStatus { status: u16, detail: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("response has no final_report")]
    MissingReport,
}

#[derive(Serialize)]
struct JobRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct JobResponse {
    #[serde(default)]
    final_report: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Client for the synchronous job endpoint: posts a query and waits for the
/// whole pipeline to finish.
#[derive(Debug, Clone)]
pub struct ReportClient {
    client: reqwest::Client,
    url: String,
}

impl ReportClient {
    pub fn new(settings: &EngineSettings) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ReportError::Network(err.to_string()))?;
        Ok(Self {
            client,
            url: settings.report_url.clone(),
        })
    }

    pub async fn fetch_report(&self, query: &str) -> Result<String, ReportError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ReportError::EmptyQuery);
        }
        let body = serde_json::to_vec(&JobRequest { query })
            .map_err(|err| ReportError::Decode(err.to_string()))?;

        research_info!("Requesting report from {}", self.url);
        let response = self
            .client
            .post(self.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.detail)
                .unwrap_or_else(|_| status.to_string());
            return Err(ReportError::HttpStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: JobResponse =
            serde_json::from_slice(&bytes).map_err(|err| ReportError::Decode(err.to_string()))?;
        parsed.final_report.ok_or(ReportError::MissingReport)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ReportError {
    if err.is_timeout() {
        return ReportError::Timeout;
    }
    ReportError::Network(err.to_string())
}
