// HTTP client for the tractor extraction backend

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::{ChatResponder, SourceResolver, VariableExtractor};
use crate::error::MiningError;
use crate::types::{ExtractionOutcome, SourceUrl, TractorRef, VariableName};

const SEARCH_PATH: &str = "/api/v1/search";
const EXTRACT_PATH: &str = "/api/v1/extract";
const CHAT_PATH: &str = "/api/v1/chat/talk";
const PDF_PATH: &str = "/api/v1/generate-pdf";
const TRACTORS_PATH: &str = "/api/v1/tractors/filter";

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub tractor_model: String,
    pub company: String,
    pub variable_name: String,
    pub source_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Query for the stored tractor catalogue. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TractorFilter {
    /// Partial match on the company name.
    pub company: Option<String>,
    /// Partial match on the model name.
    pub model: Option<String>,
    /// Exact drive type, e.g. `4WD`.
    pub drive_type: Option<String>,
}

impl TractorFilter {
    fn query_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("company", self.company.as_deref()),
            ("model", self.model.as_deref()),
            ("drive_type", self.drive_type.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
    }
}

/// Error body the backend sends with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Client for the search, extraction, chat, report and catalogue endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tractor-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn endpoint_url(&self, path: &str) -> Result<Url> {
        Url::parse(&self.endpoint(path))
            .with_context(|| format!("invalid backend URL {}", self.base_url))
    }

    fn report_url(&self, model: &str) -> Result<Url> {
        let mut url = self.endpoint_url(PDF_PATH)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend URL {} cannot carry a path", self.base_url))?
            .push(model);
        Ok(url)
    }

    fn tractors_url(&self, filter: &TractorFilter) -> Result<Url> {
        let mut url = self.endpoint_url(TRACTORS_PATH)?;
        let pairs: Vec<_> = filter.query_pairs().collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Stored tractors matching `filter`, as the backend returns them.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn fetch_tractors(&self, filter: &TractorFilter) -> Vec<serde_json::Value> {
        match self.try_fetch_tractors(filter).await {
            Ok(tractors) => {
                debug!("Catalogue query returned {} tractors", tractors.len());
                tractors
            }
            Err(e) => {
                warn!("Catalogue query failed: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_tractors(&self, filter: &TractorFilter) -> Result<Vec<serde_json::Value>> {
        let url = self.tractors_url(filter)?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .context("catalogue request failed")?
            .error_for_status()
            .context("catalogue backend returned an error")?;

        response.json().await.context("invalid catalogue response")
    }

    /// Ask the backend search service for a reference page.
    pub async fn search(&self, query: &str) -> Result<Option<SourceUrl>, MiningError> {
        let response = self
            .client
            .post(self.endpoint(SEARCH_PATH))
            .json(&SearchRequest {
                query: query.to_string(),
            })
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        Ok(body
            .url
            .filter(|u| !u.trim().is_empty())
            .map(SourceUrl::from))
    }

    /// Download the PDF report for one model.
    pub async fn generate_pdf(&self, model: &str) -> Result<Vec<u8>> {
        let url = self.report_url(model)?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .with_context(|| format!("failed to request report for {}", model))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            anyhow::bail!("report for {} failed with HTTP {}: {}", model, status, detail);
        }

        let bytes = response.bytes().await.context("failed to read report body")?;
        info!("Downloaded report for {} ({} bytes)", model, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Best-effort extraction of the backend's `detail` message.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl SourceResolver for ApiClient {
    async fn resolve(&self, query: &str) -> Option<SourceUrl> {
        match self.search(query).await {
            Ok(Some(url)) => {
                debug!("Search for {:?} found {}", query, url);
                Some(url)
            }
            Ok(None) => {
                warn!("Search for {:?} returned no result", query);
                None
            }
            Err(e) => {
                warn!("Search for {:?} failed: {}", query, e);
                None
            }
        }
    }
}

#[async_trait]
impl VariableExtractor for ApiClient {
    async fn extract(
        &self,
        tractor: &TractorRef,
        variable: &VariableName,
        source: &SourceUrl,
    ) -> Result<ExtractionOutcome, MiningError> {
        let request = ExtractionRequest {
            tractor_model: tractor.full_name(),
            company: tractor.company.to_string(),
            variable_name: variable.to_string(),
            source_url: source.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint(EXTRACT_PATH))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            debug!("Extraction of {} for {} rejected: {}", variable, tractor, detail);
            return Ok(ExtractionOutcome::error(detail));
        }

        Ok(response.json::<ExtractionOutcome>().await?)
    }
}

#[async_trait]
impl ChatResponder for ApiClient {
    async fn reply(&self, message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint(CHAT_PATH))
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await
            .context("chat request failed")?
            .error_for_status()
            .context("chat backend returned an error")?;

        let body: ChatResponse = response.json().await.context("invalid chat response")?;
        Ok(body.response)
    }
}

/// File name the dashboard uses for a downloaded report.
pub fn report_file_name(model: &str) -> String {
    format!("informe_{}.pdf", model.trim().replace(' ', "_"))
}
