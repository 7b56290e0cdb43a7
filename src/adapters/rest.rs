//! REST history client
//!
//! Request/response fetches used at start-up: recent intelligence for the
//! initial population and daily growth history for threshold calibration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::errors::{FetchError, FetchResult};
use crate::adapters::traits::{CredentialStore, IntelligenceHistorySource, ValuationHistorySource};
use crate::core::types::{DomainRecord, HistoryPoint};

/// HTTP timeout for history calls
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Placeholder substituted with the instrument code in path templates
pub const CODE_PLACEHOLDER: &str = "{code}";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Wrapped { data: Option<Vec<Value>> },
    Bare(Vec<Value>),
}

impl ListResponse {
    fn into_items(self) -> Vec<Value> {
        match self {
            ListResponse::Wrapped { data } => data.unwrap_or_default(),
            ListResponse::Bare(items) => items,
        }
    }
}

/// Paths of the history endpoints, relative to the base URL
#[derive(Debug, Clone)]
pub struct RestPaths {
    pub intelligence_history: String,
    pub fund_history: String,
}

pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    paths: RestPaths,
    credentials: Arc<dyn CredentialStore>,
    token_key: String,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        paths: RestPaths,
        credentials: Arc<dyn CredentialStore>,
        token_key: impl Into<String>,
    ) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths,
            credentials,
            token_key: token_key.into(),
        })
    }

    async fn get_list(&self, path: &str, limit: usize) -> FetchResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(&[("limit", limit)]);
        if let Some(token) = self.credentials.token(&self.token_key) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(body.into_items())
    }
}

/// Decode each element, dropping the ones that do not fit `T`
fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(error = %e, kind = what, "Dropping malformed history item");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ValuationHistorySource for RestClient {
    async fn fetch_history(
        &self,
        instrument_code: &str,
        limit: usize,
    ) -> FetchResult<Vec<HistoryPoint>> {
        let path = self.paths.fund_history.replace(CODE_PLACEHOLDER, instrument_code);
        let items = self.get_list(&path, limit).await?;
        Ok(decode_items(items, "valuation_history"))
    }
}

#[async_trait]
impl IntelligenceHistorySource for RestClient {
    async fn fetch_recent(&self, limit: usize) -> FetchResult<Vec<DomainRecord>> {
        let items = self.get_list(&self.paths.intelligence_history, limit).await?;
        let records: Vec<DomainRecord> = decode_items(items, "intelligence_history");
        Ok(records.into_iter().filter(DomainRecord::has_valid_urgency).collect())
    }
}
