//! HTTP transport for a cluster's job API.
//!
//! Listings and previous-page lookups are `GET /v1/jobs`; details are
//! `POST /v1/jobs/statuses` with the job refs in the body. Blocking-query
//! metadata travels in the `X-Nomad-Index` and `X-Nomad-NextToken` response
//! headers.

use crate::error::{WatchError, WatchResult};
use crate::transport::{QueryKind, QueryMeta, QueryResult, QueryTransport, RequestSpec};
use async_trait::async_trait;
use joblist_types::{ConsistencyIndex, ContinuationToken, JobRecord, JobRef};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Response header carrying the consistency index.
pub const INDEX_HEADER: &str = "X-Nomad-Index";

/// Response header carrying the continuation token.
pub const NEXT_TOKEN_HEADER: &str = "X-Nomad-NextToken";

/// Request header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL of the cluster API (e.g. `http://127.0.0.1:4646`).
    pub address: String,
    /// ACL token, if the cluster requires one.
    pub token: Option<String>,
    /// Longest the server may hold a blocking query (s).
    pub wait_secs: u64,
    /// Client-side request timeout (s). Must exceed `wait_secs`.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:4646".to_string(),
            token: None,
            wait_secs: 60,
            request_timeout_secs: 90,
        }
    }
}

#[derive(Serialize)]
struct DetailsBody<'a> {
    jobs: &'a [JobRef],
}

/// [`QueryTransport`] over reqwest.
pub struct HttpTransport {
    config: HttpConfig,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport for the given cluster.
    pub fn new(config: HttpConfig) -> WatchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WatchError::TransportFailed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.address.trim_end_matches('/'), path)
    }

    fn query_params(&self, spec: &RequestSpec) -> Vec<(&'static str, String)> {
        let mut params = vec![("namespace", spec.scope.namespace.clone())];
        if spec.kind != QueryKind::Details {
            params.push(("meta", "true".to_string()));
            if let Some(per_page) = spec.page_size {
                params.push(("per_page", per_page.to_string()));
            }
            if let Some(token) = &spec.cursor_at {
                params.push(("next_token", token.as_str().to_string()));
            }
            if spec.reverse {
                params.push(("reverse", "true".to_string()));
            }
            if let Some(filter) = &spec.scope.filter {
                params.push(("filter", filter.clone()));
            }
        }
        if !spec.index.is_zero() {
            params.push(("index", spec.index.to_string()));
            params.push(("wait", format!("{}s", self.config.wait_secs)));
        }
        params
    }

    fn build(&self, spec: &RequestSpec) -> RequestBuilder {
        let params = self.query_params(spec);
        let request = match spec.kind {
            QueryKind::Listing | QueryKind::PreviousPage => {
                self.client.get(self.url("/v1/jobs")).query(&params)
            }
            QueryKind::Details => self
                .client
                .post(self.url("/v1/jobs/statuses"))
                .query(&params)
                .json(&DetailsBody { jobs: &spec.jobs }),
        };
        match &self.config.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

fn parse_meta(headers: &HeaderMap) -> QueryMeta {
    let index = headers
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(ConsistencyIndex::new)
        .unwrap_or_default();
    let next_token = headers
        .get(NEXT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ContinuationToken::from);
    QueryMeta { index, next_token }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn issue(&self, spec: &RequestSpec) -> WatchResult<QueryResult> {
        let response = self.build(spec).send().await.map_err(|e| {
            WatchError::TransportFailed(format!("{} request failed: {e}", spec.kind.label()))
        })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::Forbidden(if body.is_empty() {
                status.to_string()
            } else {
                body
            }));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::TransportFailed(format!(
                "{} returned {}: {}",
                spec.kind.label(),
                status,
                body
            )));
        }

        let meta = parse_meta(response.headers());
        let body = response.text().await?;
        let items: Vec<JobRecord> = serde_json::from_str(&body)?;
        debug!(
            "{} returned {} jobs at index {}",
            spec.kind.label(),
            items.len(),
            meta.index
        );
        Ok(QueryResult { items, meta })
    }
}
