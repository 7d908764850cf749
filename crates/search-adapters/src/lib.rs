//! quorum/crates/search-adapters/src/lib.rs
//!
//! HTTP client for the external indexed search service. The backend is
//! an opaque black box: we POST the raw term and map whatever goes
//! wrong (connect failure, timeout, non-2xx, malformed body) to
//! `AppError::Unavailable`, which the search resolver treats as a
//! degradation signal rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use domains::{AppError, ContentKind, ContentRef, IndexedSearch, Result, SearchHit};

#[derive(Debug, Clone)]
pub struct HttpSearchConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

pub struct HttpSearchClient {
    http: reqwest::Client,
    config: HttpSearchConfig,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    kind: &'a str,
    term: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<WireHit>,
}

#[derive(Deserialize)]
struct WireHit {
    id: uuid::Uuid,
    title: String,
    snippet: String,
    score: f32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl HttpSearchClient {
    pub fn new(config: HttpSearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Unavailable(format!("search client init: {e}")))?;
        Ok(Self { http, config })
    }

    fn unavailable(stage: &str, err: impl std::fmt::Display) -> AppError {
        AppError::Unavailable(format!("indexed search {stage}: {err}"))
    }
}

#[async_trait]
impl IndexedSearch for HttpSearchClient {
    async fn query(
        &self,
        kind: ContentKind,
        term: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&SearchRequest {
            kind: kind.as_str(),
            term,
            limit,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::unavailable("request", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::unavailable("response", status));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable("decode", e))?;

        debug!(kind = %kind, hits = body.hits.len(), "indexed search responded");
        Ok(body
            .hits
            .into_iter()
            .take(limit)
            .map(|hit| SearchHit {
                content: ContentRef { kind, id: hit.id },
                title: hit.title,
                snippet: hit.snippet,
                score: hit.score,
                created_at: hit.created_at,
            })
            .collect())
    }
}
