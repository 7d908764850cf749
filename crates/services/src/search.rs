//! # Search Resolver
//!
//! Decides, per call, whether the external indexed service or the local
//! relational matcher answers a search. The degraded path is a typed,
//! inspectable outcome rather than exception-driven control flow: the
//! resolver logs which branch served the request and hands the caller
//! one uniform hit shape either way. It never raises for backend
//! trouble — only a relational-store failure (for which there is no
//! further fallback) propagates.

use std::sync::Arc;

use domains::{ContentKind, ContentSearch, IndexedSearch, Result, SearchHit};

use crate::sanitizer::boolean_match_expr;

/// Which backend produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPath {
    Indexed,
    Fallback,
}

struct SearchOutcome {
    hits: Vec<SearchHit>,
    path: SearchPath,
}

pub struct SearchService {
    indexed: Option<Arc<dyn IndexedSearch>>,
    fallback: Arc<dyn ContentSearch>,
}

impl SearchService {
    /// `indexed` is `None` when no indexed backend is configured at all;
    /// the resolver then goes straight to the fallback matcher.
    pub fn new(indexed: Option<Arc<dyn IndexedSearch>>, fallback: Arc<dyn ContentSearch>) -> Self {
        Self { indexed, fallback }
    }

    /// Search `kind` for `raw_term`, returning at most `limit` hits.
    ///
    /// The raw term goes to the indexed service untouched (it tokenizes
    /// itself); the fallback receives the sanitized expression. Callers
    /// may cancel by dropping the future — the fallback query is only
    /// issued after the indexed attempt has already settled, so a
    /// cancelled request never triggers extra load on the slow path.
    pub async fn search(
        &self,
        kind: ContentKind,
        raw_term: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let outcome = self.resolve(kind, raw_term, limit).await?;
        tracing::debug!(
            %kind,
            hits = outcome.hits.len(),
            degraded = outcome.path == SearchPath::Fallback,
            "search resolved"
        );
        Ok(outcome.hits)
    }

    async fn resolve(
        &self,
        kind: ContentKind,
        raw_term: &str,
        limit: usize,
    ) -> Result<SearchOutcome> {
        if let Some(indexed) = &self.indexed {
            match indexed.query(kind, raw_term, limit).await {
                Ok(mut hits) => {
                    hits.truncate(limit);
                    return Ok(SearchOutcome {
                        hits,
                        path: SearchPath::Indexed,
                    });
                }
                // Disabled, unreachable, timed out, malformed — all the
                // same to us: recover through the local matcher.
                Err(err) => {
                    tracing::debug!(%kind, error = %err, "indexed search unavailable, falling back");
                }
            }
        }

        let expr = boolean_match_expr(raw_term);
        if expr.is_empty() {
            return Ok(SearchOutcome {
                hits: Vec::new(),
                path: SearchPath::Fallback,
            });
        }

        let mut hits = self.fallback.match_terms(kind, &expr, limit).await?;
        hits.truncate(limit);
        Ok(SearchOutcome {
            hits,
            path: SearchPath::Fallback,
        })
    }
}
