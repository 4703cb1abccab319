use anyhow::{Context, Result};
use axum::{extract::{Query, State}, routing::get, Json, Router};
use crawler::{FetchConfig, HttpFetcher, WebCrawler};
use search_core::builder::build_threaded;
use search_core::searcher::normalize;
use search_core::{SearchResult, ThreadSafeInvertedIndex, WorkQueue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Overrides the server-wide match mode for this request.
    pub exact: Option<bool>,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// Normalized query: unique stems, sorted, space separated.
    pub key: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub words: usize,
    pub locations: usize,
    pub generated_at: String,
}

/// Where the served index comes from.
#[derive(Debug, Clone, Default)]
pub struct IndexSource {
    pub text: Option<PathBuf>,
    pub html: Option<String>,
    pub max: usize,
    pub threads: usize,
    pub exact: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<ThreadSafeInvertedIndex>,
    pub pool: Arc<WorkQueue>,
    pub exact: bool,
    pub generated_at: String,
}

/// Builds and/or crawls the index, blocking until both are done. Must run off
/// the async runtime.
pub fn load(source: &IndexSource) -> Result<AppState> {
    let pool = Arc::new(WorkQueue::new(source.threads)?);
    let index = Arc::new(ThreadSafeInvertedIndex::default());

    if let Some(seed) = &source.html {
        let seed = Url::parse(seed).with_context(|| format!("parsing seed url {seed}"))?;
        let fetcher = Arc::new(HttpFetcher::new(FetchConfig::default())?);
        WebCrawler::new(index.clone(), pool.handle(), fetcher, source.max).crawl(seed)?;
    }
    if let Some(input) = &source.text {
        build_threaded(input, &index, &pool.handle())?;
    }

    let generated_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    tracing::info!(words = index.size_words(), locations = index.size_counts(), "index ready");
    Ok(AppState { index, pool, exact: source.exact, generated_at })
}

/// CORS from `CORS_ALLOW_ORIGIN` (comma separated), any origin when unset or unparsable.
fn cors_layer() -> CorsLayer {
    let any = || CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                any()
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any(),
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let exact = params.exact.unwrap_or(state.exact);
    let k = params.k.clamp(1, 100);

    let index = state.index.clone();
    let line = params.q.clone();
    // straight against the index; no result cache, no wait on the pool
    let found = tokio::task::spawn_blocking(move || {
        normalize(&line).map(|(stems, key)| {
            let hits = index.search(&stems, exact);
            (key, hits)
        })
    })
    .await;
    let (key, hits) = match found {
        Ok(Some(found)) => found,
        Ok(None) => (String::new(), Vec::new()),
        Err(err) => {
            tracing::error!(error = %err, "search task failed");
            (String::new(), Vec::new())
        }
    };

    let total_hits = hits.len();
    let results = hits.into_iter().take(k).collect();
    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.q, %key, total_hits, took_s, "search served");
    Json(SearchResponse { query: params.q, key, took_s, total_hits, results })
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        words: state.index.size_words(),
        locations: state.index.size_counts(),
        generated_at: state.generated_at.clone(),
    })
}
