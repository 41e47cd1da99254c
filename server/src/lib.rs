use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use searchcore::{IndexPaths, QueryEngine, QueryOptions, SearchOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    /// Results per query when the request does not say.
    pub default_k: usize,
    pub drop_numeric_terms: bool,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self { index_dir: index_dir.into(), default_k: 5, drop_numeric_terms: false }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<String>,
    pub unavailable_terms: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub default_k: usize,
}

pub fn build_app(config: &ServerConfig) -> Result<Router> {
    // The engine must be ready before anything is served.
    let options = QueryOptions { drop_numeric_terms: config.drop_numeric_terms };
    let engine = QueryEngine::load_with(&IndexPaths::new(&config.index_dir), options)?;
    let state = AppState { engine: Arc::new(engine), default_k: config.default_k.clamp(1, MAX_K) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/", get(home_page))
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_page))
        .route("/api/search", get(search_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

struct TimedSearch {
    outcome: SearchOutcome,
    took: std::time::Duration,
}

async fn run_search(state: &AppState, params: &SearchParams) -> Result<TimedSearch, (StatusCode, String)> {
    let k = params.k.unwrap_or(state.default_k).min(MAX_K);
    let engine = state.engine.clone();
    let query = params.q.clone();
    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || engine.search_detailed(&query, k))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("search task failed: {e}")))?;
    let took = start.elapsed();
    for fault in &outcome.faults {
        tracing::warn!(term = %fault.term, error = %fault.error, "postings unavailable");
    }
    tracing::info!(query = %params.q, took_ms = took.as_secs_f64() * 1000.0, hits = outcome.urls.len(), "search");
    Ok(TimedSearch { outcome, took })
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let TimedSearch { outcome, took } = run_search(&state, &params).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: took.as_millis(),
        took_s: took.as_secs_f64(),
        total_hits: outcome.urls.len(),
        results: outcome.urls,
        unavailable_terms: outcome.faults.into_iter().map(|f| f.term).collect(),
    }))
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>{title}</title>
  <style>
    body { background-color: #f4f4f9; font-family: Arial, sans-serif; margin: 0; }
    header { background-color: #4a76a8; color: white; padding: 1rem 0; text-align: center; font-size: 2rem; }
    main { display: flex; flex-direction: column; align-items: center; margin-top: 3rem; }
    form { display: flex; gap: 0.5rem; width: 60%; max-width: 600px; }
    input[type="text"] { flex: 1; padding: 0.75rem; font-size: 1rem; border: 1px solid #ccc; border-radius: 4px; }
    button { padding: 0.75rem 1.5rem; font-size: 1rem; background-color: #4a76a8; color: white; border: none; border-radius: 4px; }
    .results { width: 60%; max-width: 600px; margin-top: 2rem; }
    .no-results, .timing { color: #666; }
  </style>
</head>
<body>
  <header>IR Browser</header>
  <main>
    <form action="/search" method="get">
      <input type="text" name="q" value="{query}" placeholder="Type your query here..." autofocus required />
      <button type="submit">Search</button>
    </form>
"#;

const PAGE_FOOT: &str = "  </main>\n</body>\n</html>\n";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, query: &str, body: &str) -> String {
    let head = PAGE_HEAD.replace("{title}", title).replace("{query}", &escape_html(query));
    format!("{head}{body}{PAGE_FOOT}")
}

async fn home_page() -> Html<String> {
    Html(page("IR Browser", "", "    <hr />\n"))
}

pub async fn search_page(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        let body = "    <div class=\"results\"><p class=\"no-results\">No query provided.</p></div>\n";
        return Ok(Html(page("IR Browser - Results", "", body)));
    }
    let TimedSearch { outcome, took } = run_search(&state, &params).await?;

    let safe_query = escape_html(&query);
    let mut body = format!("    <div class=\"results\">\n      <h2>Results for: “{safe_query}”</h2>\n");
    if outcome.urls.is_empty() {
        body.push_str("      <p class=\"no-results\">No documents found.</p>\n");
    } else {
        body.push_str("      <ol>\n");
        for url in &outcome.urls {
            let safe_url = escape_html(url);
            body.push_str(&format!("        <li><a href=\"{safe_url}\" target=\"_blank\">{safe_url}</a></li>\n"));
        }
        body.push_str("      </ol>\n");
    }
    if !outcome.faults.is_empty() {
        let terms: Vec<String> = outcome.faults.iter().map(|f| escape_html(&f.term)).collect();
        body.push_str(&format!("      <p class=\"no-results\">Index data unavailable for: {}</p>\n", terms.join(", ")));
    }
    body.push_str("    </div>\n");
    body.push_str(&format!("    <p class=\"timing\">Search time: {:.1} ms</p>\n", took.as_secs_f64() * 1000.0));
    Ok(Html(page("IR Browser - Results", &query, &body)))
}
