use anyhow::Result;
use clap::Parser;
use owtsearch_core::SearchConfig;
use owtsearch_expander::{DisabledExpander, GeminiExpander, QueryExpander, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use owtsearch_server::{build_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, env = "OWT_INDEX", default_value = "./indexdir")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 5000)]
    port: u16,
    /// Documents retrieved per query variant
    #[arg(long, default_value_t = 10)]
    per_variant_limit: usize,
    /// Documents returned per request
    #[arg(long, default_value_t = 20)]
    total_limit: usize,
    /// Maximum snippet length in characters
    #[arg(long, default_value_t = 200)]
    snippet_chars: usize,
    /// Seconds to wait for query expansion before searching without it
    #[arg(long, default_value_t = 30)]
    expansion_timeout_secs: u64,
    /// Gemini API key; expansion is disabled when absent
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    gemini_model: String,
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    gemini_endpoint: String,
}

fn expander(args: &Args) -> Result<Arc<dyn QueryExpander>> {
    match args.gemini_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            let gemini = GeminiExpander::new(key)?
                .with_endpoint(args.gemini_endpoint.clone())
                .with_model(args.gemini_model.clone());
            Ok(Arc::new(gemini))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, query refinement disabled");
            Ok(Arc::new(DisabledExpander))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = SearchConfig {
        per_variant_limit: args.per_variant_limit,
        total_limit: args.total_limit,
        snippet_max_chars: args.snippet_chars,
        ..SearchConfig::default()
    };
    let timeout = Duration::from_secs(args.expansion_timeout_secs);
    let state = match AppState::open(&args.index, config, expander(&args)?, timeout) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(index = %args.index, error = %e, "index not found or invalid; run `indexer build` first");
            return Err(e);
        }
    };
    if let Some(engine) = &state.engine {
        tracing::info!(documents = engine.document_count(), "index loaded");
    }

    let app = build_app(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
