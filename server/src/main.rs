use anyhow::Result;
use clap::Parser;
use search_core::WorkQueue;
use server::{build_app, load, IndexSource};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Text file or directory to index at startup
    #[arg(long)]
    text: Option<PathBuf>,
    /// Seed URL to crawl at startup
    #[arg(long)]
    html: Option<String>,
    /// Maximum number of distinct URLs to crawl
    #[arg(long, default_value_t = 1)]
    max: usize,
    /// Worker threads
    #[arg(long, default_value_t = WorkQueue::DEFAULT_THREADS)]
    threads: usize,
    /// Exact instead of prefix matching by default
    #[arg(long, default_value_t = false)]
    exact: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let source = IndexSource { text: args.text, html: args.html, max: args.max, threads: args.threads, exact: args.exact };
    let state = tokio::task::spawn_blocking(move || load(&source)).await??;
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
