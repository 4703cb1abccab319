use anyhow::{Context, Result};
use clap::Parser;
use crawler::{FetchConfig, HttpFetcher, WebCrawler};
use search_core::builder::{build, build_threaded};
use search_core::lock::LockPolicy;
use search_core::searcher::{search_file, QueryHandler};
use search_core::{InvertedIndex, MultithreadedSearcher, QuerySearcher, ThreadSafeInvertedIndex, WorkQueue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "indexer")]
#[command(about = "Build an inverted index from text files or a web crawl and run queries against it", long_about = None)]
struct Cli {
    /// Text file or directory to index
    #[arg(long, num_args = 0..=1)]
    text: Option<Option<PathBuf>>,
    /// Seed URL to crawl (implies the multithreaded index)
    #[arg(long)]
    html: Option<String>,
    /// Maximum number of distinct URLs to crawl, seed included
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    max: i64,
    /// Worker threads; missing, invalid or below 1 means 5
    #[arg(long, num_args = 0..=1, allow_negative_numbers = true)]
    threads: Option<Option<String>>,
    /// File of queries, one per line
    #[arg(long)]
    query: Option<PathBuf>,
    /// Exact instead of prefix matching
    #[arg(long, default_value_t = false)]
    exact: bool,
    /// Write the index as JSON (default index.json)
    #[arg(long, num_args = 0..=1)]
    index: Option<Option<PathBuf>>,
    /// Write word counts per location as JSON (default counts.json)
    #[arg(long, num_args = 0..=1)]
    counts: Option<Option<PathBuf>>,
    /// Write search results as JSON (default results.json)
    #[arg(long, num_args = 0..=1)]
    results: Option<Option<PathBuf>>,
}

impl Cli {
    fn threaded(&self) -> bool {
        self.threads.is_some() || self.html.is_some()
    }

    fn thread_count(&self) -> usize {
        self.threads
            .clone()
            .flatten()
            .and_then(|n| n.trim().parse::<usize>().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(WorkQueue::DEFAULT_THREADS)
    }

    fn text_input(&self) -> Option<&Path> {
        match &self.text {
            Some(Some(path)) => Some(path),
            Some(None) => {
                tracing::warn!("--text given without a path");
                None
            }
            None => None,
        }
    }
}

fn output(flag: &Option<Option<PathBuf>>, default: &str) -> Option<PathBuf> {
    flag.as_ref().map(|p| p.clone().unwrap_or_else(|| PathBuf::from(default)))
}

/// Logs a failed step; the driver carries on with the next one.
fn report(step: &str, result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(step, error = %format!("{err:#}"), "step failed");
    }
}

fn main() -> Result<()> {
    // stdout carries only the elapsed line
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let start = Instant::now();
    let cli = Cli::parse();

    if cli.threaded() {
        run_threaded(&cli)?;
    } else {
        run_single(&cli);
    }

    println!("Elapsed: {:.6} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_single(cli: &Cli) {
    let index = InvertedIndex::new();
    if let Some(input) = cli.text_input() {
        report("build", build(input, &index).map(drop));
    }
    let mut searcher = QuerySearcher::new(&index);
    run_queries(cli, &mut searcher);
    write_outputs(cli, &index, &searcher);
}

fn run_threaded(cli: &Cli) -> Result<()> {
    let pool = WorkQueue::new(cli.thread_count())?;
    let index = Arc::new(ThreadSafeInvertedIndex::default());

    if let Some(seed) = &cli.html {
        report("crawl", crawl(seed, cli.max, &index, &pool));
    }
    if let Some(input) = cli.text_input() {
        report("build", build_threaded(input, &index, &pool.handle()).map(drop));
    }

    let mut searcher = MultithreadedSearcher::new(index.clone(), pool.handle());
    run_queries(cli, &mut searcher);
    write_outputs(cli, &index, &searcher);
    pool.shutdown();
    Ok(())
}

fn crawl(seed: &str, max: i64, index: &Arc<ThreadSafeInvertedIndex>, pool: &WorkQueue) -> Result<()> {
    let seed = Url::parse(seed).with_context(|| format!("parsing seed url {seed}"))?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::default())?);
    let max = usize::try_from(max.max(1)).unwrap_or(1);
    WebCrawler::new(index.clone(), pool.handle(), fetcher, max).crawl(seed)?;
    Ok(())
}

fn run_queries<H: QueryHandler>(cli: &Cli, searcher: &mut H) {
    if let Some(path) = &cli.query {
        report("query", search_file(searcher, path, cli.exact));
    }
}

fn write_outputs<L: LockPolicy, H: QueryHandler>(cli: &Cli, index: &InvertedIndex<L>, searcher: &H) {
    if let Some(path) = output(&cli.index, "index.json") {
        report("index", index.write_index(&path));
    }
    if let Some(path) = output(&cli.counts, "counts.json") {
        report("counts", index.write_counts(&path));
    }
    if let Some(path) = output(&cli.results, "results.json") {
        report("results", searcher.write_results(&path));
    }
}
