use crate::fetch::Fetcher;
use crate::frontier::Frontier;
use crate::html::{extract_links, strip_markup};
use anyhow::Result;
use search_core::tokenizer::stems;
use search_core::{InvertedIndex, ThreadSafeInvertedIndex, WorkHandle};
use std::sync::Arc;
use url::Url;

struct Context {
    index: Arc<ThreadSafeInvertedIndex>,
    pool: WorkHandle,
    frontier: Frontier,
    fetcher: Arc<dyn Fetcher>,
}

/// Crawls from a seed on the worker pool, admitting at most `max` distinct
/// URLs. Pages are indexed into a private index and merged in one write.
pub struct WebCrawler {
    ctx: Arc<Context>,
}

impl WebCrawler {
    pub fn new(index: Arc<ThreadSafeInvertedIndex>, pool: WorkHandle, fetcher: Arc<dyn Fetcher>, max: usize) -> Self {
        let ctx = Context { index, pool, frontier: Frontier::new(max), fetcher };
        Self { ctx: Arc::new(ctx) }
    }

    /// Crawls from `seed` and blocks until every spawned page task is done.
    /// Returns the number of URLs admitted, seed included.
    pub fn crawl(&self, seed: Url) -> Result<usize> {
        let mut seed = seed;
        seed.set_fragment(None);
        if self.ctx.frontier.try_admit(seed.clone()) {
            submit(&self.ctx, seed)?;
        }
        self.ctx.pool.finish();
        let admitted = self.ctx.frontier.len();
        tracing::info!(admitted, words = self.ctx.index.size_words(), "crawl complete");
        Ok(admitted)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.ctx.frontier
    }
}

fn submit(ctx: &Arc<Context>, url: Url) -> Result<()> {
    let task_ctx = ctx.clone();
    ctx.pool.submit(move || crawl_page(&task_ctx, url))
}

fn crawl_page(ctx: &Arc<Context>, url: Url) {
    let Some(html) = ctx.fetcher.fetch(&url) else {
        tracing::warn!(%url, "page skipped");
        return;
    };

    let links = extract_links(&url, &html);
    let admitted = ctx.frontier.admit_links(links, |link| {
        if let Err(err) = submit(ctx, link) {
            tracing::warn!(error = %err, "link not queued");
        }
    });

    let local = InvertedIndex::new();
    let words = local.add_stems(stems(&strip_markup(&html)), url.as_str(), 1) - 1;
    ctx.index.add_all(local);
    tracing::debug!(%url, words, admitted, "page indexed");
}
