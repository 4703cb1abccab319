//! Query searchers: turn raw query lines into ranked results keyed by the
//! normalized query (its unique stems, sorted, joined by single spaces).

use crate::index::{InvertedIndex, ThreadSafeInvertedIndex};
use crate::lock::{Guarded, LockPolicy, NoLock, ReadWriteLock};
use crate::persist::{self, ResultMap};
use crate::pool::WorkHandle;
use crate::tokenizer::unique_stems;
use crate::SearchResult;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Per-line query handling. Feed it lines, then call `finish` before reading
/// results back.
pub trait QueryHandler {
    fn search(&mut self, line: &str, exact: bool);

    /// Blocks until every line handed to `search` has its results stored.
    fn finish(&mut self) {}

    fn contains_query(&self, key: &str) -> bool;

    /// Results for a normalized key; empty when the key was never searched.
    fn results(&self, key: &str) -> Vec<SearchResult>;

    fn results_json(&self) -> Result<Vec<u8>>;

    fn write_results(&self, path: &Path) -> Result<()> {
        let bytes = self.results_json()?;
        persist::write_json(path, &bytes)
    }
}

pub fn query_key(stems: &BTreeSet<String>) -> String {
    stems.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Normalized key for a raw line, `None` when the line has no stems.
pub fn normalize(line: &str) -> Option<(BTreeSet<String>, String)> {
    let stems = unique_stems(line);
    if stems.is_empty() {
        return None;
    }
    let key = query_key(&stems);
    Some((stems, key))
}

/// Lines of a query file.
pub fn query_lines(path: &Path) -> Result<impl Iterator<Item = io::Result<String>>> {
    let f = File::open(path).with_context(|| format!("opening queries {}", path.display()))?;
    Ok(BufReader::new(f).lines())
}

/// Runs every line of `path` through `handler` and waits for it to finish.
pub fn search_file<H: QueryHandler + ?Sized>(handler: &mut H, path: &Path, exact: bool) -> Result<()> {
    for line in query_lines(path)? {
        handler.search(&line?, exact);
    }
    handler.finish();
    Ok(())
}

pub struct QuerySearcher<'a, L: LockPolicy = NoLock> {
    index: &'a InvertedIndex<L>,
    results: ResultMap,
}

impl<'a, L: LockPolicy> QuerySearcher<'a, L> {
    pub fn new(index: &'a InvertedIndex<L>) -> Self {
        Self { index, results: ResultMap::new() }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<L: LockPolicy> QueryHandler for QuerySearcher<'_, L> {
    fn search(&mut self, line: &str, exact: bool) {
        let Some((stems, key)) = normalize(line) else { return };
        if self.results.contains_key(&key) {
            return;
        }
        let hits = self.index.search(&stems, exact);
        self.results.insert(key, hits);
    }

    fn contains_query(&self, key: &str) -> bool {
        self.results.contains_key(key)
    }

    fn results(&self, key: &str) -> Vec<SearchResult> {
        self.results.get(key).cloned().unwrap_or_default()
    }

    fn results_json(&self) -> Result<Vec<u8>> {
        persist::results_json(&self.results)
    }
}

/// Searches on the worker pool. The results table has its own lock,
/// independent of the index lock.
pub struct MultithreadedSearcher {
    index: Arc<ThreadSafeInvertedIndex>,
    results: Arc<Guarded<ResultMap, ReadWriteLock>>,
    pool: WorkHandle,
}

impl MultithreadedSearcher {
    pub fn new(index: Arc<ThreadSafeInvertedIndex>, pool: WorkHandle) -> Self {
        Self { index, results: Arc::new(Guarded::new(ResultMap::new())), pool }
    }

    /// Queues one line; returns at once.
    pub fn submit(&self, line: &str, exact: bool) {
        let line = line.to_string();
        let index = self.index.clone();
        let results = self.results.clone();
        let queued = self.pool.submit(move || {
            let Some((stems, key)) = normalize(&line) else { return };
            if results.read(|r| r.contains_key(&key)) {
                return;
            }
            let hits = index.search(&stems, exact);
            tracing::debug!(query = %key, hits = hits.len(), "query searched");
            results.write(|r| {
                r.insert(key, hits);
            });
        });
        if let Err(err) = queued {
            tracing::warn!(error = %err, "query not queued");
        }
    }

    pub fn finish(&self) {
        self.pool.finish()
    }

    /// Searches `line` and waits for its results.
    pub fn search_now(&self, line: &str, exact: bool) -> Option<(String, Vec<SearchResult>)> {
        let (_, key) = normalize(line)?;
        self.submit(line, exact);
        self.finish();
        let hits = self.results.read(|r| r.get(&key).cloned().unwrap_or_default());
        Some((key, hits))
    }

    pub fn contains_query(&self, key: &str) -> bool {
        self.results.read(|r| r.contains_key(key))
    }

    pub fn results(&self, key: &str) -> Vec<SearchResult> {
        self.results.read(|r| r.get(key).cloned().unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.results.read(|r| r.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn results_json(&self) -> Result<Vec<u8>> {
        self.results.read(persist::results_json)
    }
}

impl QueryHandler for MultithreadedSearcher {
    fn search(&mut self, line: &str, exact: bool) {
        self.submit(line, exact)
    }

    fn finish(&mut self) {
        MultithreadedSearcher::finish(self)
    }

    fn contains_query(&self, key: &str) -> bool {
        MultithreadedSearcher::contains_query(self, key)
    }

    fn results(&self, key: &str) -> Vec<SearchResult> {
        MultithreadedSearcher::results(self, key)
    }

    fn results_json(&self) -> Result<Vec<u8>> {
        MultithreadedSearcher::results_json(self)
    }
}
