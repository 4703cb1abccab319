//! JSON output for the index, the word counts and query results.
//!
//! Everything is rendered to an in-memory buffer first so callers can hold a
//! read lock only while rendering, never while touching the filesystem.

use crate::{Position, SearchResult};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// word -> location -> positions
pub type WordMap = BTreeMap<String, BTreeMap<String, BTreeSet<Position>>>;
/// location -> total words
pub type CountMap = BTreeMap<String, usize>;
/// normalized query -> ranked results
pub type ResultMap = BTreeMap<String, Vec<SearchResult>>;

/// Tab-indented pretty JSON. Map keys keep their `BTreeMap` order.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    Ok(buf)
}

pub fn index_json(words: &WordMap) -> Result<Vec<u8>> {
    to_pretty_json(words)
}

pub fn counts_json(counts: &CountMap) -> Result<Vec<u8>> {
    to_pretty_json(counts)
}

/// Every result is emitted, including any with zero matches.
pub fn results_json(results: &ResultMap) -> Result<Vec<u8>> {
    to_pretty_json(results)
}

pub fn write_json(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(f);
    out.write_all(bytes)?;
    out.flush()?;
    Ok(())
}
