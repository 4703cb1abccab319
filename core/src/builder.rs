use crate::index::{InvertedIndex, ThreadSafeInvertedIndex};
use crate::lock::LockPolicy;
use crate::pool::WorkHandle;
use crate::tokenizer::stems;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

fn is_text_file(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".txt") || name.ends_with(".text")
}

/// Files to index under `input`. A plain file is returned whatever its
/// extension; a directory yields its `.txt`/`.text` files, recursively.
pub fn text_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", input.display()))?;
        let p = entry.path();
        if entry.file_type().is_file() && is_text_file(p) {
            files.push(p.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Adds every stem of `path` to `index`, positions starting at 1. The
/// location is the path as given.
pub fn index_file<L: LockPolicy>(path: &Path, index: &InvertedIndex<L>) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let location = path.to_string_lossy();
    index.add_stems(stems(&text), &location, 1);
    Ok(())
}

/// Single-threaded build. Unreadable files are logged and skipped; returns
/// how many files were indexed.
pub fn build<L: LockPolicy>(input: &Path, index: &InvertedIndex<L>) -> Result<usize> {
    let mut indexed = 0;
    for path in text_files(input)? {
        match index_file(&path, index) {
            Ok(()) => indexed += 1,
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "skipping file"),
        }
    }
    tracing::info!(indexed, words = index.size_words(), "index build complete");
    Ok(indexed)
}

/// One task per file: each builds a private index and merges it into
/// `index` with a single write. Waits on the pool before returning the
/// number of files submitted.
pub fn build_threaded(input: &Path, index: &Arc<ThreadSafeInvertedIndex>, pool: &WorkHandle) -> Result<usize> {
    let files = text_files(input)?;
    let submitted = files.len();
    for path in files {
        let shared = index.clone();
        pool.submit(move || {
            let local = InvertedIndex::new();
            match index_file(&path, &local) {
                Ok(()) => shared.add_all(local),
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "skipping file"),
            }
        })?;
    }
    pool.finish();
    tracing::info!(submitted, words = index.size_words(), "index build complete");
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_filter_is_case_insensitive() {
        assert!(is_text_file(Path::new("a/B.TXT")));
        assert!(is_text_file(Path::new("notes.Text")));
        assert!(!is_text_file(Path::new("data.json")));
        assert!(!is_text_file(Path::new("txt")));
    }

    #[test]
    fn single_file_is_taken_as_is() {
        let files = text_files(Path::new("does/not/matter.md")).unwrap();
        assert_eq!(files, vec![PathBuf::from("does/not/matter.md")]);
    }
}
