use crate::lock::{Guarded, LockPolicy, NoLock, ReadWriteLock};
use crate::persist::{self, CountMap, WordMap};
use crate::{Position, SearchResult};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::Path;

#[derive(Debug, Default)]
struct Postings {
    words: WordMap,
    /// location -> distinct (word, position) pairs recorded there
    counts: CountMap,
}

impl Postings {
    fn add(&mut self, stem: &str, location: &str, position: Position) -> bool {
        let added = self
            .words
            .entry(stem.to_string())
            .or_default()
            .entry(location.to_string())
            .or_default()
            .insert(position);
        if added {
            *self.counts.entry(location.to_string()).or_insert(0) += 1;
        }
        added
    }

    fn merge(&mut self, other: Postings) {
        for (word, locations) in other.words {
            match self.words.get_mut(&word) {
                None => {
                    self.words.insert(word, locations);
                }
                Some(mine) => {
                    for (location, positions) in locations {
                        match mine.get_mut(&location) {
                            None => {
                                mine.insert(location, positions);
                            }
                            Some(existing) => existing.extend(positions),
                        }
                    }
                }
            }
        }
        for (location, count) in other.counts {
            *self.counts.entry(location).or_insert(0) += count;
        }
    }

    fn exact_search(&self, queries: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut ranking = Ranking::default();
        for query in queries {
            if let Some(locations) = self.words.get(query) {
                ranking.visit(locations, &self.counts);
            }
        }
        ranking.finish()
    }

    fn partial_search(&self, queries: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut ranking = Ranking::default();
        for query in queries {
            let tail = self
                .words
                .range::<str, _>((Bound::Included(query.as_str()), Bound::Unbounded));
            // keys are sorted, so the prefix matches are contiguous
            for (word, locations) in tail {
                if !word.starts_with(query.as_str()) {
                    break;
                }
                ranking.visit(locations, &self.counts);
            }
        }
        ranking.finish()
    }
}

/// Accumulates one `SearchResult` per location for a single query set.
#[derive(Default)]
struct Ranking {
    results: Vec<SearchResult>,
    lookup: HashMap<String, usize>,
}

impl Ranking {
    fn visit(&mut self, locations: &BTreeMap<String, BTreeSet<Position>>, counts: &CountMap) {
        for (location, positions) in locations {
            let slot = match self.lookup.get(location) {
                Some(&slot) => slot,
                None => {
                    self.results.push(SearchResult::new(location.clone()));
                    self.lookup.insert(location.clone(), self.results.len() - 1);
                    self.results.len() - 1
                }
            };
            self.results[slot].update(positions.len(), counts);
        }
    }

    fn finish(mut self) -> Vec<SearchResult> {
        self.results.sort();
        self.results
    }
}

/// Inverted index of word stem -> location -> positions, plus per-location
/// word counts.
///
/// The lock policy is fixed at construction: `InvertedIndex::new()` (no
/// locking) for single-threaded or task-local use,
/// `ThreadSafeInvertedIndex::default()` when shared between workers. All
/// methods take `&self`; readers get owned snapshots so nothing borrowed
/// outlives the lock.
pub struct InvertedIndex<L: LockPolicy = NoLock> {
    data: Guarded<Postings, L>,
}

pub type ThreadSafeInvertedIndex = InvertedIndex<ReadWriteLock>;

impl<L: LockPolicy> Default for InvertedIndex<L> {
    fn default() -> Self {
        Self { data: Guarded::new(Postings::default()) }
    }
}

impl<L: LockPolicy> std::fmt::Debug for InvertedIndex<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.data.read(|d| {
            f.debug_struct("InvertedIndex")
                .field("words", &d.words.len())
                .field("locations", &d.counts.len())
                .finish()
        })
    }
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: LockPolicy> InvertedIndex<L> {
    /// Records `stem` at `position` in `location`. Returns false when that
    /// triple was already present, in which case nothing changes.
    pub fn add(&self, stem: &str, location: &str, position: Position) -> bool {
        self.data.write(|d| d.add(stem, location, position))
    }

    /// Adds `stems` at consecutive positions starting at `start`, under a
    /// single write acquisition. Returns the next free position.
    pub fn add_stems<I, S>(&self, stems: I, location: &str, start: Position) -> Position
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.data.write(|d| {
            let mut position = start;
            for stem in stems {
                d.add(stem.as_ref(), location, position);
                position += 1;
            }
            position
        })
    }

    /// Folds a task-local index into this one. Location/position sets missing
    /// here are adopted as-is, overlapping ones are unioned, and word counts
    /// are summed per location.
    pub fn add_all(&self, other: InvertedIndex) {
        let other = other.data.into_inner();
        self.data.write(|d| d.merge(other));
    }

    pub fn search(&self, queries: &BTreeSet<String>, exact: bool) -> Vec<SearchResult> {
        if exact {
            self.exact_search(queries)
        } else {
            self.partial_search(queries)
        }
    }

    /// Ranks locations containing any query stem verbatim.
    pub fn exact_search(&self, queries: &BTreeSet<String>) -> Vec<SearchResult> {
        self.data.read(|d| d.exact_search(queries))
    }

    /// Ranks locations containing any word that starts with a query stem.
    pub fn partial_search(&self, queries: &BTreeSet<String>) -> Vec<SearchResult> {
        self.data.read(|d| d.partial_search(queries))
    }

    pub fn words(&self) -> Vec<String> {
        self.data.read(|d| d.words.keys().cloned().collect())
    }

    pub fn locations(&self, word: &str) -> Vec<String> {
        self.data.read(|d| {
            d.words
                .get(word)
                .map(|locs| locs.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn positions(&self, word: &str, location: &str) -> Vec<Position> {
        self.data.read(|d| {
            d.words
                .get(word)
                .and_then(|locs| locs.get(location))
                .map(|p| p.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.data.read(|d| d.words.contains_key(word))
    }

    pub fn contains_location(&self, word: &str, location: &str) -> bool {
        self.data
            .read(|d| d.words.get(word).is_some_and(|locs| locs.contains_key(location)))
    }

    pub fn contains_position(&self, word: &str, location: &str, position: Position) -> bool {
        self.data.read(|d| {
            d.words
                .get(word)
                .and_then(|locs| locs.get(location))
                .is_some_and(|p| p.contains(&position))
        })
    }

    /// True when `location` has at least one recorded word.
    pub fn has_location(&self, location: &str) -> bool {
        self.data.read(|d| d.counts.contains_key(location))
    }

    /// Total words recorded for `location`, 0 when unknown.
    pub fn count(&self, location: &str) -> usize {
        self.data.read(|d| d.counts.get(location).copied().unwrap_or(0))
    }

    pub fn counts(&self) -> CountMap {
        self.data.read(|d| d.counts.clone())
    }

    pub fn size_words(&self) -> usize {
        self.data.read(|d| d.words.len())
    }

    pub fn size_locations(&self, word: &str) -> usize {
        self.data.read(|d| d.words.get(word).map_or(0, |locs| locs.len()))
    }

    pub fn size_positions(&self, word: &str, location: &str) -> usize {
        self.data.read(|d| {
            d.words
                .get(word)
                .and_then(|locs| locs.get(location))
                .map_or(0, |p| p.len())
        })
    }

    /// Number of locations with any recorded word.
    pub fn size_counts(&self) -> usize {
        self.data.read(|d| d.counts.len())
    }

    pub fn is_empty(&self) -> bool {
        self.data.read(|d| d.words.is_empty())
    }

    pub fn index_json(&self) -> Result<Vec<u8>> {
        self.data.read(|d| persist::index_json(&d.words))
    }

    pub fn counts_json(&self) -> Result<Vec<u8>> {
        self.data.read(|d| persist::counts_json(&d.counts))
    }

    pub fn write_index(&self, path: &Path) -> Result<()> {
        let bytes = self.index_json()?;
        persist::write_json(path, &bytes)
    }

    pub fn write_counts(&self, path: &Path) -> Result<()> {
        let bytes = self.counts_json()?;
        persist::write_json(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample() -> InvertedIndex {
        let index = InvertedIndex::new();
        index.add_stems(["run", "run", "run"], "a.txt", 1);
        index.add_stems(["runner"], "b.txt", 1);
        index.add_stems(["apple", "run", "ran", "pear"], "c.txt", 1);
        index
    }

    #[test]
    fn add_is_idempotent() {
        let index = InvertedIndex::new();
        assert!(index.add("hello", "x.txt", 1));
        let before = index.index_json().unwrap();
        assert!(!index.add("hello", "x.txt", 1));
        assert_eq!(index.size_positions("hello", "x.txt"), 1);
        assert_eq!(index.count("x.txt"), 1);
        assert_eq!(index.index_json().unwrap(), before);
    }

    #[test]
    fn counts_track_distinct_positions() {
        let index = sample();
        assert_eq!(index.count("a.txt"), 3);
        assert_eq!(index.count("c.txt"), 4);
        assert_eq!(index.count("missing"), 0);
        assert!(index.has_location("b.txt"));
        assert!(!index.has_location("d.txt"));
        assert_eq!(index.size_counts(), 3);
    }

    #[test]
    fn accessors_return_sorted_snapshots() {
        let index = sample();
        assert_eq!(index.words(), vec!["apple", "pear", "ran", "run", "runner"]);
        assert_eq!(index.locations("run"), vec!["a.txt", "c.txt"]);
        assert_eq!(index.positions("run", "a.txt"), vec![1, 2, 3]);
        assert!(index.positions("run", "b.txt").is_empty());
        assert!(index.contains_position("pear", "c.txt", 4));
        assert!(!index.contains_position("pear", "c.txt", 3));
        assert!(index.contains_location("runner", "b.txt"));
        assert_eq!(index.size_locations("run"), 2);
        assert_eq!(index.size_locations("nope"), 0);
    }

    #[test]
    fn exact_search_ranks_by_score_then_matches() {
        let results = sample().exact_search(&set(&["run"]));
        let summary: Vec<(&str, usize, f64)> =
            results.iter().map(|r| (r.location(), r.matches(), r.score())).collect();
        assert_eq!(summary, vec![("a.txt", 3, 1.0), ("c.txt", 1, 0.25)]);
    }

    #[test]
    fn partial_search_stops_at_first_non_prefix() {
        let results = sample().partial_search(&set(&["run"]));
        let locations: Vec<&str> = results.iter().map(|r| r.location()).collect();
        // a.txt and b.txt both score 1.0; a.txt has more matches
        assert_eq!(locations, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(results[1].matches(), 1);
    }

    #[test]
    fn partial_results_cover_exact_results() {
        let index = sample();
        for word in ["run", "r", "ap", "pear", "zzz"] {
            let exact = index.search(&set(&[word]), true);
            let partial = index.search(&set(&[word]), false);
            for hit in &exact {
                assert!(partial.iter().any(|p| p.location() == hit.location()), "{word}");
            }
        }
    }

    #[test]
    fn multi_word_query_accumulates_per_location() {
        let results = sample().exact_search(&set(&["apple", "pear", "run"]));
        assert_eq!(results[0].location(), "a.txt");
        assert_eq!(results[1].location(), "c.txt");
        assert_eq!(results[1].matches(), 3);
        assert_eq!(results[1].score(), 0.75);
    }

    #[test]
    fn unknown_words_find_nothing() {
        let index = sample();
        assert!(index.exact_search(&set(&["ru"])).is_empty());
        assert!(index.partial_search(&set(&["zebra"])).is_empty());
        assert!(index.search(&BTreeSet::new(), false).is_empty());
    }

    #[test]
    fn add_all_adopts_unions_and_sums() {
        let shared = ThreadSafeInvertedIndex::default();
        shared.add("run", "a.txt", 1);

        let local = InvertedIndex::new();
        local.add("run", "a.txt", 2);
        local.add("walk", "b.txt", 1);
        shared.add_all(local);

        assert_eq!(shared.positions("run", "a.txt"), vec![1, 2]);
        assert_eq!(shared.positions("walk", "b.txt"), vec![1]);
        assert_eq!(shared.count("a.txt"), 2);
        assert_eq!(shared.count("b.txt"), 1);
    }

    #[test]
    fn counts_json_lists_locations_in_order() {
        let text = String::from_utf8(sample().counts_json().unwrap()).unwrap();
        assert_eq!(text, "{\n\t\"a.txt\": 3,\n\t\"b.txt\": 1,\n\t\"c.txt\": 4\n}");
    }
}
