use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One ranked hit: a snapshot of how well a location matched a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(rename = "count")]
    matches: usize,
    #[serde(serialize_with = "rounded")]
    score: f64,
    #[serde(rename = "where")]
    location: String,
}

fn rounded<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((score * 1e8).round() / 1e8)
}

impl SearchResult {
    pub fn new(location: impl Into<String>) -> Self {
        Self { matches: 0, score: 0.0, location: location.into() }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Adds `positions` matched positions and rescales against the
    /// location's total word count.
    pub fn update(&mut self, positions: usize, counts: &BTreeMap<String, usize>) {
        self.matches += positions;
        let total = counts.get(&self.location).copied().unwrap_or(0);
        self.score = if total == 0 { 0.0 } else { self.matches as f64 / total as f64 };
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Better results sort first: higher score, then more matches, then location
/// (case-insensitive, falling back to exact bytes so distinct locations never tie).
impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.matches.cmp(&self.matches))
            .then_with(|| cmp_ignore_case(&self.location, &other.location))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchResult {}
