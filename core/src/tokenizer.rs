use crate::Position;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NOT_WORD: Regex = Regex::new(r"[^\p{L}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// NFD-normalize, drop anything that is not a letter or whitespace, lowercase.
pub fn clean(text: &str) -> String {
    let decomposed = text.nfd().collect::<String>();
    NOT_WORD.replace_all(&decomposed, "").to_lowercase()
}

/// Cleaned words in text order.
pub fn parse(text: &str) -> Vec<String> {
    clean(text).split_whitespace().map(str::to_string).collect()
}

fn stem(word: &str) -> String {
    STEMMER.stem(word).into_owned()
}

/// Stems of every word, in text order.
pub fn stems(text: &str) -> Vec<String> {
    parse(text).iter().map(|w| stem(w)).collect()
}

/// Tokenize text into (stem, position) with 1-based positions.
pub fn tokenize(text: &str) -> Vec<(String, Position)> {
    stems(text).into_iter().zip(1..).collect()
}

/// Sorted, duplicate-free stems; the form queries are searched with.
pub fn unique_stems(text: &str) -> BTreeSet<String> {
    parse(text).iter().map(|w| stem(w)).collect()
}
