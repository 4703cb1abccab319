//! Bounded concurrent web crawler feeding a shared inverted index.

pub mod crawler;
pub mod fetch;
pub mod frontier;
pub mod html;

pub use crawler::WebCrawler;
pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use frontier::Frontier;
