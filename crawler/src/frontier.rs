use parking_lot::Mutex;
use std::collections::HashSet;
use url::Url;

/// Every URL ever admitted to a crawl, capped at `max`. Membership checks,
/// the size check and admission happen under one lock.
#[derive(Debug)]
pub struct Frontier {
    seen: Mutex<HashSet<Url>>,
    max: usize,
}

impl Frontier {
    /// `max` below 1 is raised to 1 so the seed always fits.
    pub fn new(max: usize) -> Self {
        Self { seen: Mutex::new(HashSet::new()), max: max.max(1) }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.seen.lock().contains(url)
    }

    /// Inserts `url` if it is new and there is room.
    pub fn try_admit(&self, url: Url) -> bool {
        let mut seen = self.seen.lock();
        seen.len() < self.max && seen.insert(url)
    }

    /// Admits links in order until the frontier is full, calling `on_admit`
    /// for each one while the lock is still held. Returns how many were admitted.
    pub fn admit_links<I, F>(&self, links: I, mut on_admit: F) -> usize
    where
        I: IntoIterator<Item = Url>,
        F: FnMut(Url),
    {
        let mut seen = self.seen.lock();
        let mut admitted = 0;
        for link in links {
            if seen.len() >= self.max {
                break;
            }
            if seen.insert(link.clone()) {
                admitted += 1;
                on_admit(link);
            }
        }
        admitted
    }

    pub fn urls(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = self.seen.lock().iter().cloned().collect();
        urls.sort();
        urls
    }
}
