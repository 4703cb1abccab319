pub mod builder;
pub mod index;
pub mod lock;
pub mod persist;
pub mod pool;
pub mod result;
pub mod searcher;
pub mod tokenizer;

pub use index::{InvertedIndex, ThreadSafeInvertedIndex};
pub use lock::{LockPolicy, NoLock, ReadWriteLock};
pub use pool::{WorkHandle, WorkQueue};
pub use result::SearchResult;
pub use searcher::{MultithreadedSearcher, QueryHandler, QuerySearcher};

/// 1-based word position inside a location.
pub type Position = u32;
