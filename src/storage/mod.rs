pub mod engine;
pub mod feed_store;
pub mod record;
pub mod traits;

pub use engine::{
    Engine, EngineConfig, FileBackend, MemoryBackend, Objects, Snapshot, StorageBackend,
    StoreLocation, Transaction,
};
pub use feed_store::LocalFeedStore;
pub use record::{CacheRecord, StoredFeedImage, CACHE_ID};
pub use traits::{
    DeletionCompletion, FeedStore, FeedStoreExt, InsertionCompletion, Pending,
    RetrievalCompletion,
};
