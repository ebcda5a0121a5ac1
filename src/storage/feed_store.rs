//! Feed store backed by the embedded engine.
//!
//! All operations of one store instance run on a single worker thread, in the
//! order they were submitted. The engine is opened lazily by the worker on the
//! first operation; if opening fails, that operation fails and the next one
//! tries again.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{CachedFeed, LocalFeedImage};
use crate::storage::engine::{Engine, EngineConfig};
use crate::storage::record::{CacheRecord, CACHE_ID};
use crate::storage::traits::{
    DeletionCompletion, FeedStore, InsertionCompletion, RetrievalCompletion,
};

enum Job {
    Retrieve(RetrievalCompletion),
    Insert {
        feed: Vec<LocalFeedImage>,
        timestamp: DateTime<Utc>,
        completion: InsertionCompletion,
    },
    Delete(DeletionCompletion),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Retrieve(_) => "retrieve",
            Job::Insert { .. } => "insert",
            Job::Delete(_) => "delete",
        }
    }

    fn fail(self, err: Error) {
        let operation = self.name();
        match self {
            Job::Retrieve(completion) => deliver(operation, completion, Err(err)),
            Job::Insert { completion, .. } => deliver(operation, completion, Err(err)),
            Job::Delete(completion) => deliver(operation, completion, Err(err)),
        }
    }
}

/// Call a completion exactly once, containing panics raised by it.
fn deliver<T>(
    operation: &'static str,
    completion: Box<dyn FnOnce(Result<T>) + Send + 'static>,
    result: Result<T>,
) {
    if let Err(ref e) = result {
        warn!(operation, code = e.error_code(), error = %e, "Feed store operation failed");
    }

    if panic::catch_unwind(AssertUnwindSafe(move || completion(result))).is_err() {
        error!(operation, "Completion handler panicked");
    }
}

/// Feed store persisting its cache through an [`Engine`].
///
/// Cloning is not supported; share the store behind an `Arc`. Dropping the
/// store lets already submitted operations finish before the worker exits.
#[derive(Debug)]
pub struct LocalFeedStore {
    sender: Sender<Job>,
    location: String,
}

impl LocalFeedStore {
    /// Create a store that opens the engine described by `config` on first use.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let location = config.location.to_string();
        Self::spawn(
            Worker {
                config: Some(config),
                engine: None,
            },
            location,
        )
    }

    /// Create a store over an already opened engine.
    pub fn with_engine(engine: Engine) -> Result<Self> {
        let location = engine.describe();
        Self::spawn(
            Worker {
                config: None,
                engine: Some(engine),
            },
            location,
        )
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.engine_config())
    }

    /// Where this store keeps its cache.
    pub fn location(&self) -> &str {
        &self.location
    }

    fn spawn(worker: Worker, location: String) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();

        thread::Builder::new()
            .name("feed-store-worker".to_string())
            .spawn(move || worker.run(receiver))?;

        info!(location = %location, "Started feed store");
        Ok(Self { sender, location })
    }

    fn submit(&self, job: Job) {
        debug!(operation = job.name(), "Scheduling feed store operation");
        if let Err(channel::SendError(job)) = self.sender.send(job) {
            job.fail(Error::WorkerStopped);
        }
    }
}

impl FeedStore for LocalFeedStore {
    fn delete_cached_feed_with(&self, completion: DeletionCompletion) {
        self.submit(Job::Delete(completion));
    }

    fn insert_with(
        &self,
        feed: Vec<LocalFeedImage>,
        timestamp: DateTime<Utc>,
        completion: InsertionCompletion,
    ) {
        self.submit(Job::Insert {
            feed,
            timestamp,
            completion,
        });
    }

    fn retrieve_with(&self, completion: RetrievalCompletion) {
        self.submit(Job::Retrieve(completion));
    }
}

/// State owned by the worker thread.
struct Worker {
    config: Option<EngineConfig>,
    engine: Option<Engine>,
}

impl Worker {
    fn run(mut self, receiver: Receiver<Job>) {
        for job in receiver.iter() {
            self.handle(job);
        }
        debug!("Feed store worker stopped");
    }

    fn handle(&mut self, job: Job) {
        let operation = job.name();
        match job {
            Job::Retrieve(completion) => {
                let result = self.guarded(operation, |worker| worker.retrieve());
                deliver(operation, completion, result);
            }
            Job::Insert {
                feed,
                timestamp,
                completion,
            } => {
                let result = self.guarded(operation, |worker| worker.insert(&feed, timestamp));
                deliver(operation, completion, result);
            }
            Job::Delete(completion) => {
                let result = self.guarded(operation, |worker| worker.delete());
                deliver(operation, completion, result);
            }
        }
    }

    /// Run an operation, turning a panic into an error so the completion is
    /// still called and the worker keeps serving.
    fn guarded<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        panic::catch_unwind(AssertUnwindSafe(|| f(self))).unwrap_or_else(|_| {
            error!(operation, "Feed store operation panicked");
            Err(Error::OperationPanicked(operation))
        })
    }

    fn engine(&mut self) -> Result<Engine> {
        if let Some(engine) = &self.engine {
            return Ok(engine.clone());
        }

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::EngineOpen("no engine configured".to_string()))?;
        let engine = Engine::open(config)?;
        self.engine = Some(engine.clone());
        Ok(engine)
    }

    fn retrieve(&mut self) -> Result<CachedFeed> {
        let engine = self.engine()?;
        engine
            .read(|snapshot| {
                snapshot
                    .object_for_primary_key(CACHE_ID)
                    .map(CacheRecord::to_cached_feed)
            })?
            .unwrap_or(Ok(CachedFeed::Empty))
    }

    fn insert(&mut self, feed: &[LocalFeedImage], timestamp: DateTime<Utc>) -> Result<()> {
        let engine = self.engine()?;
        let record = CacheRecord::new(feed, timestamp);

        let replaced = engine.write(|transaction| {
            let replaced = transaction.delete_all();
            transaction.add(record);
            Ok(replaced)
        })?;

        info!(images = feed.len(), replaced, "Inserted cached feed");
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        let engine = self.engine()?;
        let removed = engine.write(|transaction| Ok(transaction.delete_all()))?;

        if removed > 0 {
            info!("Deleted cached feed");
        } else {
            debug!("No cached feed to delete");
        }
        Ok(())
    }
}
