use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::feed::{CachedFeed, LocalFeedImage};

pub type RetrievalCompletion = Box<dyn FnOnce(Result<CachedFeed>) + Send + 'static>;
pub type InsertionCompletion = Box<dyn FnOnce(Result<()>) + Send + 'static>;
pub type DeletionCompletion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Store holding a single cached feed.
///
/// Every operation calls its completion exactly once, possibly on another
/// thread. Operations are scheduled when the method is called, so calls made
/// one after another from the same thread take effect in that order.
pub trait FeedStore: Send + Sync {
    /// Remove the cached feed. Succeeds when nothing is cached.
    fn delete_cached_feed_with(&self, completion: DeletionCompletion);

    /// Replace whatever is cached with `feed` and `timestamp`.
    fn insert_with(
        &self,
        feed: Vec<LocalFeedImage>,
        timestamp: DateTime<Utc>,
        completion: InsertionCompletion,
    );

    /// Read the cached feed without modifying the store.
    fn retrieve_with(&self, completion: RetrievalCompletion);
}

/// Future-returning variants of the [`FeedStore`] operations.
///
/// The operation is scheduled before the future is returned; awaiting only
/// waits for its completion.
pub trait FeedStoreExt: FeedStore {
    fn delete_cached_feed(&self) -> Pending<()> {
        let (sender, pending) = Pending::channel();
        self.delete_cached_feed_with(Box::new(move |result| {
            let _ = sender.send(result);
        }));
        pending
    }

    fn insert(&self, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> Pending<()> {
        let (sender, pending) = Pending::channel();
        self.insert_with(
            feed,
            timestamp,
            Box::new(move |result| {
                let _ = sender.send(result);
            }),
        );
        pending
    }

    fn retrieve(&self) -> Pending<CachedFeed> {
        let (sender, pending) = Pending::channel();
        self.retrieve_with(Box::new(move |result| {
            let _ = sender.send(result);
        }));
        pending
    }
}

impl<S: FeedStore + ?Sized> FeedStoreExt for S {}

/// Result of a scheduled store operation.
///
/// Resolves to [`Error::WorkerStopped`] if the operation was dropped without
/// completing.
#[derive(Debug)]
#[must_use = "the operation runs regardless, but its result is lost unless awaited"]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Block the current thread until the operation completes.
    ///
    /// Must not be called from within an async runtime.
    pub fn wait(self) -> Result<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(Error::WorkerStopped))
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|received| received.unwrap_or(Err(Error::WorkerStopped)))
    }
}
