//! Document store collaborator
//!
//! The hosted backend is reached only through [`DocumentStore`]:
//! - live full-collection snapshots via [`DocumentStore::subscribe`]
//! - one-shot point lookups via [`DocumentStore::get_document`]
//! - one-shot listings via [`DocumentStore::list_documents`]

pub mod memory;
pub mod persistence;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::records::Document;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Subscription closed")]
    Closed,
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Full point-in-time listing of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub collection: String,
    pub documents: Vec<Document>,
}

pub type FeedItem = Result<Snapshot, StoreError>;

/// Live feed of snapshots for one collection.
///
/// Dropping the subscription detaches it from the store, same as
/// [`Subscription::unsubscribe`].
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<FeedItem>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<FeedItem>,
        on_unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Subscription {
            receiver,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next snapshot or feed error; `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        self.receiver.close();
        if let Some(callback) = self.on_unsubscribe.take() {
            callback();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.on_unsubscribe.is_some())
            .finish()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Starts a live feed; the current snapshot is delivered first.
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    /// Fetches one document by key, `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn unsubscribe_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let counter = Arc::clone(&calls);
        let mut subscription = Subscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(Ok(Snapshot { collection: "c".to_string(), documents: vec![] })).unwrap();
        assert!(subscription.next().await.unwrap().is_ok());

        subscription.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(tx.send(Err(StoreError::Closed)).is_err());
    }
}
