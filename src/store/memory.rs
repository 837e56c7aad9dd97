use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::{DocumentStore, FeedItem, Snapshot, StoreError, Subscription};
use crate::records::Document;

type Subscribers = HashMap<String, Vec<(u64, mpsc::UnboundedSender<FeedItem>)>>;

/// In-process document store with live snapshot feeds.
///
/// Every write pushes the full collection, ordered by document key, to each
/// live subscriber of that collection.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    subscribers: Arc<Mutex<Subscribers>>,
    next_subscriber: AtomicU64,
}

fn lock(subscribers: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot_of(collection: &str, documents: Option<&BTreeMap<String, Document>>) -> Snapshot {
    Snapshot {
        collection: collection.to_string(),
        documents: documents
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: HashMap<String, Vec<Document>>) -> Self {
        let collections = collections.into_iter()
            .map(|(name, docs)| {
                let docs = docs.into_iter().map(|doc| (doc.id.clone(), doc)).collect();
                (name, docs)
            })
            .collect();

        InMemoryStore {
            collections: RwLock::new(collections),
            ..Self::default()
        }
    }

    /// Inserts or replaces a document keyed by its id.
    pub async fn put_document(&self, collection: &str, document: Document) {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        docs.insert(document.id.clone(), document);
        self.publish(collection, Ok(snapshot_of(collection, Some(&*docs))));
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> Option<Document> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let removed = docs.remove(id);
        if removed.is_some() {
            self.publish(collection, Ok(snapshot_of(collection, Some(&*docs))));
        }
        removed
    }

    /// Delivers an error to every live subscriber of `collection`.
    pub async fn fail_feed(&self, collection: &str, error: StoreError) {
        let _guard = self.collections.read().await;
        self.publish(collection, Err(error));
    }

    pub fn subscriber_count(&self, collection: &str) -> usize {
        lock(&self.subscribers).get(collection).map_or(0, Vec::len)
    }

    pub async fn export(&self) -> HashMap<String, Vec<Document>> {
        self.collections.read().await
            .iter()
            .map(|(name, docs)| (name.clone(), docs.values().cloned().collect()))
            .collect()
    }

    // Callers hold the collections lock so feeds observe writes in order.
    fn publish(&self, collection: &str, item: FeedItem) {
        let mut subscribers = lock(&self.subscribers);
        if let Some(senders) = subscribers.get_mut(collection) {
            senders.retain(|(_, sender)| sender.send(item.clone()).is_ok());
            debug!(collection, subscribers = senders.len(), "Pushed feed update");
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let collections = self.collections.read().await;
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(Ok(snapshot_of(collection, collections.get(collection))))
            .map_err(|_| StoreError::Closed)?;

        let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers)
            .entry(collection.to_string())
            .or_default()
            .push((subscriber_id, sender));

        let registry = Arc::clone(&self.subscribers);
        let name = collection.to_string();
        Ok(Subscription::new(receiver, move || {
            if let Some(senders) = lock(&registry).get_mut(&name) {
                senders.retain(|(id, _)| *id != subscriber_id);
            }
        }))
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.collections.read().await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(snapshot_of(collection, self.collections.read().await.get(collection)).documents)
    }
}
