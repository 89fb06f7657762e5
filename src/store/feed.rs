//! In-process change feed shared by the store backends.
//!
//! One broadcast channel per subscribed collection. Channels exist only
//! while something listens; writes to unwatched collections cost a map
//! lookup. Events are only delivered inside this process; subscribers that
//! fall behind skip the lagged events and should reload the collection.

use super::{ChangeEvent, ChangeStream, CollectionPath};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 100;

pub struct ChangeFeed {
    channels: Mutex<HashMap<CollectionPath, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn publish(&self, collection: &CollectionPath, event: ChangeEvent) {
        let mut channels = self.channels.lock().expect("change feed poisoned");
        let Some(tx) = channels.get(collection) else {
            return;
        };
        // a send error means every receiver is gone
        if tx.send(event).is_err() {
            channels.remove(collection);
        }
    }

    pub fn subscribe(&self, collection: &CollectionPath) -> ChangeStream {
        let mut channels = self.channels.lock().expect("change feed poisoned");
        channels.retain(|_, tx| tx.receiver_count() > 0);
        let rx = channels
            .entry(collection.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        Box::pin(BroadcastStream::new(rx).filter_map(|result| result.ok()))
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels.lock().expect("change feed poisoned").len()
    }

    /// Number of live subscriptions on a collection.
    #[cfg(test)]
    pub fn subscriber_count(&self, collection: &CollectionPath) -> usize {
        self.channels
            .lock()
            .expect("change feed poisoned")
            .get(collection)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
