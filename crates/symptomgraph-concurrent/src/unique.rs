use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Creates a deduplicating channel with a bounded buffer of `capacity` items.
///
/// The returned publisher is the first producer handle. Every clone is one more
/// producer; the receiver observes exhaustion once all producer handles have
/// been closed (or dropped) and the buffer is drained.
pub fn unique_channel<T>(capacity: usize) -> (UniqueChannel<T>, UniqueReceiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        UniqueChannel {
            seen: Arc::new(DashSet::new()),
            sender,
        },
        UniqueReceiver { receiver },
    )
}

/// Producer side: publishes each key at most once across all of its clones.
pub struct UniqueChannel<T> {
    seen: Arc<DashSet<String>>,
    sender: mpsc::Sender<T>,
}

impl<T> Clone for UniqueChannel<T> {
    fn clone(&self) -> Self {
        Self {
            seen: self.seen.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T> UniqueChannel<T> {
    /// Forwards `item` unless `key` was published before on this channel.
    ///
    /// Returns `true` when the key is new. The key is recorded before the item
    /// is handed to the buffer, so a concurrent publisher of the same key gets
    /// `false` even while this call waits for buffer space. If the consumer is
    /// gone the item is discarded but the key still counts as published.
    pub async fn publish(&self, item: T, key: impl Into<String>) -> bool {
        let key = key.into();
        if !self.seen.insert(key.clone()) {
            return false;
        }
        if self.sender.send(item).await.is_err() {
            debug!("consumer dropped, discarding item {}", key);
        }
        true
    }

    pub fn is_published(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct keys published so far.
    pub fn published_count(&self) -> usize {
        self.seen.len()
    }

    /// Ends this producer's contribution.
    pub fn close(self) {}
}

/// Consumer side of a [`UniqueChannel`].
pub struct UniqueReceiver<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> UniqueReceiver<T> {
    /// Next forwarded item, or `None` once every producer closed and the buffer is empty.
    pub async fn receive(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn publishes_each_key_once() {
        let (tx, mut rx) = unique_channel(8);
        assert!(tx.publish("a", "k1").await);
        assert!(!tx.publish("b", "k1").await);
        assert!(tx.publish("c", "k2").await);
        tx.close();

        assert_eq!(rx.receive().await, Some("a"));
        assert_eq!(rx.receive().await, Some("c"));
        assert_eq!(rx.receive().await, None);
    }

    #[tokio::test]
    async fn close_drains_buffered_items_first() {
        let (tx, mut rx) = unique_channel(4);
        for i in 0..4 {
            tx.publish(i, i.to_string()).await;
        }
        tx.close();

        let mut got = Vec::new();
        while let Some(v) = rx.receive().await {
            got.push(v);
        }
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrent_publishers_share_dedup_state() {
        let (tx, mut rx) = unique_channel(16);
        let mut handles = Vec::new();
        for worker in 0..8 {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let mut fresh = 0usize;
                for i in 0..50 {
                    // every worker publishes the same 50 keys
                    if tx.publish((worker, i), format!("key-{}", i)).await {
                        fresh += 1;
                    }
                }
                fresh
            }));
        }
        tx.close();

        let consumer = tokio::spawn(async move {
            let mut keys = HashSet::new();
            let mut total = 0usize;
            while let Some((_, i)) = rx.receive().await {
                keys.insert(i);
                total += 1;
            }
            (keys.len(), total)
        });

        let fresh: usize = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .sum();
        let (distinct, total) = consumer.await.unwrap();
        assert_eq!(fresh, 50);
        assert_eq!(distinct, 50);
        assert_eq!(total, 50);
    }

    #[tokio::test]
    async fn exhausted_only_after_every_producer_closes() {
        let (direct, mut rx) = unique_channel::<u32>(4);
        let expansion = direct.clone();

        direct.publish(1, "1").await;
        direct.close();
        assert_eq!(rx.receive().await, Some(1));

        // the second producer is still open, so the receiver must keep waiting
        let pending = tokio::time::timeout(Duration::from_millis(50), rx.receive()).await;
        assert!(pending.is_err());

        expansion.publish(2, "2").await;
        expansion.close();
        assert_eq!(rx.receive().await, Some(2));
        assert_eq!(rx.receive().await, None);
    }

    #[tokio::test]
    async fn dropped_consumer_still_records_key() {
        let (tx, rx) = unique_channel(1);
        drop(rx);
        assert!(tx.publish("x", "k").await);
        assert!(tx.is_published("k"));
        assert!(!tx.publish("y", "k").await);
        assert_eq!(tx.published_count(), 1);
    }
}
