//! Live member snapshots for the admin panel
//!
//! Every member write publishes the full member list. Viewers hold a
//! [`MemberSubscription`]; dropping it (or calling `close`) detaches the
//! viewer, so a torn-down page never keeps receiving updates.

use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use uuid::Uuid;

use super::member_store::Member;

/// Full member list at a point in time
pub type MemberSnapshot = Vec<Member>;

/// Broadcasts member snapshots and tracks open subscriptions
pub struct MemberFeed {
    tx: broadcast::Sender<MemberSnapshot>,
    /// Open subscriptions (id -> opened at)
    open: Arc<parking_lot::Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl MemberFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            open: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    /// Publish a new snapshot (ignored if nobody is listening)
    pub fn publish(&self, snapshot: MemberSnapshot) {
        let _ = self.tx.send(snapshot);
    }

    /// Open a subscription that first yields `initial`, then every published snapshot
    pub fn subscribe(&self, initial: MemberSnapshot) -> MemberSubscription {
        let id = Uuid::new_v4();
        self.open.lock().insert(id, Utc::now());
        debug!("Member subscription {} opened", id);

        MemberSubscription {
            id,
            initial: Some(initial),
            rx: self.tx.subscribe(),
            open: self.open.clone(),
        }
    }

    /// Number of subscriptions not yet released
    pub fn open_subscriptions(&self) -> usize {
        self.open.lock().len()
    }
}

/// Handle to a live member stream. Released on drop.
pub struct MemberSubscription {
    id: Uuid,
    initial: Option<MemberSnapshot>,
    rx: broadcast::Receiver<MemberSnapshot>,
    open: Arc<parking_lot::Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl MemberSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next snapshot. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<MemberSnapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                // A later snapshot supersedes the skipped ones
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Member subscription {} skipped {} snapshots", self.id, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving updates
    pub fn close(self) {}

    /// Turn the handle into a stream; the handle is released when the stream is dropped
    pub fn into_stream(self) -> impl Stream<Item = MemberSnapshot> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
    }
}

impl Drop for MemberSubscription {
    fn drop(&mut self) {
        self.open.lock().remove(&self.id);
        debug!("Member subscription {} closed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn member(id: &str) -> Member {
        Member::new(id.to_string(), format!("Member {}", id), 1000)
    }

    #[tokio::test]
    async fn test_initial_snapshot_then_updates() {
        let feed = MemberFeed::new(16);
        let mut subscription = feed.subscribe(vec![member("a")]);

        feed.publish(vec![member("a"), member("b")]);

        let first = subscription.next().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = subscription.next().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let feed = MemberFeed::new(16);
        let first = feed.subscribe(vec![]);
        let second = feed.subscribe(vec![]);
        assert_eq!(feed.open_subscriptions(), 2);

        first.close();
        assert_eq!(feed.open_subscriptions(), 1);

        drop(second);
        assert_eq!(feed.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_subscription() {
        let feed = MemberFeed::new(16);
        let mut stream = Box::pin(feed.subscribe(vec![member("a")]).into_stream());
        assert_eq!(feed.open_subscriptions(), 1);

        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot[0].id, "a");

        drop(stream);
        assert_eq!(feed.open_subscriptions(), 0);
    }
}
