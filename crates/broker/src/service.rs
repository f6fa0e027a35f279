//! Broker event loop
//!
//! The subscriber set lives inside `BrokerService` and is only touched by its
//! `run` loop. Joins, leaves and publishes all arrive as messages.
//!
//! Publishes travel on their own bounded queue, so a stalled loop holds at
//! most `backlog` records; `BrokerHandle::publish` drops and counts the rest.
//! Lifecycle commands stay unbounded: there is at most one join and one leave
//! per client, and senders wait for their ack.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::Record;
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

use crate::handle::BrokerHandle;
use crate::subscription::{Offer, Subscriber, SubscriberId};

pub(crate) enum BrokerCommand {
    Subscribe {
        subscriber: Subscriber,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        id: SubscriberId,
        ack: Option<oneshot::Sender<()>>,
    },
    Stats(oneshot::Sender<BrokerStats>),
    Shutdown,
}

/// Point-in-time broker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStats {
    /// Currently connected subscribers
    pub subscribers: usize,
    /// Records published since start
    pub published: u64,
    /// Records dropped across all subscribers since start
    pub dropped: u64,
    /// Records refused at publish because the backlog was full
    pub backlog_dropped: u64,
}

/// Default publish backlog of a broker
pub const DEFAULT_PUBLISH_BACKLOG: usize = 1024;

pub struct BrokerService {
    commands: mpsc::UnboundedReceiver<BrokerCommand>,
    publishes: mpsc::Receiver<Record>,
    backlog: usize,
    backlog_dropped: Arc<AtomicU64>,
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    published: u64,
    dropped: u64,
}

impl BrokerService {
    /// Create the service and a handle to it.
    ///
    /// `queue_capacity` is the default per-subscriber queue size.
    pub fn new(queue_capacity: usize) -> (Self, BrokerHandle) {
        Self::with_backlog(queue_capacity, DEFAULT_PUBLISH_BACKLOG)
    }

    /// Like [`new`](Self::new), with room for `backlog` records not yet fanned out.
    pub fn with_backlog(queue_capacity: usize, backlog: usize) -> (Self, BrokerHandle) {
        let backlog = backlog.max(1);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (publish_tx, publishes) = mpsc::channel(backlog);
        let backlog_dropped = Arc::new(AtomicU64::new(0));
        let service = Self {
            commands,
            publishes,
            backlog,
            backlog_dropped: backlog_dropped.clone(),
            subscribers: BTreeMap::new(),
            published: 0,
            dropped: 0,
        };
        let handle = BrokerHandle::new(command_tx, publish_tx, backlog_dropped, queue_capacity);
        (service, handle)
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(queue_capacity: usize) -> (BrokerHandle, tokio::task::JoinHandle<BrokerStats>) {
        let (service, handle) = Self::new(queue_capacity);
        (handle, tokio::spawn(service.run()))
    }

    /// Run until `Shutdown` or until every handle is gone.
    #[instrument(name = "broker_run", skip(self))]
    pub async fn run(mut self) -> BrokerStats {
        debug!("broker started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    // Publishes queued before this command go first.
                    self.drain_publishes();
                    match command {
                        Some(BrokerCommand::Subscribe { subscriber, ack }) => {
                            self.join(subscriber);
                            let _ = ack.send(());
                        }
                        Some(BrokerCommand::Unsubscribe { id, ack }) => {
                            self.leave(id);
                            if let Some(ack) = ack {
                                let _ = ack.send(());
                            }
                        }
                        Some(BrokerCommand::Stats(response_tx)) => {
                            let _ = response_tx.send(self.stats());
                        }
                        Some(BrokerCommand::Shutdown) | None => break,
                    }
                }
                Some(record) = self.publishes.recv() => self.publish(record),
            }
        }

        for subscriber in self.subscribers.values_mut() {
            subscriber.close();
        }
        let stats = self.stats();
        self.subscribers.clear();
        gauge!("logpush_subscribers").set(0.0);
        info!(
            published = stats.published,
            dropped = stats.dropped,
            "broker stopped"
        );
        stats
    }

    fn join(&mut self, subscriber: Subscriber) {
        let id = subscriber.id;
        self.subscribers.insert(id, subscriber);
        gauge!("logpush_subscribers").set(self.subscribers.len() as f64);
        info!(subscriber_id = %id, subscribers = self.subscribers.len(), "subscriber connected");
    }

    fn leave(&mut self, id: SubscriberId) {
        // Unknown ids are a no-op so unsubscribe stays idempotent.
        if let Some(mut subscriber) = self.subscribers.remove(&id) {
            subscriber.disconnect();
            gauge!("logpush_subscribers").set(self.subscribers.len() as f64);
            info!(subscriber_id = %id, subscribers = self.subscribers.len(), "subscriber disconnected");
        }
    }

    fn publish(&mut self, record: Record) {
        self.published += 1;
        counter!("logpush_records_published_total").increment(1);

        let mut closed = Vec::new();
        for subscriber in self.subscribers.values_mut() {
            match subscriber.offer(record.clone()) {
                Offer::Queued => {}
                Offer::QueuedWithDrop => {
                    self.dropped += 1;
                    counter!("logpush_subscriber_drops_total").increment(1);
                }
                Offer::Closed => {
                    subscriber.connected = false;
                    closed.push(subscriber.id);
                }
            }
        }

        for id in closed {
            self.leave(id);
        }
    }

    fn drain_publishes(&mut self) {
        for _ in 0..self.backlog {
            match self.publishes.try_recv() {
                Ok(record) => self.publish(record),
                Err(_) => break,
            }
        }
    }

    fn stats(&self) -> BrokerStats {
        BrokerStats {
            subscribers: self.subscribers.values().filter(|s| s.connected).count(),
            published: self.published,
            dropped: self.dropped,
            backlog_dropped: self.backlog_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;

    fn record(tag: &str) -> Record {
        Record::new("test", "host", tag.to_string())
    }

    fn payload(record: &Record) -> &[u8] {
        &record.payload[..]
    }

    #[tokio::test]
    async fn test_subscriber_receives_all_in_order() {
        let (handle, _task) = BrokerService::spawn(64);
        let sub = handle.subscribe().await;

        for n in 0..20 {
            handle.publish(record(&format!("r{n}"))).unwrap();
        }

        for n in 0..20 {
            let got = sub.recv().await.unwrap();
            assert_eq!(payload(&got), format!("r{n}").as_bytes());
        }
        assert_eq!(sub.dropped(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest_without_affecting_others() {
        let (handle, _task) = BrokerService::spawn(64);
        let slow = handle.subscribe_with_capacity(4).await;
        let fast = handle.subscribe().await;

        for n in 0..10 {
            handle.publish(record(&format!("r{n}"))).unwrap();
        }
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.published, 10);
        assert_eq!(stats.dropped, 6);

        assert_eq!(slow.len(), 4);
        assert_eq!(slow.dropped(), 6);
        for n in 6..10 {
            assert_eq!(payload(&slow.recv().await.unwrap()), format!("r{n}").as_bytes());
        }

        assert_eq!(fast.len(), 10);
        assert_eq!(fast.dropped(), 0);
        for n in 0..10 {
            assert_eq!(payload(&fast.recv().await.unwrap()), format!("r{n}").as_bytes());
        }
    }

    #[tokio::test]
    async fn test_drop_counter_is_monotonic() {
        let (handle, _task) = BrokerService::spawn(2);
        let sub = handle.subscribe().await;

        let mut last = 0;
        for n in 0..8 {
            handle.publish(record(&format!("r{n}"))).unwrap();
            handle.stats().await.unwrap();
            assert!(sub.len() <= 2);
            assert!(sub.dropped() >= last);
            last = sub.dropped();
        }
        assert_eq!(last, 6);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let (handle, _task) = BrokerService::spawn(8);
        handle.publish(record("before")).unwrap();

        let sub = handle.subscribe().await;
        handle.publish(record("after")).unwrap();

        assert_eq!(payload(&sub.recv().await.unwrap()), b"after");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribed_client_misses_later_records() {
        let (handle, _task) = BrokerService::spawn(8);
        let a = handle.subscribe().await;
        let b = handle.subscribe().await;

        handle.publish(record("R1")).unwrap();
        assert_eq!(payload(&a.recv().await.unwrap()), b"R1");
        assert_eq!(payload(&b.recv().await.unwrap()), b"R1");

        a.unsubscribe().await;
        handle.publish(record("R2")).unwrap();

        assert_eq!(payload(&b.recv().await.unwrap()), b"R2");
        assert_eq!(handle.stats().await.unwrap().subscribers, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_by_id_is_idempotent() {
        let (handle, _task) = BrokerService::spawn(8);
        let sub = handle.subscribe().await;
        let _other = handle.subscribe().await;

        handle.unsubscribe(sub.id()).await;
        handle.unsubscribe(sub.id()).await;
        assert_eq!(handle.stats().await.unwrap().subscribers, 1);

        // The removed subscriber's queue is closed and empty.
        handle.publish(record("late")).unwrap();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_leaves() {
        let (handle, _task) = BrokerService::spawn(8);
        let sub = handle.subscribe().await;
        assert_eq!(handle.stats().await.unwrap().subscribers, 1);

        drop(sub);
        assert_eq!(handle.stats().await.unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_subscriptions() {
        let (handle, task) = BrokerService::spawn(8);
        let sub = handle.subscribe().await;
        handle.publish(record("last")).unwrap();
        handle.shutdown().unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.published, 1);

        // Buffered records still drain before the stream ends.
        assert_eq!(payload(&sub.recv().await.unwrap()), b"last");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_backlog_is_bounded() {
        let (service, handle) = BrokerService::with_backlog(64, 3);

        // Loop not running yet: only the backlog is accepted.
        for n in 0..5 {
            let result = handle.publish(record(&format!("r{n}")));
            if n < 3 {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(BrokerError::Backlogged)));
            }
        }

        let task = tokio::spawn(service.run());
        let sub = handle.subscribe().await;
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.published, 3);
        assert_eq!(stats.backlog_dropped, 2);

        // The backlog was fanned out before the join, so none of it is replayed.
        handle.publish(record("after")).unwrap();
        assert_eq!(payload(&sub.recv().await.unwrap()), b"after");

        handle.shutdown().unwrap();
        assert_eq!(task.await.unwrap().backlog_dropped, 2);
    }

    #[tokio::test]
    async fn test_subscribe_after_stop_yields_closed_stream() {
        let (handle, task) = BrokerService::spawn(8);
        handle.shutdown().unwrap();
        task.await.unwrap();

        let sub = handle.subscribe().await;
        assert!(sub.recv().await.is_none());
        assert!(handle.publish(record("x")).is_err());
    }
}
