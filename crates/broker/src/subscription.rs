//! Subscriber queues
//!
//! Each subscriber gets a bounded async-channel. The broker keeps a clone of
//! the receiving end so it can evict the oldest queued record when the queue
//! is full, instead of waiting on a slow reader.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::Record;
use tokio::sync::mpsc;

use crate::service::BrokerCommand;

/// Identity of one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of offering a record to a subscriber queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Queued,
    /// Queued after evicting the oldest record
    QueuedWithDrop,
    /// Reader side is gone
    Closed,
}

/// Broker-side state of one subscriber. Owned by the broker loop only.
pub(crate) struct Subscriber {
    pub(crate) id: SubscriberId,
    tx: Sender<Record>,
    evict: Receiver<Record>,
    dropped: Arc<AtomicU64>,
    pub(crate) connected: bool,
}

impl Subscriber {
    /// Enqueue without waiting; on overflow drop the oldest record.
    pub(crate) fn offer(&self, record: Record) -> Offer {
        let mut record = record;
        let mut evicted = false;
        loop {
            match self.tx.try_send(record) {
                Ok(()) => {
                    return if evicted {
                        Offer::QueuedWithDrop
                    } else {
                        Offer::Queued
                    };
                }
                Err(TrySendError::Full(back)) => {
                    // The reader may drain concurrently, so eviction can miss.
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                    record = back;
                }
                Err(TrySendError::Closed(_)) => return Offer::Closed,
            }
        }
    }

    /// Close the queue and discard anything still buffered.
    pub(crate) fn disconnect(&mut self) {
        self.connected = false;
        self.tx.close();
        while self.evict.try_recv().is_ok() {}
    }

    /// Close the queue but let the reader drain what is buffered.
    pub(crate) fn close(&mut self) {
        self.connected = false;
        self.tx.close();
    }
}

/// Build the two halves for a new subscriber.
pub(crate) fn pair(
    id: SubscriberId,
    capacity: usize,
    broker: &mpsc::UnboundedSender<BrokerCommand>,
) -> (Subscriber, Subscription) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let subscriber = Subscriber {
        id,
        tx,
        evict: rx.clone(),
        dropped: dropped.clone(),
        connected: true,
    };
    let subscription = Subscription {
        id,
        rx,
        dropped,
        broker: broker.downgrade(),
        left: false,
    };
    (subscriber, subscription)
}

/// Client side of a subscription
///
/// Records arrive in publish order. Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriberId,
    rx: Receiver<Record>,
    dropped: Arc<AtomicU64>,
    broker: mpsc::WeakUnboundedSender<BrokerCommand>,
    left: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next record, or `None` once the subscription has been closed.
    pub async fn recv(&self) -> Option<Record> {
        self.rx.recv().await.ok()
    }

    /// Next record if one is already queued
    pub fn try_recv(&self) -> Option<Record> {
        self.rx.try_recv().ok()
    }

    /// Records currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// Records dropped for this subscriber because its queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Leave the broker and wait until it has acknowledged.
    ///
    /// Once this returns the broker no longer holds the subscriber.
    pub async fn unsubscribe(mut self) {
        self.left = true;
        self.rx.close();
        let Some(broker) = self.broker.upgrade() else {
            return;
        };
        let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
        let command = BrokerCommand::Unsubscribe {
            id: self.id,
            ack: Some(ack_tx),
        };
        if broker.send(command).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        self.rx.close();
        if let Some(broker) = self.broker.upgrade() {
            let _ = broker.send(BrokerCommand::Unsubscribe {
                id: self.id,
                ack: None,
            });
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("queued", &self.rx.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> Record {
        Record::new("test", "host", format!("r{n}"))
    }

    #[test]
    fn test_offer_drops_oldest_when_full() {
        let (broker_tx, _broker_rx) = mpsc::unbounded_channel();
        let (subscriber, subscription) = pair(SubscriberId(1), 2, &broker_tx);

        assert_eq!(subscriber.offer(record(0)), Offer::Queued);
        assert_eq!(subscriber.offer(record(1)), Offer::Queued);
        assert_eq!(subscriber.offer(record(2)), Offer::QueuedWithDrop);

        assert_eq!(subscription.len(), 2);
        assert_eq!(subscription.dropped(), 1);
        assert_eq!(&subscription.try_recv().unwrap().payload[..], b"r1");
        assert_eq!(&subscription.try_recv().unwrap().payload[..], b"r2");
    }

    #[test]
    fn test_offer_after_reader_dropped_is_closed() {
        let (broker_tx, mut broker_rx) = mpsc::unbounded_channel();
        let (subscriber, subscription) = pair(SubscriberId(7), 4, &broker_tx);

        drop(subscription);
        assert_eq!(subscriber.offer(record(0)), Offer::Closed);

        match broker_rx.try_recv() {
            Ok(BrokerCommand::Unsubscribe { id, ack }) => {
                assert_eq!(id, SubscriberId(7));
                assert!(ack.is_none());
            }
            _ => panic!("expected unsubscribe command"),
        }
    }

    #[test]
    fn test_disconnect_discards_buffered() {
        let (broker_tx, _broker_rx) = mpsc::unbounded_channel();
        let (mut subscriber, subscription) = pair(SubscriberId(2), 4, &broker_tx);

        subscriber.offer(record(0));
        subscriber.disconnect();

        assert!(!subscriber.connected);
        assert!(subscription.try_recv().is_none());
    }
}
