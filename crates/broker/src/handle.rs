//! Broker handle - the cloneable front door to the broker loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::Record;
use metrics::counter;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::error::BrokerError;
use crate::service::{BrokerCommand, BrokerStats};
use crate::subscription::{pair, SubscriberId, Subscription};

#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::UnboundedSender<BrokerCommand>,
    publishes: mpsc::Sender<Record>,
    backlog_dropped: Arc<AtomicU64>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl BrokerHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<BrokerCommand>,
        publishes: mpsc::Sender<Record>,
        backlog_dropped: Arc<AtomicU64>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            tx,
            publishes,
            backlog_dropped,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity,
        }
    }

    /// Register a subscriber with the default queue capacity.
    ///
    /// Always succeeds. If the broker has stopped, the returned subscription
    /// is already closed.
    pub async fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(self.queue_capacity).await
    }

    pub async fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (subscriber, subscription) = pair(id, capacity, &self.tx);
        let (ack_tx, ack_rx) = oneshot::channel();

        let joined = self
            .tx
            .send(BrokerCommand::Subscribe {
                subscriber,
                ack: ack_tx,
            })
            .is_ok();

        // Wait for the join so records published after this call returns
        // are guaranteed to reach the new subscriber.
        if joined {
            let _ = ack_rx.await;
        }
        subscription
    }

    /// Remove a subscriber by id. Removing an unknown id is a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .tx
            .send(BrokerCommand::Unsubscribe {
                id,
                ack: Some(ack_tx),
            })
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    /// Hand a record to the broker loop. Never waits, on the loop or on
    /// subscribers.
    ///
    /// # Errors
    /// `Backlogged` when the loop is behind by a full backlog; the record is
    /// dropped and counted in `BrokerStats::backlog_dropped`. `Stopped` once
    /// the loop has exited.
    pub fn publish(&self, record: Record) -> Result<(), BrokerError> {
        match self.publishes.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.backlog_dropped.fetch_add(1, Ordering::Relaxed);
                counter!("logpush_publish_backlog_drops_total").increment(1);
                Err(BrokerError::Backlogged)
            }
            Err(TrySendError::Closed(_)) => Err(BrokerError::Stopped),
        }
    }

    pub async fn stats(&self) -> Result<BrokerStats, BrokerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BrokerCommand::Stats(response_tx))
            .map_err(|_| BrokerError::Stopped)?;
        response_rx.await.map_err(|_| BrokerError::Stopped)
    }

    /// Stop the loop; every open subscription ends after draining its queue.
    pub fn shutdown(&self) -> Result<(), BrokerError> {
        self.tx
            .send(BrokerCommand::Shutdown)
            .map_err(|_| BrokerError::Stopped)
    }

    pub fn default_queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
