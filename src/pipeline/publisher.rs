// src/pipeline/publisher.rs
//
// Concurrency boundary between the single producer (the frame loop) and
// any number of consumers. The producer only ever overwrites a watch
// slot; a dedicated fan-out task forwards new snapshots to push
// observers, so a slow or dead observer can never stall the pipeline.
//
// Latest-value semantics: no backlog, no replay. If consumers lag,
// stale snapshots are overwritten and dropped.

use crate::types::{AnalyticsSnapshot, PublisherConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

type ObserverMap = HashMap<u64, mpsc::Sender<Arc<AnalyticsSnapshot>>>;

pub struct SnapshotPublisher {
    slot: watch::Sender<Option<Arc<AnalyticsSnapshot>>>,
    observers: Arc<Mutex<ObserverMap>>,
    next_observer_id: AtomicU64,
    observer_buffer: usize,
}

/// Handle held by a push consumer. Dropping it disconnects; the
/// publisher prunes the dead channel on the next fan-out.
pub struct MetricsObserver {
    id: u64,
    rx: mpsc::Receiver<Arc<AnalyticsSnapshot>>,
}

impl MetricsObserver {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next pushed snapshot, `None` once unsubscribed or pruned.
    pub async fn recv(&mut self) -> Option<Arc<AnalyticsSnapshot>> {
        self.rx.recv().await
    }
}

impl SnapshotPublisher {
    /// Must be called from within a tokio runtime: spawns the fan-out
    /// task that drains the slot towards the observers.
    pub fn new(config: PublisherConfig) -> Self {
        let (slot, rx) = watch::channel(None);
        let observers: Arc<Mutex<ObserverMap>> = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(fan_out(rx, observers.clone()));

        Self {
            slot,
            observers,
            next_observer_id: AtomicU64::new(1),
            observer_buffer: config.observer_buffer,
        }
    }

    /// Producer-side entry point. O(1): overwrites the shared slot and
    /// returns; delivery happens on the fan-out task.
    pub fn publish(&self, snapshot: AnalyticsSnapshot) {
        self.slot.send_replace(Some(Arc::new(snapshot)));
    }

    /// Pull-side read of the most recent snapshot, if any was published.
    pub fn latest(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.slot.borrow().clone()
    }

    /// Register a push observer. It receives snapshots published after
    /// this call; there is no replay of earlier ones.
    pub fn subscribe(&self) -> MetricsObserver {
        let (tx, rx) = mpsc::channel(self.observer_buffer);
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .expect("observer lock poisoned")
            .insert(id, tx);
        debug!("Observer #{} subscribed", id);
        MetricsObserver { id, rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self
            .observers
            .lock()
            .expect("observer lock poisoned")
            .remove(&id)
            .is_some()
        {
            debug!("Observer #{} unsubscribed", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().expect("observer lock poisoned").len()
    }
}

/// Runs until the publisher is dropped. Wakes on every slot overwrite
/// and forwards the latest snapshot to each observer. try_send keeps
/// the loop non-blocking: an observer with a full (slow) or closed
/// (disconnected) channel is removed without touching the others.
async fn fan_out(
    mut rx: watch::Receiver<Option<Arc<AnalyticsSnapshot>>>,
    observers: Arc<Mutex<ObserverMap>>,
) {
    while rx.changed().await.is_ok() {
        let snapshot = match rx.borrow_and_update().clone() {
            Some(snapshot) => snapshot,
            None => continue,
        };

        let mut dead = Vec::new();
        let mut map = observers.lock().expect("observer lock poisoned");
        for (id, tx) in map.iter() {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Observer #{} is lagging, dropping it", id);
                    dead.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Observer #{} disconnected", id);
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            map.remove(&id);
        }
    }
}
