//! Background persistence writer.
//!
//! Mutations never wait for storage. Each new cart snapshot is pushed onto an
//! unbounded queue and a single spawned task writes the snapshots in the
//! order they were queued, so an older cart can never land on top of a newer
//! one. When coalescing is on, snapshots that are already superseded by a
//! later one in the queue are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::DynKeyValueStore;

/// Messages for the writer task.
enum WriteCommand {
    /// Store this serialized cart.
    Persist(String),
    /// Reply once every earlier command has been handled.
    Flush(oneshot::Sender<()>),
}

/// Counters shared between the queue handle and the writer task.
#[derive(Debug, Default)]
struct WriterStats {
    written: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Handle used by the store to queue writes.
#[derive(Debug, Clone)]
pub(crate) struct PersistQueue {
    sender: mpsc::UnboundedSender<WriteCommand>,
    stats: Arc<WriterStats>,
}

impl PersistQueue {
    /// Spawn the writer task and return its queue.
    ///
    /// Must be called from within a Tokio runtime. The task exits once every
    /// queue handle has been dropped and the remaining commands are drained.
    pub(crate) fn spawn(
        storage: Arc<dyn DynKeyValueStore>,
        key: &'static str,
        coalesce: bool,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(WriterStats::default());

        let writer = CartWriter {
            receiver,
            storage,
            key,
            coalesce,
            stats: Arc::clone(&stats),
        };
        tokio::spawn(writer.run());

        Self { sender, stats }
    }

    /// Queue a snapshot for writing. Never blocks.
    pub(crate) fn enqueue(&self, payload: String) {
        if self.sender.send(WriteCommand::Persist(payload)).is_err() {
            warn!("Cart writer is gone, snapshot not persisted");
        }
    }

    /// Wait until everything queued before this call has been handled.
    pub(crate) async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(WriteCommand::Flush(tx)).is_err() {
            warn!("Cart writer is gone, nothing to flush");
            return;
        }
        // A dropped sender means the writer stopped; nothing more will be written.
        let _ = rx.await;
    }

    /// Writes that reached storage.
    pub(crate) fn written(&self) -> u64 {
        self.stats.written.load(Ordering::Relaxed)
    }

    /// Writes the backend rejected.
    pub(crate) fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Snapshots dropped because a newer one was already queued.
    pub(crate) fn skipped(&self) -> u64 {
        self.stats.skipped.load(Ordering::Relaxed)
    }
}

/// The writer task's state.
struct CartWriter {
    receiver: mpsc::UnboundedReceiver<WriteCommand>,
    storage: Arc<dyn DynKeyValueStore>,
    key: &'static str,
    coalesce: bool,
    stats: Arc<WriterStats>,
}

impl CartWriter {
    async fn run(mut self) {
        debug!(key = self.key, coalesce = self.coalesce, "Cart writer started");

        while let Some(command) = self.receiver.recv().await {
            let mut pending = None;
            let mut waiters = Vec::new();
            self.absorb(command, &mut pending, &mut waiters);

            if self.coalesce {
                while let Ok(next) = self.receiver.try_recv() {
                    self.absorb(next, &mut pending, &mut waiters);
                }
            }

            if let Some(payload) = pending {
                self.write(&payload).await;
            }
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }

        debug!(key = self.key, "Cart writer stopped");
    }

    fn absorb(
        &self,
        command: WriteCommand,
        pending: &mut Option<String>,
        waiters: &mut Vec<oneshot::Sender<()>>,
    ) {
        match command {
            WriteCommand::Persist(payload) => {
                if pending.replace(payload).is_some() {
                    self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
            WriteCommand::Flush(waiter) => waiters.push(waiter),
        }
    }

    async fn write(&self, payload: &str) {
        match self.storage.set_boxed(self.key, payload).await {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
                debug!(key = self.key, bytes = payload.len(), "Persisted cart");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = self.key, error = %e, "Failed to persist cart");
            }
        }
    }
}
