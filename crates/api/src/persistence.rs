//! Best-effort snapshot persistence.
//!
//! [`PersistenceGateway::record`] flattens the current [`SystemState`] into a
//! row and pushes it onto a bounded queue without waiting. A single
//! [`PersistenceWorker`] task drains the queue and writes each row through a
//! [`SnapshotWriter`]. Write failures are logged and counted, never retried.
//! A full queue drops the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gridx_core::{DeviceRole, HubError, SystemState};
use gridx_db::models::snapshot::CreateSnapshot;
use gridx_db::repositories::SnapshotRepo;
use gridx_db::DbPool;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Destination for snapshot rows.
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    async fn write(&self, snapshot: &CreateSnapshot) -> Result<(), HubError>;
}

/// Writes snapshots to the `smart_grid_data` table.
pub struct PgSnapshotWriter {
    pool: DbPool,
}

impl PgSnapshotWriter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotWriter for PgSnapshotWriter {
    async fn write(&self, snapshot: &CreateSnapshot) -> Result<(), HubError> {
        let id = SnapshotRepo::insert(&self.pool, snapshot)
            .await
            .map_err(|e| HubError::PersistenceFailure(e.to_string()))?;
        tracing::debug!(id, trigger = %snapshot.trigger_source, "Snapshot saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PersistenceStats {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time view of the persistence counters, reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceCounts {
    /// Rows the store accepted.
    pub written: u64,
    /// Rows the store rejected.
    pub failed: u64,
    /// Rows never handed to the store (queue full or worker stopped).
    pub dropped: u64,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Non-blocking handle for recording snapshots. Cheap to clone.
#[derive(Clone)]
pub struct PersistenceGateway {
    sender: Option<mpsc::Sender<CreateSnapshot>>,
    stats: Arc<PersistenceStats>,
}

impl PersistenceGateway {
    /// Start a worker draining a queue of `capacity` rows into `writer`.
    ///
    /// The worker stops once `cancel` fires (after flushing what is already
    /// queued) or when every gateway clone has been dropped.
    pub fn spawn(
        writer: Arc<dyn SnapshotWriter>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let stats = Arc::new(PersistenceStats::default());

        let worker = PersistenceWorker {
            writer,
            stats: Arc::clone(&stats),
        };
        let handle = tokio::spawn(worker.run(receiver, cancel));

        let gateway = Self {
            sender: Some(sender),
            stats,
        };
        (gateway, handle)
    }

    /// A gateway with no store behind it. `record` is a no-op.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            stats: Arc::new(PersistenceStats::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue one snapshot of `state` attributed to `trigger`. Never waits.
    pub fn record(&self, trigger: DeviceRole, state: &SystemState) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(CreateSnapshot::from_state(trigger, state)) {
            Ok(()) => {}
            Err(TrySendError::Full(row)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    trigger = %row.trigger_source,
                    "Persistence queue full, snapshot dropped"
                );
            }
            Err(TrySendError::Closed(row)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    trigger = %row.trigger_source,
                    "Persistence worker stopped, snapshot dropped"
                );
            }
        }
    }

    pub fn counts(&self) -> PersistenceCounts {
        PersistenceCounts {
            written: self.stats.written.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Background task that owns the receiving end of the snapshot queue.
struct PersistenceWorker {
    writer: Arc<dyn SnapshotWriter>,
    stats: Arc<PersistenceStats>,
}

impl PersistenceWorker {
    async fn run(self, mut receiver: mpsc::Receiver<CreateSnapshot>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                row = receiver.recv() => match row {
                    Some(row) => self.persist(&row).await,
                    None => {
                        tracing::info!("Snapshot queue closed, persistence shutting down");
                        break;
                    }
                },
                () = cancel.cancelled() => {
                    receiver.close();
                    let mut flushed = 0usize;
                    while let Some(row) = receiver.recv().await {
                        self.persist(&row).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Persistence cancelled, queue flushed");
                    break;
                }
            }
        }
    }

    async fn persist(&self, row: &CreateSnapshot) {
        match self.writer.write(row).await {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %e,
                    trigger = %row.trigger_source,
                    "Failed to insert snapshot"
                );
            }
        }
    }
}
