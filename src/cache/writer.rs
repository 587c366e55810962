//! Background cache writer
//!
//! Runs hand finished profession details to [`CacheWriter::submit`], which
//! never blocks. A single worker task drains the queue, bounding each write
//! with a timeout and logging failures instead of surfacing them.

use crate::cache::{DetailCache, ProfessionDetail};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters describing what the worker did
#[derive(Debug, Default)]
pub struct WriterStats {
    pub written: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl WriterStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Cloneable handle used to enqueue cache writes
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<ProfessionDetail>,
    stats: Arc<WriterStats>,
}

/// Owner of the worker task; consumed by [`CacheWorker::shutdown`]
pub struct CacheWorker {
    handle: JoinHandle<()>,
    stop: CancellationToken,
    stats: Arc<WriterStats>,
}

impl CacheWriter {
    /// Spawns the worker and returns the submit handle alongside it
    ///
    /// # Arguments
    ///
    /// * `cache` - Backend receiving the writes
    /// * `ttl` - Expiry applied to every entry
    /// * `write_timeout` - Upper bound for a single write
    /// * `capacity` - Queue length; submissions beyond it are dropped
    pub fn spawn(
        cache: Arc<dyn DetailCache>,
        ttl: Duration,
        write_timeout: Duration,
        capacity: usize,
    ) -> (CacheWriter, CacheWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(WriterStats::default());
        let stop = CancellationToken::new();

        let handle = tokio::spawn(run_worker(
            cache,
            rx,
            ttl,
            write_timeout,
            stop.clone(),
            Arc::clone(&stats),
        ));

        (
            CacheWriter {
                tx,
                stats: Arc::clone(&stats),
            },
            CacheWorker {
                handle,
                stop,
                stats,
            },
        )
    }

    /// Enqueues a detail without waiting
    ///
    /// Returns false when the entry was dropped because the queue is full or
    /// the worker has stopped.
    pub fn submit(&self, detail: ProfessionDetail) -> bool {
        match self.tx.try_send(detail) {
            Ok(()) => true,
            Err(TrySendError::Full(detail)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    profession_id = detail.profession_id,
                    "Cache queue full, dropping write"
                );
                false
            }
            Err(TrySendError::Closed(detail)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    profession_id = detail.profession_id,
                    "Cache worker stopped, dropping write"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

impl CacheWorker {
    /// Stops accepting work, drains what is queued, and aborts the worker if
    /// draining takes longer than `grace`
    pub async fn shutdown(self, grace: Duration) -> Arc<WriterStats> {
        self.stop.cancel();

        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Cache worker panicked"),
            Err(_) => {
                warn!(grace = ?grace, "Cache worker did not drain in time, aborting");
                handle.abort();
            }
        }

        info!(
            written = self.stats.written(),
            failed = self.stats.failed(),
            dropped = self.stats.dropped(),
            "Cache writer stopped"
        );
        self.stats
    }
}

async fn run_worker(
    cache: Arc<dyn DetailCache>,
    mut rx: mpsc::Receiver<ProfessionDetail>,
    ttl: Duration,
    write_timeout: Duration,
    stop: CancellationToken,
    stats: Arc<WriterStats>,
) {
    loop {
        tokio::select! {
            biased;

            received = rx.recv() => match received {
                Some(detail) => write_one(cache.as_ref(), &detail, ttl, write_timeout, &stats).await,
                None => break,
            },
            _ = stop.cancelled() => {
                rx.close();
                while let Some(detail) = rx.recv().await {
                    write_one(cache.as_ref(), &detail, ttl, write_timeout, &stats).await;
                }
                break;
            }
        }
    }
}

async fn write_one(
    cache: &dyn DetailCache,
    detail: &ProfessionDetail,
    ttl: Duration,
    write_timeout: Duration,
    stats: &WriterStats,
) {
    match tokio::time::timeout(write_timeout, cache.save(detail, ttl)).await {
        Ok(Ok(())) => {
            stats.written.fetch_add(1, Ordering::Relaxed);
            debug!(
                backend = cache.name(),
                profession_id = detail.profession_id,
                "Cached profession detail"
            );
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                backend = cache.name(),
                profession_id = detail.profession_id,
                error = %e,
                "Cache write failed"
            );
        }
        Err(_) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                backend = cache.name(),
                profession_id = detail.profession_id,
                timeout = ?write_timeout,
                "Cache write timed out"
            );
        }
    }
}
