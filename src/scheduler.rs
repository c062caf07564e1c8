//! Background purge of expired verification codes.
//!
//! The purge runs on a fixed interval as an explicitly owned tokio task. The
//! binary starts it with `PurgeScheduler::spawn` and stops it through the
//! returned `PurgeHandle`; nothing starts as a side effect of loading a module.
//! Each pass opens its own connection so it never contends for the request
//! mutex.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{CatalogDb, DbError, PurgeCounts};

/// Run one purge pass against an open database and log what it removed.
pub fn purge_once(db: &CatalogDb, ttl_secs: i64) -> Result<PurgeCounts, DbError> {
    let counts = db.purge_expired_verification(ttl_secs)?;
    if counts.codes > 0 || counts.phone_numbers > 0 {
        log::info!(
            "Purged {} expired verification code(s) and {} unclaimed phone number(s)",
            counts.codes,
            counts.phone_numbers
        );
    }
    Ok(counts)
}

pub struct PurgeScheduler {
    db_path: PathBuf,
    ttl_secs: i64,
    interval: Duration,
}

impl PurgeScheduler {
    pub fn new(db_path: PathBuf, ttl_secs: i64, interval: Duration) -> Self {
        Self {
            db_path,
            ttl_secs,
            interval,
        }
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self, runtime: &tokio::runtime::Handle) -> PurgeHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = runtime.spawn(self.run(stop_rx));
        PurgeHandle { stop_tx, task }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        log::info!(
            "Verification purge every {}s (ttl {}s)",
            self.interval.as_secs(),
            self.ttl_secs
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.tick().await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("Verification purge stopped");
    }

    /// One pass on the blocking pool; opening SQLite and migrating block.
    async fn tick(&self) {
        let db_path = self.db_path.clone();
        let ttl_secs = self.ttl_secs;
        let outcome = tokio::task::spawn_blocking(move || {
            let db = CatalogDb::open_at(db_path)?;
            purge_once(&db, ttl_secs)
        })
        .await;
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => log::warn!("Verification purge failed: {}", e),
            Err(e) => log::warn!("Verification purge task ended abnormally: {}", e),
        }
    }
}

/// Owner of a running purge task.
pub struct PurgeHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PurgeHandle {
    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            log::warn!("Purge task ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
