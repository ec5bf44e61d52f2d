//! Hit Count Decay Task
//!
//! Background task that periodically ages cache hit counts so that stale
//! popularity does not pin cold files forever.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that decays the cache every `interval`.
///
/// The task runs until a decay pass leaves the cache empty, then exits. It
/// acquires the store lock once per tick and never holds it across an await.
///
/// # Arguments
/// * `store` - Shared reference to the cache store
/// * `interval` - Time between decay passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// when the timer is rescheduled or the server shuts down.
pub fn spawn_decay_task(store: Arc<Mutex<CacheStore>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let (report, stats) = {
                let mut store = store.lock().await;
                let report = store.decay();
                (report, store.stats())
            };

            debug!(
                "Decay: removed {} entries, {} remain, {} bytes charged ({:.1}% of budget)",
                report.removed,
                stats.charged_entries,
                stats.total_charge,
                stats.utilization() * 100.0
            );

            if report.idle {
                info!("Cache empty, decay timer stopped");
                break;
            }
        }
    })
}

// == Decay Timer ==
/// Cancel-and-restart handle around [`spawn_decay_task`].
///
/// Every cache access pushes the next decay back by a full interval; the
/// task itself stops once the cache is empty.
#[derive(Debug)]
pub struct DecayTimer {
    interval: Duration,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl DecayTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: StdMutex::new(None),
        }
    }

    /// Aborts any pending run and starts a fresh countdown.
    pub fn reschedule(&self, store: Arc<Mutex<CacheStore>>) {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        *slot = Some(spawn_decay_task(store, self.interval));
    }

    /// Returns true while a decay task is alive.
    pub fn is_running(&self) -> bool {
        let slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Aborts the decay task, if any.
    pub fn stop(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Drop for DecayTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
