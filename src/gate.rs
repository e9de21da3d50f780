//! Process-wide admission gate.
//!
//! At most one request may be in flight across every lane. The gate is a
//! single-permit semaphore: a submission either takes the permit right away
//! or is rejected; nothing queues. The permit is released when the
//! [`AdmissionPermit`] drops, so every exit path of a request (success,
//! failure, early return, panic unwinding) frees the gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::session::Lane;

#[derive(Debug, Default)]
struct GateStats {
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Cloneable handle; all clones share the same single slot.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slot: Arc<Semaphore>,
    stats: Arc<GateStats>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            stats: Arc::new(GateStats::default()),
        }
    }

    /// Take the slot for `lane`, or `None` if another request holds it.
    pub fn try_admit(&self, lane: Lane) -> Option<AdmissionPermit> {
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => {
                self.stats.admitted.fetch_add(1, Ordering::Relaxed);
                debug!(%lane, "request admitted");
                Some(AdmissionPermit {
                    _permit: permit,
                    lane,
                    admitted_at: Instant::now(),
                })
            }
            Err(_) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(%lane, "request rejected: gate busy");
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    pub fn admitted(&self) -> u64 {
        self.stats.admitted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.stats.rejected.load(Ordering::Relaxed)
    }
}

/// Proof of admission. Dropping it reopens the gate.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    lane: Lane,
    admitted_at: Instant,
}

impl AdmissionPermit {
    pub fn lane(&self) -> Lane {
        self.lane
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        debug!(
            lane = %self.lane,
            held_ms = self.admitted_at.elapsed().as_millis() as u64,
            "gate released"
        );
    }
}
