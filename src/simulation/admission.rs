//! Admission control
//!
//! A counting gate shared by every unit of a run. Capacity is fixed at
//! construction; a slot is held by an [`AdmissionPermit`] and returned when the
//! permit drops, whichever way the unit exits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::simulation::{SimulationError, SimulationResult};

/// Counts concurrent holders and remembers the high-water mark
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    /// Create an empty gauge
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one holder until the returned guard drops
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { gauge: Arc::clone(self) }
    }

    /// Holders right now
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Most holders ever seen at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// Registration in an [`InFlightGauge`]
#[derive(Debug)]
pub struct InFlightGuard {
    gauge: Arc<InFlightGauge>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded concurrency gate
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<InFlightGauge>,
}

/// One admitted slot; released on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    _in_flight: InFlightGuard,
}

impl AdmissionController {
    /// Gate with a fixed capacity (at least one slot)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(InFlightGauge::new()),
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> SimulationResult<AdmissionPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SimulationError::AdmissionClosed)?;

        Ok(AdmissionPermit { _permit: permit, _in_flight: self.in_flight.enter() })
    }

    /// Refuse all further admissions; waiters get [`SimulationError::AdmissionClosed`]
    ///
    /// Permits already handed out stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Admitted units right now
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Most units ever admitted at once
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}
