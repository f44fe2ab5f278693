/*!
 * Lifetime Manager
 *
 * Host-side lease table for one boundary. A background thread runs a
 * checkpoint every poll interval: remaining time is decremented, and leases
 * that hit zero ask their sponsors for more. Leases nobody renews expire and
 * their objects are handed back to the boundary.
 */

use super::lease::{Lease, LeaseSponsor, LeaseTerms};
use crate::core::types::{IdCounter, LeaseId, ObjectId};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lease ids are unique per process so one sponsor can serve every boundary
static LEASE_IDS: IdCounter = IdCounter::new();

/// Receives the outcome of each renewal decision
///
/// The host forwards these to the boundary that owns the object.
pub trait LeaseRenewer: Send + Sync {
    /// Forward a renewal; false when the object is already gone on the far side
    fn renewed(&self, lease: &Lease, grant: Duration) -> bool;
    fn expired(&self, lease: &Lease);
}

/// Counts from one checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    pub checked: usize,
    pub renewed: usize,
    pub expired: usize,
}

pub struct LifetimeManager {
    name: String,
    leases: DashMap<LeaseId, Arc<Lease>, RandomState>,
    renewer: Arc<dyn LeaseRenewer>,
    // Serializes checkpoints so each lease sees them strictly in order
    checkpoint_lock: Mutex<()>,
    stop_tx: Mutex<Option<flume::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LifetimeManager {
    pub fn new(name: impl Into<String>, renewer: Arc<dyn LeaseRenewer>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            leases: DashMap::with_hasher(RandomState::new()),
            renewer,
            checkpoint_lock: Mutex::new(()),
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// Track a lease for `object`; pinned terms get no lease at all
    pub fn issue(&self, object: ObjectId, terms: LeaseTerms) -> Option<Arc<Lease>> {
        if terms.is_pinned() {
            return None;
        }
        let lease = Arc::new(Lease::new(LeaseId(LEASE_IDS.next()), object, terms));
        debug!(
            boundary = %self.name,
            lease = %lease.id(),
            object = %object,
            initial_ms = terms.initial.as_millis() as u64,
            "Lease issued"
        );
        self.leases.insert(lease.id(), lease.clone());
        Some(lease)
    }

    pub fn get(&self, id: LeaseId) -> Option<Arc<Lease>> {
        self.leases.get(&id).map(|entry| entry.value().clone())
    }

    /// Stop tracking a lease and mark it expired
    pub fn remove(&self, id: LeaseId) -> Option<Arc<Lease>> {
        let (_, lease) = self.leases.remove(&id)?;
        lease.expire();
        Some(lease)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Run one renewal checkpoint as if `elapsed` passed since the last one
    pub fn checkpoint(&self, elapsed: Duration) -> CheckpointStats {
        let _guard = self.checkpoint_lock.lock();
        let mut stats = CheckpointStats::default();

        let snapshot: Vec<Arc<Lease>> = self
            .leases
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for lease in snapshot {
            stats.checked += 1;
            if lease.is_expired() {
                self.leases.remove(&lease.id());
                continue;
            }
            if !lease.elapse(elapsed).is_zero() {
                continue;
            }

            lease.begin_renewal();
            let grant = self.consult_sponsors(&lease);

            if !grant.is_zero() && lease.renew(grant) {
                if self.renewer.renewed(&lease, grant) {
                    stats.renewed += 1;
                    continue;
                }
                stats.expired += 1;
                debug!(boundary = %self.name, lease = %lease.id(), object = %lease.object(), "Boundary no longer holds object, lease expired");
                lease.expire();
                self.leases.remove(&lease.id());
            } else {
                stats.expired += 1;
                debug!(boundary = %self.name, lease = %lease.id(), object = %lease.object(), "Lease expired");
                lease.expire();
                self.leases.remove(&lease.id());
                self.renewer.expired(&lease);
            }
        }

        stats
    }

    /// Largest grant offered by any live sponsor
    fn consult_sponsors(&self, lease: &Lease) -> Duration {
        lease
            .sponsors()
            .iter()
            .map(|sponsor| self.ask(sponsor, lease))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn ask(&self, sponsor: &Arc<dyn LeaseSponsor>, lease: &Lease) -> Duration {
        match catch_unwind(AssertUnwindSafe(|| sponsor.renewal(lease))) {
            Ok(grant) => grant,
            Err(_) => {
                warn!(
                    boundary = %self.name,
                    lease = %lease.id(),
                    sponsor = %sponsor.sponsor_id(),
                    "Sponsor panicked during renewal, denying"
                );
                lease.unregister(sponsor.sponsor_id());
                Duration::ZERO
            }
        }
    }

    /// Start the checkpoint thread
    pub fn start(self: &Arc<Self>, poll_interval: Duration) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let manager: Weak<Self> = Arc::downgrade(self);
        let name = self.name.clone();

        let spawned = thread::Builder::new()
            .name(format!("lease-{}", name))
            .spawn(move || {
                let mut last = Instant::now();
                loop {
                    match stop_rx.recv_timeout(poll_interval) {
                        Err(flume::RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    let Some(manager) = manager.upgrade() else {
                        break;
                    };
                    let now = Instant::now();
                    manager.checkpoint(now - last);
                    last = now;
                }
                debug!(boundary = %name, "Lease checkpoint thread stopped");
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                *self.stop_tx.lock() = Some(stop_tx);
                info!(
                    boundary = %self.name,
                    poll_ms = poll_interval.as_millis() as u64,
                    "Lifetime manager started"
                );
            }
            Err(e) => warn!(boundary = %self.name, error = %e, "Failed to start lifetime manager"),
        }
    }

    /// Stop the checkpoint thread and forget every lease
    pub fn shutdown(&self) {
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.worker.lock().take() {
            // The last Arc may be released on the worker thread itself
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        for entry in self.leases.iter() {
            entry.value().expire();
        }
        self.leases.clear();
    }
}

impl Drop for LifetimeManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LifetimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeManager")
            .field("name", &self.name)
            .field("leases", &self.leases.len())
            .finish()
    }
}
