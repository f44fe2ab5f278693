/*!
 * Lease Sponsor
 *
 * Keeps cross-boundary objects alive exactly as long as the host still
 * holds a reference to them. The sponsor only keeps weak back-references:
 * it never keeps an object reachable by itself.
 */

use super::lease::{Lease, LeaseSponsor};
use crate::core::limits::DEFAULT_SPONSOR_RENEWAL;
use crate::core::types::{IdCounter, LeaseId, SponsorId};
use crate::host::RemoteObject;
use ahash::HashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

static SPONSOR_IDS: IdCounter = IdCounter::new();

/// Anything that may refer to an object living in another boundary
///
/// Local types implement this with the default method and are ignored by
/// sponsors.
pub trait LeaseHolder {
    fn remote_object(&self) -> Option<&Arc<RemoteObject>> {
        None
    }
}

impl LeaseHolder for Arc<RemoteObject> {
    fn remote_object(&self) -> Option<&Arc<RemoteObject>> {
        Some(self)
    }
}

struct Sponsored {
    target: Weak<RemoteObject>,
    lease: Weak<Lease>,
}

/// Process-wide renewal agent
pub struct Sponsor {
    id: SponsorId,
    renewal_time: Duration,
    this: Weak<Sponsor>,
    sponsored: Mutex<HashMap<LeaseId, Sponsored>>,
}

impl Sponsor {
    pub fn new() -> Arc<Self> {
        Self::with_renewal(DEFAULT_SPONSOR_RENEWAL)
    }

    pub fn with_renewal(renewal_time: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: SponsorId(SPONSOR_IDS.next()),
            renewal_time,
            this: this.clone(),
            sponsored: Mutex::new(HashMap::default()),
        })
    }

    #[inline]
    pub fn id(&self) -> SponsorId {
        self.id
    }

    #[inline]
    pub fn renewal_time(&self) -> Duration {
        self.renewal_time
    }

    /// Number of leases currently tracked
    pub fn sponsored_count(&self) -> usize {
        self.sponsored.lock().len()
    }

    pub fn is_sponsoring(&self, lease: LeaseId) -> bool {
        self.sponsored.lock().contains_key(&lease)
    }

    /// Start sponsoring the object behind `holder`
    ///
    /// No-op for local references and for objects without a live lease.
    pub fn register<H: LeaseHolder + ?Sized>(&self, holder: &H) {
        let Some(remote) = holder.remote_object() else {
            return;
        };
        let Some(lease) = remote.lease() else {
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };

        let mut sponsored = self.sponsored.lock();
        debug!(
            sponsor = %self.id,
            lease = %lease.id(),
            object = %lease.object(),
            state = ?lease.state(),
            remaining_ms = lease.remaining().as_millis() as u64,
            "Registering lease sponsor"
        );
        let this: Arc<dyn LeaseSponsor> = this;
        if !lease.register(&this) {
            // Expired between the lookup and the registration
            return;
        }
        sponsored.insert(
            lease.id(),
            Sponsored {
                target: Arc::downgrade(remote),
                lease: Arc::downgrade(&lease),
            },
        );
    }

    /// Stop sponsoring the object behind `holder`
    pub fn unregister<H: LeaseHolder + ?Sized>(&self, holder: &H) {
        let Some(remote) = holder.remote_object() else {
            return;
        };
        let Some(lease) = remote.lease() else {
            return;
        };

        let mut sponsored = self.sponsored.lock();
        debug!(sponsor = %self.id, lease = %lease.id(), "Unregistering lease sponsor");
        lease.unregister(self.id);
        sponsored.remove(&lease.id());
    }

    /// Release every sponsored lease
    pub fn unregister_all(&self) {
        let mut sponsored = self.sponsored.lock();
        for (lease_id, entry) in sponsored.drain() {
            trace!(sponsor = %self.id, lease = %lease_id, "Dropping sponsorship");
            if let Some(lease) = entry.lease.upgrade() {
                lease.unregister(self.id);
            }
        }
    }
}

impl LeaseSponsor for Sponsor {
    fn sponsor_id(&self) -> SponsorId {
        self.id
    }

    fn renewal(&self, lease: &Lease) -> Duration {
        let mut sponsored = self.sponsored.lock();
        debug!(
            sponsor = %self.id,
            lease = %lease.id(),
            state = ?lease.state(),
            remaining_ms = lease.remaining().as_millis() as u64,
            "Renewal checkpoint"
        );

        let alive = match sponsored.get(&lease.id()) {
            // Not tracked: nothing to keep alive
            None => {
                lease.unregister(self.id);
                return Duration::ZERO;
            }
            Some(entry) => entry.target.strong_count() > 0,
        };

        if !alive {
            // Last host reference dropped without an explicit unregister
            sponsored.remove(&lease.id());
            lease.unregister(self.id);
            debug!(sponsor = %self.id, lease = %lease.id(), "Sponsored object unreachable, denying renewal");
            return Duration::ZERO;
        }

        self.renewal_time
    }

    fn released(&self, lease: &Lease) {
        if self.sponsored.lock().remove(&lease.id()).is_some() {
            trace!(sponsor = %self.id, lease = %lease.id(), "Lease expired, sponsorship dropped");
        }
    }
}

impl Drop for Sponsor {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

impl std::fmt::Debug for Sponsor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sponsor")
            .field("id", &self.id)
            .field("renewal_time", &self.renewal_time)
            .field("sponsored", &self.sponsored_count())
            .finish()
    }
}
