/*!
 * Leases
 * Time-bounded grants of continued existence for cross-boundary objects
 */

use crate::core::limits::{
    DEFAULT_INITIAL_LEASE, DEFAULT_RENEW_ON_CALL, DEFAULT_SPONSORSHIP_TIMEOUT,
};
use crate::core::types::{LeaseId, ObjectId, SponsorId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Terms a boundary issues with every object it hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LeaseTerms {
    /// Lifetime granted at creation
    pub initial: Duration,
    /// Floor the remaining lifetime is raised to by each successful call
    pub renew_on_call: Duration,
    /// Extra time the boundary waits for a renewal past the deadline
    pub sponsorship_timeout: Duration,
}

impl Default for LeaseTerms {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_LEASE,
            renew_on_call: DEFAULT_RENEW_ON_CALL,
            sponsorship_timeout: DEFAULT_SPONSORSHIP_TIMEOUT,
        }
    }
}

impl LeaseTerms {
    /// Terms for objects that never expire on their own
    ///
    /// Such objects live until they are released or their boundary is torn down.
    pub const fn pinned() -> Self {
        Self {
            initial: Duration::ZERO,
            renew_on_call: Duration::ZERO,
            sponsorship_timeout: Duration::ZERO,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.initial.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    Active,
    /// Remaining time hit zero; sponsors are being consulted
    Renewing,
    Expired,
}

/// Renewal agent consulted when a lease runs out
pub trait LeaseSponsor: Send + Sync {
    fn sponsor_id(&self) -> SponsorId;

    /// Lifetime to grant; `Duration::ZERO` lets the lease expire
    fn renewal(&self, lease: &Lease) -> Duration;

    /// Called once when a lease this sponsor is registered with expires
    ///
    /// Never called with the lease's own lock held.
    fn released(&self, _lease: &Lease) {}
}

struct LeaseInner {
    remaining: Duration,
    state: LeaseState,
    sponsors: Vec<(SponsorId, Weak<dyn LeaseSponsor>)>,
}

/// One lease record
pub struct Lease {
    id: LeaseId,
    object: ObjectId,
    terms: LeaseTerms,
    inner: Mutex<LeaseInner>,
}

impl Lease {
    pub fn new(id: LeaseId, object: ObjectId, terms: LeaseTerms) -> Self {
        Self {
            id,
            object,
            terms,
            inner: Mutex::new(LeaseInner {
                remaining: terms.initial,
                state: LeaseState::Active,
                sponsors: Vec::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> LeaseId {
        self.id
    }

    #[inline]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    #[inline]
    pub fn terms(&self) -> LeaseTerms {
        self.terms
    }

    pub fn remaining(&self) -> Duration {
        self.inner.lock().remaining
    }

    pub fn state(&self) -> LeaseState {
        self.inner.lock().state
    }

    pub fn is_expired(&self) -> bool {
        self.state() == LeaseState::Expired
    }

    /// Register a sponsor; registering the same sponsor twice is a no-op
    ///
    /// Returns false when the lease already expired.
    pub fn register(&self, sponsor: &Arc<dyn LeaseSponsor>) -> bool {
        let id = sponsor.sponsor_id();
        let mut inner = self.inner.lock();
        if inner.state == LeaseState::Expired {
            return false;
        }
        if !inner.sponsors.iter().any(|(existing, _)| *existing == id) {
            inner.sponsors.push((id, Arc::downgrade(sponsor)));
        }
        true
    }

    pub fn unregister(&self, sponsor: SponsorId) {
        self.inner.lock().sponsors.retain(|(id, _)| *id != sponsor);
    }

    /// Live sponsors; dropped ones are forgotten
    pub fn sponsors(&self) -> Vec<Arc<dyn LeaseSponsor>> {
        let mut inner = self.inner.lock();
        inner.sponsors.retain(|(_, weak)| weak.strong_count() > 0);
        inner
            .sponsors
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    pub fn sponsor_count(&self) -> usize {
        self.sponsors().len()
    }

    /// Reset the remaining time to `grant`
    ///
    /// Sets, never adds: a renewal cannot push the lease past one increment.
    /// Returns false when the lease already expired.
    pub fn renew(&self, grant: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == LeaseState::Expired {
            return false;
        }
        inner.remaining = grant;
        inner.state = LeaseState::Active;
        true
    }

    /// Raise the remaining time to at least the renew-on-call floor
    pub fn renew_on_call(&self) {
        let floor = self.terms.renew_on_call;
        let mut inner = self.inner.lock();
        if inner.state == LeaseState::Active && inner.remaining < floor {
            inner.remaining = floor;
        }
    }

    /// Subtract elapsed time, saturating at zero; returns what is left
    pub fn elapse(&self, elapsed: Duration) -> Duration {
        let mut inner = self.inner.lock();
        inner.remaining = inner.remaining.saturating_sub(elapsed);
        inner.remaining
    }

    pub(crate) fn begin_renewal(&self) {
        let mut inner = self.inner.lock();
        if inner.state == LeaseState::Active {
            inner.state = LeaseState::Renewing;
        }
    }

    /// Mark the lease expired and let every registered sponsor forget it
    pub fn expire(&self) {
        let sponsors = {
            let mut inner = self.inner.lock();
            if inner.state == LeaseState::Expired {
                return;
            }
            inner.state = LeaseState::Expired;
            inner.remaining = Duration::ZERO;
            std::mem::take(&mut inner.sponsors)
        };

        for sponsor in sponsors.iter().filter_map(|(_, weak)| weak.upgrade()) {
            sponsor.released(self);
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("object", &self.object)
            .field("state", &inner.state)
            .field("remaining", &inner.remaining)
            .field("sponsors", &inner.sponsors.len())
            .finish()
    }
}
