/*!
 * Object Table
 *
 * Boundary-side owner of every instantiated module object. Objects are only
 * ever referenced from outside by `ObjectId`. Each slot carries a lease
 * deadline; the reaper reclaims slots whose deadline passed, unless a call
 * currently pins them.
 */

use super::registry::ModuleObject;
use crate::capability::CapabilitySet;
use crate::core::types::{IdCounter, ObjectId};
use crate::lease::LeaseTerms;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ObjectSlot {
    type_name: String,
    exposed: CapabilitySet,
    terms: LeaseTerms,
    object: Mutex<Box<dyn ModuleObject>>,
    /// `None` while the object never expires
    deadline: Mutex<Option<Instant>>,
    pins: AtomicUsize,
}

impl ObjectSlot {
    fn new(
        type_name: String,
        object: Box<dyn ModuleObject>,
        exposed: CapabilitySet,
        terms: LeaseTerms,
        now: Instant,
    ) -> Self {
        let deadline = (!terms.is_pinned()).then(|| now + terms.initial + terms.sponsorship_timeout);
        Self {
            type_name,
            exposed,
            terms,
            object: Mutex::new(object),
            deadline: Mutex::new(deadline),
            pins: AtomicUsize::new(0),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Capability set fixed when the object was created
    pub fn exposed(&self) -> CapabilitySet {
        self.exposed
    }

    pub fn object(&self) -> &Mutex<Box<dyn ModuleObject>> {
        &self.object
    }

    /// Keep the slot alive until the guard drops
    pub fn pin(self: &Arc<Self>) -> PinGuard {
        self.pins.fetch_add(1, Ordering::AcqRel);
        PinGuard { slot: self.clone() }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }

    /// Reset the deadline to `lease_time` from `now`
    pub fn renew(&self, lease_time: Duration, now: Instant) {
        let mut deadline = self.deadline.lock();
        if deadline.is_some() {
            *deadline = Some(now + lease_time + self.terms.sponsorship_timeout);
        }
    }

    /// Push the deadline out to at least the renew-on-call floor
    pub fn renew_on_call(&self, now: Instant) {
        let floor = now + self.terms.renew_on_call + self.terms.sponsorship_timeout;
        let mut deadline = self.deadline.lock();
        if let Some(current) = deadline.as_mut() {
            if *current < floor {
                *current = floor;
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }

    fn is_reclaimable(&self, now: Instant) -> bool {
        !self.is_pinned() && self.deadline().is_some_and(|deadline| deadline <= now)
    }
}

/// Holds a slot pinned for the duration of a call
pub struct PinGuard {
    slot: Arc<ObjectSlot>,
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.slot.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct ObjectTable {
    slots: DashMap<ObjectId, Arc<ObjectSlot>, RandomState>,
    ids: IdCounter,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
            ids: IdCounter::new(),
        }
    }

    pub fn insert(
        &self,
        type_name: impl Into<String>,
        object: Box<dyn ModuleObject>,
        exposed: CapabilitySet,
        terms: LeaseTerms,
    ) -> ObjectId {
        let id = ObjectId(self.ids.next());
        let slot = ObjectSlot::new(type_name.into(), object, exposed, terms, Instant::now());
        self.slots.insert(id, Arc::new(slot));
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<ObjectSlot>> {
        self.slots.get(&id).map(|slot| slot.value().clone())
    }

    /// Returns false when the object is not (or no longer) alive
    pub fn renew(&self, id: ObjectId, lease_time: Duration) -> bool {
        match self.slots.get(&id) {
            Some(slot) => {
                slot.renew(lease_time, Instant::now());
                true
            }
            None => false,
        }
    }

    /// Drop the table's reference; an in-flight call finishes first
    pub fn release(&self, id: ObjectId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Reclaim every expired, unpinned object
    pub fn reap(&self, now: Instant) -> Vec<ObjectId> {
        let expired: Vec<ObjectId> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_reclaimable(now))
            .map(|entry| *entry.key())
            .collect();

        let mut reclaimed = Vec::with_capacity(expired.len());
        for id in expired {
            // Re-check under the shard lock: a call may have pinned it meanwhile
            if self
                .slots
                .remove_if(&id, |_, slot| slot.is_reclaimable(now))
                .is_some()
            {
                debug!(object = %id, "Reclaimed expired module object");
                reclaimed.push(id);
            }
        }
        reclaimed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}
