/*!
 * Proxy Synthesizer
 *
 * Decides which capabilities a proxy exposes and routes every call through
 * the interception chain. The exposed set is computed once, when the object
 * is created: the primary capability plus whichever optional capabilities
 * the instance can actually be cast to.
 */

use super::exception::{translate, ExceptionTranslation};
use super::pinning::Pinning;
use super::{CallContext, Interceptor};
use crate::boundary::{Invocation, Outcome};
use crate::capability::{Capability, CapabilitySet};
use crate::core::errors::{ModuleError, ModuleResult};
use crate::core::types::ObjectId;
use crate::module::objects::ObjectSlot;
use crate::module::registry::{implemented_capabilities, ModuleObject};
use std::sync::Arc;

/// Reusable across any number of creations and calls
#[derive(Clone)]
pub struct ProxySynthesizer {
    chain: Arc<[Arc<dyn Interceptor>]>,
}

impl Default for ProxySynthesizer {
    /// Exception translation outermost, pinning inside it
    fn default() -> Self {
        Self::new(vec![
            Arc::new(ExceptionTranslation) as Arc<dyn Interceptor>,
            Arc::new(Pinning),
        ])
    }
}

impl ProxySynthesizer {
    pub fn new(chain: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            chain: chain.into(),
        }
    }

    pub fn stages(&self) -> Vec<&'static str> {
        self.chain.iter().map(|stage| stage.name()).collect()
    }

    /// `{primary} ∪ (optional ∩ implemented)`
    ///
    /// Fails when the instance cannot be cast to `primary` at all.
    pub fn exposed_set(
        object: &mut dyn ModuleObject,
        primary: Capability,
        optional: &[Capability],
    ) -> ModuleResult<CapabilitySet> {
        let implemented = implemented_capabilities(object);
        if !implemented.contains(primary) {
            return Err(ModuleError::capability_mismatch(format!(
                "instance does not implement '{}'",
                primary
            )));
        }

        let requested = CapabilitySet::closure_of(&[primary])
            .union(&optional.iter().copied().collect::<CapabilitySet>());
        Ok(requested.intersection(&implemented))
    }

    /// Forwarding handle for one live object; cheap, not cached
    pub fn proxy(&self, id: ObjectId, slot: Arc<ObjectSlot>) -> SynthesizedProxy {
        SynthesizedProxy {
            id,
            slot,
            chain: self.chain.clone(),
        }
    }
}

impl std::fmt::Debug for ProxySynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySynthesizer")
            .field("chain", &self.stages())
            .finish()
    }
}

pub struct SynthesizedProxy {
    id: ObjectId,
    slot: Arc<ObjectSlot>,
    chain: Arc<[Arc<dyn Interceptor>]>,
}

impl SynthesizedProxy {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.slot.exposed()
    }

    pub fn exposes(&self, capability: Capability) -> bool {
        self.slot.exposed().contains(capability)
    }

    /// Run `invocation` through the chain
    ///
    /// Methods of capabilities outside the exposed set are refused before
    /// any stage runs.
    pub fn invoke(&self, invocation: &Invocation) -> ModuleResult<Outcome> {
        let capability = invocation.capability();
        if !self.exposes(capability) {
            return Err(ModuleError::capability_mismatch(format!(
                "'{}' is not exposed by {} ({})",
                capability,
                self.id,
                self.slot.type_name()
            )));
        }

        let mut call = CallContext::new(self.id, &self.slot, invocation, &self.chain);
        call.proceed().map_err(translate)
    }
}
