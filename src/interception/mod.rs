/*!
 * Interception Chain
 *
 * Ordered wrappers every proxy invocation passes through before it reaches
 * the module object. Each stage decides whether and how to `proceed`; the
 * end of the chain dispatches to the object itself.
 */

pub mod exception;
pub mod pinning;
pub mod synthesizer;

pub use exception::ExceptionTranslation;
pub use pinning::Pinning;
pub use synthesizer::{ProxySynthesizer, SynthesizedProxy};

use crate::boundary::{Invocation, Outcome};
use crate::core::types::ObjectId;
use crate::module::dispatch::dispatch;
use crate::module::objects::ObjectSlot;
use std::sync::Arc;

/// One stage of the chain
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle a call; `call.proceed()` runs the rest of the chain
    fn intercept(&self, call: &mut CallContext<'_>) -> anyhow::Result<Outcome>;
}

/// A call making its way down the chain
pub struct CallContext<'a> {
    object: ObjectId,
    slot: &'a Arc<ObjectSlot>,
    invocation: &'a Invocation,
    remaining: &'a [Arc<dyn Interceptor>],
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        object: ObjectId,
        slot: &'a Arc<ObjectSlot>,
        invocation: &'a Invocation,
        chain: &'a [Arc<dyn Interceptor>],
    ) -> Self {
        Self {
            object,
            slot,
            invocation,
            remaining: chain,
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn slot(&self) -> &Arc<ObjectSlot> {
        self.slot
    }

    pub fn invocation(&self) -> &Invocation {
        self.invocation
    }

    /// Run the next stage, or the target method once the chain is exhausted
    pub fn proceed(&mut self) -> anyhow::Result<Outcome> {
        let remaining = self.remaining;
        match remaining.split_first() {
            Some((next, rest)) => {
                self.remaining = rest;
                next.intercept(self)
            }
            None => {
                let mut object = self.slot.object().lock();
                dispatch(object.as_mut(), self.invocation)
            }
        }
    }
}
