/*!
 * Pinning
 *
 * Holds the target object pinned while a call runs, so the boundary's reaper
 * cannot reclaim it mid-call even if its lease lapses concurrently. A call
 * that succeeds also counts as use and moves the deadline forward.
 */

use super::{CallContext, Interceptor};
use crate::boundary::Outcome;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct Pinning;

impl Interceptor for Pinning {
    fn name(&self) -> &'static str {
        "pinning"
    }

    fn intercept(&self, call: &mut CallContext<'_>) -> anyhow::Result<Outcome> {
        let slot = call.slot().clone();
        let _pin = slot.pin();

        let result = call.proceed();
        if result.is_ok() {
            slot.renew_on_call(Instant::now());
        }
        result
    }
}
