/*!
 * Exception Translation
 *
 * Outermost stage. Whatever module code raises, only a `ModuleError` leaves
 * the boundary: a `ModuleError` passes through unchanged, any other failure
 * is folded into one with its full description, and panics are caught.
 */

use super::{CallContext, Interceptor};
use crate::boundary::Outcome;
use crate::core::errors::ModuleError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct ExceptionTranslation;

impl Interceptor for ExceptionTranslation {
    fn name(&self) -> &'static str {
        "exception-translation"
    }

    fn intercept(&self, call: &mut CallContext<'_>) -> anyhow::Result<Outcome> {
        let object = call.object();
        let method = call.invocation().method();

        match catch_unwind(AssertUnwindSafe(|| call.proceed())) {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => {
                let translated = translate(err);
                debug!(object = %object, method, kind = %translated.kind(), "Module call failed");
                Err(translated.into())
            }
            Err(payload) => {
                let translated = ModuleError::call(format!(
                    "module panicked in {}: {}",
                    method,
                    panic_message(payload.as_ref())
                ));
                debug!(object = %object, method, "Module call panicked");
                Err(translated.into())
            }
        }
    }
}

/// Fold any failure into the boundary-safe kind, never double-wrapping
pub fn translate(err: anyhow::Error) -> ModuleError {
    match err.downcast::<ModuleError>() {
        Ok(safe) => safe,
        Err(other) => ModuleError::call(format!("{:?}", other)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
