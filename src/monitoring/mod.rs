/*!
 * Monitoring
 * Structured tracing for hosts and module boundaries
 */

pub mod tracer;

pub use tracer::{generate_trace_id, init_module_tracing, init_tracing, CallSpan};
