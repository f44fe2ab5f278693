/*!
 * Structured Tracing
 * Subscriber setup for the host and for module processes, plus per-call spans
 *
 * Environment variables:
 * - RUST_LOG: log level filter (default: info)
 * - SNIP_TRACE_JSON: JSON output when "1" or "true" (default: false)
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Level, Span};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Calls slower than this are reported at warn level
const SLOW_CALL: Duration = Duration::from_millis(50);

/// Where a subscriber writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    /// Host process: stdout, thread names, span close events
    Host,
    /// Module process: stderr only, stdout carries boundary frames
    Module,
}

fn json_requested() -> bool {
    matches!(
        std::env::var("SNIP_TRACE_JSON").as_deref(),
        Ok("1") | Ok("true")
    )
}

/// Install the global subscriber; false when one was already installed
fn install(sink: Sink) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = tracing_subscriber::registry().with(filter);

    match (sink, json_requested()) {
        (Sink::Host, true) => base
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        (Sink::Host, false) => base
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        (Sink::Module, true) => base
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (Sink::Module, false) => base
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .is_ok()
}

/// Initialize tracing for the host process
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    if install(Sink::Host) {
        info!("Host tracing initialized");
    }
}

/// Initialize tracing inside a module process
pub fn init_module_tracing() {
    if install(Sink::Module) {
        debug!(pid = std::process::id(), "Module tracing initialized");
    }
}

/// Correlation id shared by the host and module sides of one call
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one invocation on a module object
pub struct CallSpan {
    span: Span,
    started: Instant,
    method: &'static str,
    correlation: String,
}

impl CallSpan {
    pub fn new(method: &'static str, object: u64) -> Self {
        let correlation = generate_trace_id();
        let span = tracing::span!(
            Level::DEBUG,
            "module_call",
            call = %correlation,
            method,
            object,
            elapsed_us = tracing::field::Empty,
            outcome = tracing::field::Empty,
            fault = tracing::field::Empty,
        );

        Self {
            span,
            started: Instant::now(),
            method,
            correlation,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.correlation
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn succeeded(&self) {
        self.span.record("outcome", "ok");
    }

    pub fn failed(&self, fault: &str) {
        self.span.record("outcome", "failed");
        self.span.record("fault", fault);
    }
}

impl Drop for CallSpan {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.span.record("elapsed_us", elapsed.as_micros() as u64);

        let _entered = self.span.enter();
        if elapsed > SLOW_CALL {
            warn!(
                call = %self.correlation,
                method = self.method,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow module call"
            );
        } else {
            debug!(call = %self.correlation, method = self.method, "Module call finished");
        }
    }
}
