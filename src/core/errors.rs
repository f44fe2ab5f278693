/*!
 * Error Types
 * The boundary-safe module failure and host-internal transport errors,
 * with thiserror, miette and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse category carried by a [`ModuleError`].
///
/// Informational only: every category travels as the same `ModuleError` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Package missing, malformed, or not loaded yet
    Load,
    /// Type does not implement the requested capability
    CapabilityMismatch,
    /// A non-interface name was supplied where an interface was required
    NotInterface,
    /// Embedded resource lookup failed
    Resource,
    /// Failure raised by module code during a call
    Call,
    /// The boundary or the remote object is gone
    Disconnected,
    /// Malformed or unexpected traffic on the boundary channel
    Protocol,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::CapabilityMismatch => "capability_mismatch",
            Self::NotInterface => "not_interface",
            Self::Resource => "resource",
            Self::Call => "call",
            Self::Disconnected => "disconnected",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single failure kind allowed to cross a module boundary.
///
/// Always constructible on either side: a message and a category, nothing
/// that depends on module code being present.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[error("{message}")]
#[diagnostic(
    code(module::failure),
    help("The failure originated inside a module boundary. The message carries the original description.")
)]
pub struct ModuleError {
    kind: FaultKind,
    message: String,
}

impl ModuleError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Load, message)
    }

    pub fn capability_mismatch(message: impl Into<String>) -> Self {
        Self::new(FaultKind::CapabilityMismatch, message)
    }

    pub fn not_interface(name: &str) -> Self {
        Self::new(
            FaultKind::NotInterface,
            format!("'{}' is not a capability interface", name),
        )
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Resource, message)
    }

    pub fn call(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Call, message)
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Disconnected, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Protocol, message)
    }

    #[inline]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for everything that crosses a boundary
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Host-internal transport errors
///
/// Never handed to collaborators directly; converted into [`ModuleError`]
/// at the edge of the host API.
#[derive(Error, Debug, Diagnostic)]
pub enum BoundaryError {
    #[error("Failed to spawn module boundary: {0}")]
    #[diagnostic(
        code(boundary::spawn_failed),
        help("Check that the package file exists and is executable.")
    )]
    SpawnFailed(String),

    #[error("Boundary I/O error: {0}")]
    #[diagnostic(code(boundary::io_error))]
    Io(#[from] std::io::Error),

    #[error("Frame codec error: {0}")]
    #[diagnostic(
        code(boundary::codec_error),
        help("Host and module were probably built against different protocol versions.")
    )]
    Codec(#[from] bincode::Error),

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    #[diagnostic(code(boundary::frame_too_large))]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Boundary channel closed")]
    #[diagnostic(
        code(boundary::closed),
        help("The module boundary was unloaded or its process exited.")
    )]
    Closed,

    #[error("Boundary teardown failed: {0}")]
    #[diagnostic(code(boundary::teardown_failed))]
    Teardown(String),
}

impl From<BoundaryError> for ModuleError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::SpawnFailed(msg) => ModuleError::load(msg),
            BoundaryError::Closed => ModuleError::disconnected("module boundary is closed"),
            BoundaryError::Io(e) => ModuleError::disconnected(format!("boundary I/O failed: {}", e)),
            other => ModuleError::protocol(other.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(config::invalid),
        help("Renewal and poll intervals must be non-zero and not exceed the initial lease.")
    )]
    Invalid(String),

    #[error("Failed to read configuration file: {0}")]
    #[diagnostic(code(config::read_failed))]
    Read(String),

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse_failed))]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_error_survives_serialization() {
        let err = ModuleError::call("boom");
        let json = serde_json::to_string(&err).unwrap();
        let back: ModuleError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.kind(), FaultKind::Call);
    }

    #[test]
    fn test_closed_channel_maps_to_disconnected() {
        let err: ModuleError = BoundaryError::Closed.into();
        assert_eq!(err.kind(), FaultKind::Disconnected);
    }

    #[test]
    fn test_display_is_message_only() {
        let err = ModuleError::not_interface("RectangleEffect");
        assert_eq!(
            err.to_string(),
            "'RectangleEffect' is not a capability interface"
        );
    }
}
