/*!
 * Module Boundaries
 *
 * A boundary is an isolated execution context hosting one module package:
 * a child process by default, or a dedicated thread for statically linked
 * modules. Either way the host only ever talks to it through a framed
 * request/response channel, and tearing it down never takes the host with it.
 */

pub mod connection;
pub mod framing;
pub mod package;
pub mod process;
pub mod protocol;
pub mod thread;

pub use connection::Connection;
pub use package::{ModulePackage, PackageSettings};
pub use process::{ProcessBoundary, ProcessLauncher};
pub use protocol::{Envelope, Invocation, Outcome, Request, Response};
pub use thread::{RegistryFactory, StaticLauncher, ThreadBoundary};

use crate::config::ModuleConfig;
use crate::core::errors::BoundaryError;
use std::sync::Arc;
use std::time::Duration;

/// A live, independently destructible execution context
pub trait Boundary: Send + Sync {
    fn name(&self) -> &str;

    /// Channel to the module host running inside the boundary
    fn connection(&self) -> &Arc<Connection>;

    fn is_alive(&self) -> bool;

    /// Stop the boundary, waiting at most `grace` before forcing it
    ///
    /// Idempotent. Once this returns every call through the boundary fails.
    fn teardown(&self, grace: Duration) -> Result<(), BoundaryError>;
}

/// Decides how a package gets its boundary
pub trait BoundaryLauncher: Send + Sync {
    fn launch(
        &self,
        name: &str,
        package: &ModulePackage,
        config: &ModuleConfig,
    ) -> Result<Box<dyn Boundary>, BoundaryError>;
}
