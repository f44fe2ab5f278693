/*!
 * Snip Modules Library
 *
 * Module isolation and lifetime subsystem for a capture and annotation
 * editor. Effect and export plug-ins are discovered by capability, each
 * package runs in its own boundary, and the objects it hands out stay
 * alive exactly as long as the host holds a reference to them.
 */

pub mod boundary;
pub mod capability;
pub mod config;
pub mod core;
pub mod host;
pub mod interception;
pub mod lease;
pub mod module;
pub mod monitoring;

// Re-exports
pub use boundary::{
    Boundary, BoundaryLauncher, ModulePackage, PackageSettings, ProcessBoundary, ProcessLauncher,
    StaticLauncher, ThreadBoundary,
};
pub use capability::{Capability, CapabilitySet, Interface};
pub use config::ModuleConfig;
pub use core::errors::{BoundaryError, ConfigError, FaultKind, ModuleError, ModuleResult};
pub use host::{CatalogEntry, ModuleCatalog, ModuleManager, Proxy, RemoteHost, RemoteObject};
pub use interception::{ExceptionTranslation, Interceptor, Pinning, ProxySynthesizer};
pub use lease::{Lease, LeaseHolder, LeaseSponsor, LeaseTerms, LifetimeManager, Sponsor};
pub use module::{serve, ModuleHost, ModuleObject, ModuleRegistry, ModuleType};
pub use monitoring::{init_module_tracing, init_tracing};
