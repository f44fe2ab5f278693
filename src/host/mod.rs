/*!
 * Host Side
 *
 * Everything the application process uses to talk to module boundaries:
 * the manager that discovers and owns them, per-boundary handles, typed
 * proxies and the editor-facing catalog.
 */

pub mod catalog;
pub mod manager;
pub mod proxy;
pub mod remote;

pub use catalog::{CatalogEntry, ModuleCatalog};
pub use manager::ModuleManager;
pub use proxy::{Proxy, RemoteObject};
pub use remote::RemoteHost;
