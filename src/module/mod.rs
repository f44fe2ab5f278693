/*!
 * Module Side
 *
 * Everything that runs inside a boundary: the registry a module package
 * declares, the host that loads and instantiates it, the object table that
 * owns live objects, and the server loop that answers the host.
 */

pub mod dispatch;
pub mod host;
pub mod objects;
pub mod registry;
pub mod server;

pub use host::ModuleHost;
pub use objects::{ObjectSlot, ObjectTable, PinGuard};
pub use registry::{ModuleObject, ModuleRegistry, ModuleType, Resource, TypeDescriptor};
pub use server::{serve, ModuleServer};
