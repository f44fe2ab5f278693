/*!
 * Remote Host
 *
 * The host-side handle of one boundary: the channel to its module host, the
 * lease table for every object it handed out, and the teardown path. Each
 * call here is one request across the boundary.
 */

use super::proxy::{capability_names, parse_exposed, Proxy, RemoteObject};
use crate::boundary::{Boundary, BoundaryLauncher, Connection, ModulePackage, Request, Response};
use crate::capability::{Capability, Interface};
use crate::config::ModuleConfig;
use crate::core::errors::{BoundaryError, ModuleError, ModuleResult};
use crate::core::types::HostId;
use crate::lease::{Lease, LeaseRenewer, LifetimeManager, Sponsor};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Forwards renewal decisions to the boundary that owns the object
struct BoundaryRenewer {
    connection: Arc<Connection>,
}

impl LeaseRenewer for BoundaryRenewer {
    fn renewed(&self, lease: &Lease, grant: Duration) -> bool {
        trace!(lease = %lease.id(), object = %lease.object(), "Forwarding renewal");
        let request = Request::Renew {
            object: lease.object(),
            lease_time: grant,
        };
        match self.connection.call(request) {
            Ok(Response::Ack) => true,
            Ok(Response::Failed(err)) => {
                debug!(lease = %lease.id(), object = %lease.object(), error = %err, "Boundary refused renewal");
                false
            }
            Ok(other) => {
                warn!(lease = %lease.id(), reply = ?other, "Unexpected reply to renewal");
                false
            }
            Err(BoundaryError::Closed) => {
                debug!(lease = %lease.id(), "Boundary closed before renewal");
                false
            }
            Err(e) => {
                warn!(lease = %lease.id(), object = %lease.object(), error = %e, "Failed to forward renewal");
                false
            }
        }
    }

    fn expired(&self, lease: &Lease) {
        let release = Request::Release {
            object: lease.object(),
        };
        match self.connection.notify(release) {
            Ok(()) => {}
            Err(BoundaryError::Closed) => {
                trace!(lease = %lease.id(), "Boundary closed, release skipped");
            }
            Err(e) => {
                warn!(lease = %lease.id(), object = %lease.object(), error = %e, "Failed to release expired object");
            }
        }
    }
}

pub struct RemoteHost {
    id: HostId,
    name: String,
    package: ModulePackage,
    boundary: Box<dyn Boundary>,
    lifetime: Arc<LifetimeManager>,
    sponsor: Arc<Sponsor>,
    module: Mutex<Option<String>>,
}

impl RemoteHost {
    /// Start a boundary for `package` and attach a lifetime manager to it
    pub fn launch(
        id: HostId,
        name: &str,
        package: ModulePackage,
        launcher: &dyn BoundaryLauncher,
        config: &ModuleConfig,
        sponsor: Arc<Sponsor>,
    ) -> Result<Self, BoundaryError> {
        let boundary = launcher.launch(name, &package, config)?;
        let renewer = Arc::new(BoundaryRenewer {
            connection: boundary.connection().clone(),
        });
        let lifetime = LifetimeManager::new(name, renewer);
        lifetime.start(config.poll_interval);

        info!(host = %id, boundary = %name, package = %package.path().display(), "Boundary launched");
        Ok(Self {
            id,
            name: name.to_string(),
            package,
            boundary,
            lifetime,
            sponsor,
            module: Mutex::new(None),
        })
    }

    #[inline]
    pub fn id(&self) -> HostId {
        self.id
    }

    /// Boundary name, `module-boundary-<n>-<stem>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &ModulePackage {
        &self.package
    }

    pub fn package_path(&self) -> &Path {
        self.package.path()
    }

    /// Module name reported at load time
    pub fn module_name(&self) -> Option<String> {
        self.module.lock().clone()
    }

    pub fn lifetime(&self) -> &Arc<LifetimeManager> {
        &self.lifetime
    }

    pub fn sponsor(&self) -> &Arc<Sponsor> {
        &self.sponsor
    }

    pub fn is_alive(&self) -> bool {
        self.boundary.is_alive()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.boundary.connection()
    }

    fn request(&self, request: Request) -> ModuleResult<Response> {
        match self.connection().call(request) {
            Ok(Response::Failed(err)) => Err(err),
            Ok(response) => Ok(response),
            Err(BoundaryError::Closed) => Err(ModuleError::disconnected(format!(
                "boundary {} has been unloaded",
                self.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the package inside the boundary; returns the discoverable type count
    pub fn load(&self, config: &ModuleConfig) -> ModuleResult<usize> {
        match self.request(Request::Load {
            package: self.package.path().to_path_buf(),
            settings: self.package.settings().clone(),
            lease: config.lease,
        })? {
            Response::Loaded { module, types } => {
                debug!(boundary = %self.name, module = %module, types, "Package loaded");
                *self.module.lock() = Some(module);
                Ok(types)
            }
            other => Err(unexpected("load", other)),
        }
    }

    /// Exported concrete types implementing `I`
    pub fn get_types<I: ?Sized + Interface>(&self) -> ModuleResult<Vec<String>> {
        self.get_types_for(I::CAPABILITY)
    }

    pub fn get_types_for(&self, capability: Capability) -> ModuleResult<Vec<String>> {
        match self.request(Request::GetTypes {
            capability: capability.name().to_string(),
        })? {
            Response::Types(types) => Ok(types),
            other => Err(unexpected("get_types", other)),
        }
    }

    pub fn has_any_capability(&self, capabilities: &[Capability]) -> ModuleResult<bool> {
        match self.request(Request::HasAnyCapability {
            capabilities: capability_names(capabilities),
        })? {
            Response::Bool(found) => Ok(found),
            other => Err(unexpected("has_any_capability", other)),
        }
    }

    /// Instantiate `type_name` by wire interface names
    ///
    /// Names that are not interfaces are rejected by the boundary. The
    /// object is not sponsored; callers holding it past its initial lease
    /// must register it themselves.
    pub fn create_raw(
        &self,
        type_name: &str,
        primary: &str,
        optional: &[&str],
    ) -> ModuleResult<Arc<RemoteObject>> {
        let (object, capabilities, lease) = match self.request(Request::Create {
            type_name: type_name.to_string(),
            primary: primary.to_string(),
            optional: optional.iter().map(|name| name.to_string()).collect(),
        })? {
            Response::Created {
                object,
                capabilities,
                lease,
            } => (object, capabilities, lease),
            other => return Err(unexpected("create", other)),
        };

        let exposed = parse_exposed(&capabilities)?;
        let lease = self.lifetime.issue(object, lease);
        Ok(Arc::new(RemoteObject::new(
            object,
            type_name.to_string(),
            exposed,
            self.connection().clone(),
            lease,
            Arc::downgrade(&self.lifetime),
        )))
    }

    /// Instantiate `type_name` as capability `I`, sponsored for as long as
    /// any clone of the proxy is alive
    pub fn create<I: ?Sized + Interface>(
        &self,
        type_name: &str,
        optional: &[Capability],
    ) -> ModuleResult<Proxy<I>> {
        let optional: Vec<&str> = optional.iter().map(|cap| cap.name()).collect();
        let remote = self.create_raw(type_name, I::CAPABILITY.name(), &optional)?;
        let proxy = Proxy::new(remote);
        self.sponsor.register(&proxy);
        Ok(proxy)
    }

    /// Embedded resource whose name ends with `name`
    pub fn resource_stream(&self, name: &str) -> ModuleResult<Cursor<Vec<u8>>> {
        match self.request(Request::GetResource {
            name: name.to_string(),
        })? {
            Response::Resource(bytes) => Ok(Cursor::new(bytes)),
            other => Err(unexpected("get_resource", other)),
        }
    }

    /// Destroy the boundary; every proxy into it fails from here on
    pub fn teardown(&self, grace: Duration) -> Result<(), BoundaryError> {
        self.lifetime.shutdown();
        let result = self.boundary.teardown(grace);
        self.connection().close();
        info!(host = %self.id, boundary = %self.name, "Boundary torn down");
        result
    }
}

fn unexpected(operation: &str, response: Response) -> ModuleError {
    ModuleError::protocol(format!("unexpected reply to {}: {:?}", operation, response))
}

impl Drop for RemoteHost {
    fn drop(&mut self) {
        self.lifetime.shutdown();
        self.connection().close();
    }
}

impl std::fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHost")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("package", &self.package.path())
            .field("leases", &self.lifetime.len())
            .finish()
    }
}
