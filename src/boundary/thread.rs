/*!
 * Thread Boundary
 *
 * Runs a statically linked module on a dedicated thread, speaking the same
 * framed protocol as a process boundary over in-process channels. Teardown
 * cannot kill a thread: it closes the channel, and a module stuck in a call
 * is left to finish on its own while every proxy already fails.
 */

use super::connection::Connection;
use super::framing::channel_pair;
use super::package::ModulePackage;
use super::protocol::Request;
use super::{Boundary, BoundaryLauncher};
use crate::config::ModuleConfig;
use crate::core::errors::BoundaryError;
use crate::module::{ModuleRegistry, ModuleServer};
use ahash::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Builds the registry of a statically linked module
pub type RegistryFactory = Arc<dyn Fn() -> ModuleRegistry + Send + Sync>;

/// Launches packages whose stem names a statically registered module
///
/// The package file only marks the module's presence in the directory.
#[derive(Default, Clone)]
pub struct StaticLauncher {
    modules: HashMap<String, RegistryFactory>,
}

impl StaticLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<F>(mut self, stem: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> ModuleRegistry + Send + Sync + 'static,
    {
        self.modules.insert(stem.into(), Arc::new(factory));
        self
    }
}

impl BoundaryLauncher for StaticLauncher {
    fn launch(
        &self,
        name: &str,
        package: &ModulePackage,
        _config: &ModuleConfig,
    ) -> Result<Box<dyn Boundary>, BoundaryError> {
        let factory = self.modules.get(package.stem()).ok_or_else(|| {
            BoundaryError::SpawnFailed(format!("no static module named '{}'", package.stem()))
        })?;
        Ok(Box::new(ThreadBoundary::spawn(name, factory())?))
    }
}

pub struct ThreadBoundary {
    name: String,
    connection: Arc<Connection>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadBoundary {
    pub fn spawn(name: &str, registry: ModuleRegistry) -> Result<Self, BoundaryError> {
        let ((host_tx, host_rx), (module_tx, module_rx)) = channel_pair();
        let server = ModuleServer::new(registry, false);

        let boundary = name.to_string();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if let Err(e) = server.run(Box::new(module_rx), Box::new(module_tx)) {
                    warn!(boundary = %boundary, error = %e, "Module server stopped with error");
                }
            })?;

        let connection = Connection::open(name, Box::new(host_rx), Box::new(host_tx))?;
        debug!(boundary = %name, "Started thread boundary");

        Ok(Self {
            name: name.to_string(),
            connection,
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl Boundary for ThreadBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn is_alive(&self) -> bool {
        !self.connection.is_closed()
            && self
                .worker
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    fn teardown(&self, grace: Duration) -> Result<(), BoundaryError> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };

        let _ = self.connection.notify(Request::Shutdown);
        self.connection.close();

        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            handle
                .join()
                .map_err(|_| BoundaryError::Teardown(format!("{} panicked", self.name)))
        } else {
            Err(BoundaryError::Teardown(format!(
                "{} did not stop within {:?}; detaching",
                self.name, grace
            )))
        }
    }
}

impl Drop for ThreadBoundary {
    fn drop(&mut self) {
        self.connection.close();
    }
}
