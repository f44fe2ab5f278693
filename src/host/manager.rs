/*!
 * Module Manager
 *
 * Scans a directory for module packages, gives each one its own boundary,
 * keeps the boundaries that offer at least one wanted capability and
 * answers capability queries across all of them. Failures in one package
 * never stop the others from loading.
 */

use super::remote::RemoteHost;
use crate::boundary::{BoundaryLauncher, ModulePackage, ProcessLauncher};
use crate::capability::{Capability, Interface};
use crate::config::ModuleConfig;
use crate::core::errors::{ModuleError, ModuleResult};
use crate::core::types::{HostId, IdCounter};
use crate::lease::Sponsor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ModuleManager {
    config: ModuleConfig,
    launcher: Arc<dyn BoundaryLauncher>,
    sponsor: Arc<Sponsor>,
    hosts: Vec<Arc<RemoteHost>>,
    boundary_seq: IdCounter,
    host_ids: IdCounter,
    disposed: AtomicBool,
}

impl ModuleManager {
    /// Manager that runs every package in its own child process
    pub fn new(config: ModuleConfig) -> Self {
        Self::with_launcher(config, Arc::new(ProcessLauncher))
    }

    pub fn with_launcher(config: ModuleConfig, launcher: Arc<dyn BoundaryLauncher>) -> Self {
        let sponsor = Sponsor::with_renewal(config.sponsor_renewal);
        info!(
            sponsor = %sponsor.id(),
            renewal_ms = config.sponsor_renewal.as_millis() as u64,
            "Module manager created"
        );
        Self {
            config,
            launcher,
            sponsor,
            hosts: Vec::new(),
            boundary_seq: IdCounter::new(),
            host_ids: IdCounter::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Process-wide sponsor shared by every boundary
    pub fn sponsor(&self) -> &Arc<Sponsor> {
        &self.sponsor
    }

    pub fn hosts(&self) -> &[Arc<RemoteHost>] {
        &self.hosts
    }

    /// Load every package in `dir` offering any of `capabilities`
    ///
    /// Returns the number of boundaries kept. A missing directory loads
    /// nothing.
    pub fn load_from(&mut self, dir: impl AsRef<Path>, capabilities: &[Capability]) -> usize {
        let dir = dir.as_ref();
        if self.disposed.load(Ordering::Acquire) {
            warn!(dir = %dir.display(), "Module manager already disposed");
            return 0;
        }
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Module directory not found");
            return 0;
        }

        let packages = match self.scan(dir) {
            Ok(packages) => packages,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to scan module directory");
                return 0;
            }
        };

        let mut loaded = 0;
        for path in packages {
            match self.load_package(&path, capabilities) {
                Ok(Some(host)) => {
                    self.hosts.push(host);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(
                    package = %path.display(),
                    kind = %e.kind(),
                    error = %e,
                    "Failed to load module package"
                ),
            }
        }

        info!(dir = %dir.display(), loaded, total = self.hosts.len(), "Module directory loaded");
        loaded
    }

    /// Package files directly inside `dir`, in name order
    fn scan(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut packages: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == self.config.package_extension.as_str())
            })
            .collect();
        packages.sort();
        Ok(packages)
    }

    fn load_package(
        &self,
        path: &Path,
        capabilities: &[Capability],
    ) -> ModuleResult<Option<Arc<RemoteHost>>> {
        let package = ModulePackage::open(path)?;
        let name = format!(
            "module-boundary-{}-{}",
            self.boundary_seq.next(),
            package.stem()
        );

        let host = RemoteHost::launch(
            HostId(self.host_ids.next()),
            &name,
            package,
            self.launcher.as_ref(),
            &self.config,
            self.sponsor.clone(),
        )?;

        let offered = host
            .load(&self.config)
            .and_then(|_| host.has_any_capability(capabilities));
        match offered {
            Ok(true) => Ok(Some(Arc::new(host))),
            Ok(false) => {
                debug!(boundary = %name, "Package offers none of the wanted capabilities");
                self.discard(&host);
                Ok(None)
            }
            Err(e) => {
                self.discard(&host);
                Err(e)
            }
        }
    }

    fn discard(&self, host: &RemoteHost) {
        if let Err(e) = host.teardown(self.config.shutdown_grace) {
            warn!(boundary = %host.name(), error = %e, "Boundary teardown failed");
        }
    }

    /// Exported concrete types implementing `I`, across all boundaries
    ///
    /// Boundaries that fail to answer are skipped.
    pub fn get_types<I: ?Sized + Interface>(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for host in &self.hosts {
            match host.get_types::<I>() {
                Ok(found) => {
                    for name in found {
                        if !types.contains(&name) {
                            types.push(name);
                        }
                    }
                }
                Err(e) => warn!(boundary = %host.name(), error = %e, "Type query failed"),
            }
        }
        types
    }

    /// Boundary that exports `type_name`, if any
    pub fn host_for_type<I: ?Sized + Interface>(&self, type_name: &str) -> Option<&Arc<RemoteHost>> {
        self.hosts.iter().find(|host| {
            host.get_types::<I>()
                .is_ok_and(|types| types.iter().any(|t| t == type_name))
        })
    }

    /// Drop one boundary and everything living in it
    pub fn unload_module(&mut self, host: &RemoteHost) -> ModuleResult<()> {
        let position = self
            .hosts
            .iter()
            .position(|h| h.id() == host.id())
            .ok_or_else(|| {
                ModuleError::load(format!("{} is not managed here", host.name()))
            })?;
        let host = self.hosts.remove(position);
        self.discard(&host);
        info!(boundary = %host.name(), "Module unloaded");
        Ok(())
    }

    /// Tear down every boundary; idempotent
    pub fn dispose(&mut self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sponsor.unregister_all();
        for host in self.hosts.drain(..) {
            if let Err(e) = host.teardown(self.config.shutdown_grace) {
                warn!(boundary = %host.name(), error = %e, "Boundary teardown failed");
            }
        }
        info!("Module manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("hosts", &self.hosts.len())
            .field("sponsor", &self.sponsor)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
