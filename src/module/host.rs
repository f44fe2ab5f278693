/*!
 * Module Host
 *
 * Runs inside a boundary: loads the package, answers capability-indexed
 * discovery, instantiates types and hands out object ids. Raw module objects
 * and type descriptors never leave it; only names, ids and bytes do.
 */

use super::objects::ObjectTable;
use super::registry::ModuleRegistry;
use crate::boundary::{Invocation, Outcome, PackageSettings};
use crate::capability::{Capability, CapabilitySet};
use crate::core::errors::{ModuleError, ModuleResult};
use crate::core::types::ObjectId;
use crate::interception::ProxySynthesizer;
use crate::lease::LeaseTerms;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolve a wire interface name, rejecting anything that is not one
pub fn parse_capability(name: &str) -> ModuleResult<Capability> {
    Capability::parse(name).ok_or_else(|| ModuleError::not_interface(name))
}

pub struct ModuleHost {
    registry: ModuleRegistry,
    /// Whether this host owns its process and may change its working directory
    isolated: bool,
    package: Option<PathBuf>,
    settings: PackageSettings,
    terms: LeaseTerms,
    objects: Arc<ObjectTable>,
    synthesizer: ProxySynthesizer,
}

impl ModuleHost {
    pub fn new(registry: ModuleRegistry, isolated: bool) -> Self {
        Self {
            registry,
            isolated,
            package: None,
            settings: PackageSettings::default(),
            terms: LeaseTerms::default(),
            objects: Arc::new(ObjectTable::new()),
            synthesizer: ProxySynthesizer::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.registry.name()
    }

    pub fn objects(&self) -> &Arc<ObjectTable> {
        &self.objects
    }

    pub fn is_loaded(&self) -> bool {
        self.package.is_some()
    }

    /// Settings from the package's configuration file
    pub fn settings(&self) -> &PackageSettings {
        &self.settings
    }

    /// Load the package and make its directory the working context
    pub fn load(
        &mut self,
        package: &Path,
        settings: PackageSettings,
        terms: LeaseTerms,
    ) -> ModuleResult<usize> {
        if !package.is_file() {
            return Err(ModuleError::load(format!(
                "module package not found: {}",
                package.display()
            )));
        }

        if self.isolated {
            if let Some(dir) = package.parent() {
                std::env::set_current_dir(dir).map_err(|e| {
                    ModuleError::load(format!(
                        "cannot enter package directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }

        self.package = Some(package.to_path_buf());
        self.settings = settings;
        self.terms = terms;

        let discoverable = self
            .registry
            .types()
            .iter()
            .filter(|t| t.is_discoverable())
            .count();
        info!(
            module = %self.registry.name(),
            package = %package.display(),
            types = discoverable,
            resources = self.registry.resources().len(),
            settings = self.settings.len(),
            "Module loaded"
        );
        Ok(discoverable)
    }

    fn ensure_loaded(&self) -> ModuleResult<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(ModuleError::load(format!(
                "module '{}' has not been loaded",
                self.registry.name()
            )))
        }
    }

    /// Names of exported concrete types implementing `capability`
    pub fn get_types(&self, capability: &str) -> ModuleResult<Vec<String>> {
        self.ensure_loaded()?;
        let capability = parse_capability(capability)?;
        Ok(self
            .registry
            .types()
            .iter()
            .filter(|t| t.is_discoverable() && t.capabilities().contains(capability))
            .map(|t| t.name().to_string())
            .collect())
    }

    /// True if any exported concrete type implements any of `capabilities`
    pub fn has_any_capability(&self, capabilities: &[String]) -> ModuleResult<bool> {
        self.ensure_loaded()?;
        let wanted = capabilities
            .iter()
            .map(|name| parse_capability(name))
            .collect::<ModuleResult<CapabilitySet>>()?;
        Ok(self
            .registry
            .types()
            .iter()
            .any(|t| t.is_discoverable() && t.capabilities().intersects(&wanted)))
    }

    /// Instantiate `type_name` and record it under a new object id
    pub fn create(
        &self,
        type_name: &str,
        primary: &str,
        optional: &[String],
    ) -> ModuleResult<(ObjectId, CapabilitySet, LeaseTerms)> {
        self.ensure_loaded()?;
        let primary = parse_capability(primary)?;
        let optional = optional
            .iter()
            .map(|name| parse_capability(name))
            .collect::<ModuleResult<Vec<Capability>>>()?;

        let descriptor = self.registry.find(type_name).ok_or_else(|| {
            ModuleError::load(format!(
                "type '{}' not found in module '{}'",
                type_name,
                self.registry.name()
            ))
        })?;
        if !descriptor.capabilities().contains(primary) {
            return Err(ModuleError::capability_mismatch(format!(
                "type '{}' does not implement '{}'",
                type_name, primary
            )));
        }

        let mut object = descriptor.instantiate().ok_or_else(|| {
            ModuleError::load(format!("type '{}' cannot be instantiated", type_name))
        })?;
        object.configure(&self.settings);
        let exposed = ProxySynthesizer::exposed_set(object.as_mut(), primary, &optional)
            .map_err(|e| ModuleError::capability_mismatch(format!("type '{}': {}", type_name, e)))?;

        let id = self.objects.insert(type_name, object, exposed, self.terms);
        debug!(
            module = %self.registry.name(),
            object = %id,
            type_name,
            capabilities = ?exposed,
            "Created module object"
        );
        Ok((id, exposed, self.terms))
    }

    /// First embedded resource whose full name ends with `name`
    pub fn resource(&self, name: &str) -> ModuleResult<Vec<u8>> {
        self.ensure_loaded()?;
        if name.is_empty() {
            return Err(ModuleError::resource("resource name is empty"));
        }
        self.registry
            .resources()
            .iter()
            .find(|r| r.name.ends_with(name))
            .map(|r| r.bytes.clone())
            .ok_or_else(|| {
                ModuleError::resource(format!(
                    "resource '{}' not found in module '{}'",
                    name,
                    self.registry.name()
                ))
            })
    }

    /// Call a method on a live object through the interception chain
    pub fn invoke(&self, object: ObjectId, invocation: &Invocation) -> ModuleResult<Outcome> {
        let slot = self.objects.get(object).ok_or_else(|| {
            ModuleError::disconnected(format!("{} is no longer alive in its boundary", object))
        })?;
        self.synthesizer.proxy(object, slot).invoke(invocation)
    }
}
