/*!
 * Module Catalog
 *
 * What an editor shows for one loaded module: drawable effects, selection
 * and screenshot tools and export actions, each with a display name and an
 * optional icon taken from the module's embedded resources.
 */

use super::proxy::Proxy;
use super::remote::RemoteHost;
use crate::capability::{
    Capability, CatalogSnapshot, Effect, ExportAction, Interface, ScreenshotCapturing,
    SelectionBearing,
};
use crate::core::errors::ModuleResult;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Optional capabilities requested for every catalog instance
pub const STANDARD_OPTIONAL: [Capability; 3] = [
    Capability::Effect,
    Capability::PointerAware,
    Capability::Editable,
];

/// One creatable type, viewed as capability `I`
pub struct CatalogEntry<I: ?Sized + Interface> {
    type_name: String,
    display_name: String,
    icon: Option<Vec<u8>>,
    host: Arc<RemoteHost>,
    _interface: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized + Interface> CatalogEntry<I> {
    fn new(host: &Arc<RemoteHost>, type_name: String) -> Self {
        let display_name = display_name(&type_name).to_string();
        let icon = load_icon(host, &display_name);
        Self {
            type_name,
            display_name,
            icon,
            host: host.clone(),
            _interface: PhantomData,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// PNG bytes, if the module ships an icon for this type
    pub fn icon(&self) -> Option<&[u8]> {
        self.icon.as_deref()
    }

    /// New sponsored instance with the standard optional capabilities
    pub fn create(&self) -> ModuleResult<Proxy<I>> {
        self.host.create::<I>(&self.type_name, &STANDARD_OPTIONAL)
    }
}

impl<I: ?Sized + Interface> std::fmt::Debug for CatalogEntry<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("type_name", &self.type_name)
            .field("display_name", &self.display_name)
            .field("icon_bytes", &self.icon.as_ref().map(Vec::len))
            .finish()
    }
}

/// Last `.`-separated segment of a type name
pub fn display_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

fn load_icon(host: &RemoteHost, display_name: &str) -> Option<Vec<u8>> {
    let resource = format!("{}.png", display_name);
    match host.resource_stream(&resource) {
        Ok(stream) => Some(stream.into_inner()),
        Err(e) => {
            debug!(boundary = %host.name(), resource = %resource, error = %e, "No icon");
            None
        }
    }
}

#[derive(Debug)]
pub struct ModuleCatalog {
    module: String,
    pub effects: Vec<CatalogEntry<dyn Effect>>,
    pub selections: Vec<CatalogEntry<dyn SelectionBearing>>,
    pub screenshots: Vec<CatalogEntry<dyn ScreenshotCapturing>>,
    pub export_actions: Vec<CatalogEntry<dyn ExportAction>>,
}

impl ModuleCatalog {
    /// Query `host` for every catalog category
    ///
    /// Selection and screenshot tools are effects too, but are listed only
    /// in their own category.
    pub fn build(host: &Arc<RemoteHost>) -> ModuleResult<Self> {
        let selections = host.get_types::<dyn SelectionBearing>()?;
        let screenshots = host.get_types::<dyn ScreenshotCapturing>()?;
        let effects: Vec<String> = host
            .get_types::<dyn Effect>()?
            .into_iter()
            .filter(|name| !selections.contains(name) && !screenshots.contains(name))
            .collect();
        let export_actions = host.get_types::<dyn ExportAction>()?;

        let catalog = Self {
            module: host
                .module_name()
                .unwrap_or_else(|| host.package().stem().to_string()),
            effects: entries(host, effects),
            selections: entries(host, selections),
            screenshots: entries(host, screenshots),
            export_actions: entries(host, export_actions),
        };
        debug!(
            boundary = %host.name(),
            effects = catalog.effects.len(),
            selections = catalog.selections.len(),
            screenshots = catalog.screenshots.len(),
            export_actions = catalog.export_actions.len(),
            "Catalog built"
        );
        Ok(catalog)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
            && self.selections.is_empty()
            && self.screenshots.is_empty()
            && self.export_actions.is_empty()
    }

    /// Serializable listing handed to editor managers
    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            module: self.module.clone(),
            effects: names(&self.effects),
            selections: names(&self.selections),
            screenshots: names(&self.screenshots),
            export_actions: names(&self.export_actions),
        }
    }
}

fn entries<I: ?Sized + Interface>(host: &Arc<RemoteHost>, types: Vec<String>) -> Vec<CatalogEntry<I>> {
    types
        .into_iter()
        .map(|type_name| CatalogEntry::new(host, type_name))
        .collect()
}

fn names<I: ?Sized + Interface>(entries: &[CatalogEntry<I>]) -> Vec<String> {
    entries.iter().map(|e| e.type_name.clone()).collect()
}
