/*!
 * Module Registry
 *
 * The type universe of one module package: which types exist, which of them
 * are exported and concrete, what capabilities each claims, plus embedded
 * resources. Read-only once the module is serving.
 */

use crate::boundary::PackageSettings;
use crate::capability::{
    Capability, CapabilitySet, Editable, EditorManager, Effect, ExportAction,
    InvalidationEmitting, PointerAware, ScreenshotCapturing, SelectionBearing,
};
use std::fmt;
use std::sync::Arc;

/// A module object as seen from inside its boundary
///
/// Each cast returns `Some` for every capability the object implements.
/// Only the casts are used to decide what a proxy may expose.
pub trait ModuleObject: Send {
    /// Receives the package settings right after instantiation
    fn configure(&mut self, _settings: &PackageSettings) {}

    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        None
    }

    fn as_editable(&mut self) -> Option<&mut dyn Editable> {
        None
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        None
    }

    fn as_selection(&mut self) -> Option<&mut dyn SelectionBearing> {
        None
    }

    fn as_screenshot(&mut self) -> Option<&mut dyn ScreenshotCapturing> {
        None
    }

    fn as_export_action(&mut self) -> Option<&mut dyn ExportAction> {
        None
    }

    fn as_invalidating(&mut self) -> Option<&mut dyn InvalidationEmitting> {
        None
    }

    fn as_editor_manager(&mut self) -> Option<&mut dyn EditorManager> {
        None
    }
}

/// Capabilities an instance can actually be cast to
pub fn implemented_capabilities(object: &mut dyn ModuleObject) -> CapabilitySet {
    let mut set = CapabilitySet::empty();
    for cap in Capability::ALL {
        let castable = match cap {
            Capability::Effect => object.as_effect().is_some(),
            Capability::Editable => object.as_editable().is_some(),
            Capability::PointerAware => object.as_pointer_aware().is_some(),
            Capability::SelectionBearing => object.as_selection().is_some(),
            Capability::ScreenshotCapturing => object.as_screenshot().is_some(),
            Capability::ExportAction => object.as_export_action().is_some(),
            Capability::InvalidationEmitting => object.as_invalidating().is_some(),
            Capability::EditorManager => object.as_editor_manager().is_some(),
        };
        if castable {
            set.insert(cap);
        }
    }
    set
}

/// A concrete type a module can instantiate
pub trait ModuleType: ModuleObject + Sized + 'static {
    /// Fully-qualified name, e.g. `basic_effects.RectangleEffect`
    const TYPE_NAME: &'static str;
    /// Declared capabilities; used for discovery
    const CAPABILITIES: &'static [Capability];

    fn create() -> Self;
}

pub type Factory = Arc<dyn Fn() -> Box<dyn ModuleObject> + Send + Sync>;

/// One type in a module's universe
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    capabilities: CapabilitySet,
    exported: bool,
    factory: Option<Factory>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    /// Visible to discovery: exported and concrete
    pub fn is_discoverable(&self) -> bool {
        self.exported && !self.is_abstract()
    }

    pub fn instantiate(&self) -> Option<Box<dyn ModuleObject>> {
        self.factory.as_ref().map(|factory| factory())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("exported", &self.exported)
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

/// Embedded resource with its fully-qualified name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    name: String,
    types: Vec<TypeDescriptor>,
    resources: Vec<Resource>,
}

impl ModuleRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an exported concrete type
    pub fn export<T: ModuleType>(self) -> Self {
        self.register::<T>(true)
    }

    /// Register a concrete type discovery never sees
    pub fn internal<T: ModuleType>(self) -> Self {
        self.register::<T>(false)
    }

    fn register<T: ModuleType>(mut self, exported: bool) -> Self {
        self.types.push(TypeDescriptor {
            name: T::TYPE_NAME.to_string(),
            capabilities: CapabilitySet::closure_of(T::CAPABILITIES),
            exported,
            factory: Some(Arc::new(|| Box::new(T::create()) as Box<dyn ModuleObject>)),
        });
        self
    }

    /// Declare an exported type that cannot be instantiated
    pub fn declare_abstract(mut self, name: impl Into<String>, capabilities: &[Capability]) -> Self {
        self.types.push(TypeDescriptor {
            name: name.into(),
            capabilities: CapabilitySet::closure_of(capabilities),
            exported: true,
            factory: None,
        });
        self
    }

    /// Embed a resource under `<module>.<name>`
    pub fn resource(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.push(Resource {
            name: format!("{}.{}", self.name, name),
            bytes: bytes.into(),
        });
        self
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Exported concrete type by fully-qualified name
    pub fn find(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|t| t.name == name && t.is_discoverable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Surface;

    struct Plain;

    impl ModuleObject for Plain {
        fn as_effect(&mut self) -> Option<&mut dyn Effect> {
            Some(self)
        }
    }

    impl Effect for Plain {
        fn apply(&mut self, _surface: &mut Surface) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl ModuleType for Plain {
        const TYPE_NAME: &'static str = "test.Plain";
        const CAPABILITIES: &'static [Capability] = &[Capability::Effect];

        fn create() -> Self {
            Plain
        }
    }

    #[test]
    fn test_internal_and_abstract_types_are_not_discoverable() {
        let registry = ModuleRegistry::new("test")
            .internal::<Plain>()
            .declare_abstract("test.Shape", &[Capability::Effect]);

        assert_eq!(registry.types().len(), 2);
        assert!(registry.find("test.Plain").is_none());
        assert!(registry.find("test.Shape").is_none());
        assert!(registry.types()[1].instantiate().is_none());
    }

    #[test]
    fn test_implemented_capabilities_follow_casts() {
        let mut object = Plain;
        let set = implemented_capabilities(&mut object);
        assert!(set.contains(Capability::Effect));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_resources_are_namespaced_by_module() {
        let registry = ModuleRegistry::new("shapes").resource("Icons.Box.png", vec![1, 2, 3]);
        assert_eq!(registry.resources()[0].name, "shapes.Icons.Box.png");
    }
}
