/*!
 * Shared fixtures for integration tests
 * Statically linked test modules and package directories
 */

#![allow(dead_code)]

use snip_modules::capability::{
    DrawCommand, Effect, PointerAware, PointerEvent, Rect, SelectionBearing, Surface, Color,
};
use snip_modules::{
    Capability, LeaseTerms, ModuleConfig, ModuleError, ModuleManager, ModuleObject,
    ModuleRegistry, ModuleType, PackageSettings, StaticLauncher,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Draws the surface outline
pub struct Frame {
    width: u32,
}

impl ModuleObject for Frame {
    fn configure(&mut self, settings: &PackageSettings) {
        if let Some(width) = settings.get("frame_width").and_then(|w| w.parse().ok()) {
            self.width = width;
        }
    }

    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }
}

impl Effect for Frame {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        surface.draw(DrawCommand::Rectangle {
            rect: surface.bounds,
            color: Color::BLACK,
            width: self.width,
        });
        Ok(())
    }
}

impl ModuleType for Frame {
    const TYPE_NAME: &'static str = "shapes.Frame";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect];

    fn create() -> Self {
        Frame { width: 1 }
    }
}

/// Effect that also carries a selection
pub struct Lasso;

impl ModuleObject for Lasso {
    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_selection(&mut self) -> Option<&mut dyn SelectionBearing> {
        Some(self)
    }
}

impl Effect for Lasso {
    fn apply(&mut self, _surface: &mut Surface) -> anyhow::Result<()> {
        Ok(())
    }
}

impl SelectionBearing for Lasso {
    fn selection(&mut self) -> anyhow::Result<Rect> {
        Ok(Rect::new(5, 5, 50, 20))
    }
}

impl ModuleType for Lasso {
    const TYPE_NAME: &'static str = "shapes.Lasso";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect, Capability::SelectionBearing];

    fn create() -> Self {
        Lasso
    }
}

/// Fails in every way a module can fail
pub struct Smudge;

impl ModuleObject for Smudge {
    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        Some(self)
    }
}

impl Effect for Smudge {
    fn apply(&mut self, _surface: &mut Surface) -> anyhow::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "ink ran out").into())
    }
}

impl PointerAware for Smudge {
    fn pointer_down(&mut self, _event: PointerEvent) -> anyhow::Result<()> {
        Err(ModuleError::resource("cursor image missing").into())
    }

    fn pointer_move(&mut self, _event: PointerEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn pointer_up(&mut self, _event: PointerEvent) -> anyhow::Result<()> {
        panic!("smudge tool crashed")
    }
}

impl ModuleType for Smudge {
    const TYPE_NAME: &'static str = "shapes.Smudge";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect, Capability::PointerAware];

    fn create() -> Self {
        Smudge
    }
}

pub fn shapes_registry() -> ModuleRegistry {
    ModuleRegistry::new("shapes")
        .export::<Frame>()
        .export::<Lasso>()
        .export::<Smudge>()
        .resource("Icons.Frame.png", b"\x89PNG frame".to_vec())
        .resource("Icons.Foo.png", b"\x89PNG foo".to_vec())
}

/// A module whose only concrete type is internal
pub fn hidden_registry() -> ModuleRegistry {
    ModuleRegistry::new("hidden")
        .internal::<Frame>()
        .declare_abstract("hidden.Shape", &[Capability::Effect])
}

pub fn launcher() -> Arc<StaticLauncher> {
    Arc::new(
        StaticLauncher::new()
            .with_module("shapes", shapes_registry)
            .with_module("hidden", hidden_registry),
    )
}

/// Lease timings long enough that only explicit checkpoints matter
pub fn test_config() -> ModuleConfig {
    ModuleConfig::default()
        .with_lease(LeaseTerms {
            initial: Duration::from_secs(60),
            renew_on_call: Duration::from_secs(12),
            sponsorship_timeout: Duration::from_secs(60),
        })
        .with_sponsor_renewal(Duration::from_secs(12))
        .with_poll_interval(Duration::from_secs(60))
}

pub fn manager() -> ModuleManager {
    ModuleManager::with_launcher(test_config(), launcher())
}

/// Temp directory holding one empty package file per stem
pub fn package_dir(stems: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for stem in stems {
        touch(&dir.path().join(format!("{}.module", stem)));
    }
    dir
}

pub fn touch(path: &Path) {
    std::fs::write(path, b"").expect("write package");
}

/// Manager with the `shapes` module loaded
pub fn loaded_shapes() -> (TempDir, ModuleManager) {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);
    (dir, manager)
}
