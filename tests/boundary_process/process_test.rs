/*!
 * Process Boundary Tests
 * The basic effects package loaded into its own child process
 */

use pretty_assertions::assert_eq;
use snip_modules::capability::{
    DrawCommand, Effect, EffectContext, InvalidationEmitting, PointerAware, PointerButton,
    PointerEvent, Rect, ScreenshotCapturing, SelectionBearing, Surface,
};
use snip_modules::{Capability, FaultKind, ModuleCatalog, ModuleConfig, ModuleError, ModuleManager};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const MODULE_BIN: &str = env!("CARGO_BIN_EXE_basic-effects-module");

fn package_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(MODULE_BIN, dir.path().join("basic_effects.module")).unwrap();
    dir
}

fn config() -> ModuleConfig {
    ModuleConfig::default().with_poll_interval(Duration::from_secs(60))
}

fn load(dir: &Path, config: ModuleConfig) -> ModuleManager {
    let mut manager = ModuleManager::new(config);
    assert_eq!(manager.load_from(dir, &[Capability::Effect]), 1);
    manager
}

fn left(x: i32, y: i32) -> PointerEvent {
    PointerEvent::new(PointerButton::Left, x, y)
}

#[test]
fn test_discovery_across_the_process_boundary() {
    let dir = package_dir();
    let manager = load(dir.path(), config());

    assert_eq!(
        manager.get_types::<dyn SelectionBearing>(),
        vec!["basic_effects.SelectionEffect".to_string()]
    );

    let effects = manager.get_types::<dyn Effect>();
    assert!(effects.contains(&"basic_effects.RectangleEffect".to_string()));
    assert!(!effects.contains(&"basic_effects.ShapeEffect".to_string()));
    assert!(!effects.contains(&"basic_effects.GuideEffect".to_string()));
}

#[test]
fn test_drawing_with_a_remote_rectangle() {
    let dir = package_dir();
    let manager = load(dir.path(), config());
    let host = &manager.hosts()[0];

    let mut rect = host
        .create::<dyn Effect>(
            "basic_effects.RectangleEffect",
            &[Capability::PointerAware, Capability::InvalidationEmitting],
        )
        .unwrap();

    let mut pointer = rect.cast::<dyn PointerAware>().unwrap();
    pointer.pointer_down(left(10, 10)).unwrap();
    pointer.pointer_move(left(20, 20)).unwrap();
    pointer.pointer_up(left(40, 30)).unwrap();

    let mut surface = Surface::new(Rect::new(0, 0, 100, 100));
    rect.apply(&mut surface).unwrap();
    match &surface.commands[..] {
        [DrawCommand::Rectangle { rect, .. }] => assert_eq!(*rect, Rect::new(10, 10, 30, 20)),
        other => panic!("unexpected commands: {:?}", other),
    }

    let mut events = rect.cast::<dyn InvalidationEmitting>().unwrap();
    assert_eq!(events.take_invalidations().unwrap().len(), 2);
    assert!(events.take_invalidations().unwrap().is_empty());
}

#[test]
fn test_module_failures_cross_as_module_errors() {
    let dir = package_dir();
    let manager = load(dir.path(), config());
    let host = &manager.hosts()[0];

    let mut shot = host
        .create::<dyn Effect>(
            "basic_effects.ScreenshotEffect",
            &[Capability::ScreenshotCapturing],
        )
        .unwrap();

    let err = shot.apply(&mut Surface::default()).unwrap_err();
    let err = err.downcast_ref::<ModuleError>().unwrap();
    assert_eq!(err.kind(), FaultKind::Call);
    assert!(err.message().contains("screen has not been captured"));

    let mut capture = shot.cast::<dyn ScreenshotCapturing>().unwrap();
    let mut context = EffectContext::new(Rect::new(0, 0, 8, 6));
    capture.capture_screen(&mut context).unwrap();
    assert_eq!(context.screenshot().map(|i| (i.width, i.height)), Some((8, 6)));

    shot.apply(&mut Surface::default()).unwrap();
}

#[test]
fn test_icons_resolve_by_suffix() {
    let dir = package_dir();
    let manager = load(dir.path(), config());
    let host = &manager.hosts()[0];

    let mut bytes = Vec::new();
    host.resource_stream("RectangleEffect.png")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));

    let err = host.resource_stream("Bar.png").unwrap_err();
    assert_eq!(err.kind(), FaultKind::Resource);

    let catalog = ModuleCatalog::build(host).unwrap();
    let line = catalog
        .effects
        .iter()
        .find(|e| e.display_name() == "LineEffect")
        .unwrap();
    assert!(line.icon().is_none());
    assert_eq!(catalog.snapshot().export_actions, vec!["basic_effects.SaveToFileExport"]);
}

#[test]
fn test_package_config_reaches_the_module() {
    let dir = package_dir();
    std::fs::write(
        dir.path().join("basic_effects.module.config"),
        br#"{ "stroke_width": "7" }"#,
    )
    .unwrap();
    let manager = load(dir.path(), config());
    let host = &manager.hosts()[0];

    let line = host
        .create::<dyn Effect>("basic_effects.LineEffect", &[Capability::PointerAware])
        .unwrap();
    let mut pointer = line.cast::<dyn PointerAware>().unwrap();
    pointer.pointer_down(left(0, 0)).unwrap();
    pointer.pointer_up(left(5, 5)).unwrap();

    let mut effect = line;
    let mut surface = Surface::default();
    effect.apply(&mut surface).unwrap();
    match &surface.commands[..] {
        [DrawCommand::Line { width, .. }] => assert_eq!(*width, 7),
        other => panic!("unexpected commands: {:?}", other),
    }
}

#[test]
fn test_unload_kills_the_process() {
    let dir = package_dir();
    let mut manager = load(dir.path(), config());
    let host = manager.hosts()[0].clone();
    let mut arrow = host
        .create::<dyn Effect>("basic_effects.ArrowEffect", &[])
        .unwrap();
    assert!(host.is_alive());

    manager.unload_module(&host).unwrap();
    assert!(!host.is_alive());

    let err = arrow.apply(&mut Surface::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ModuleError>().map(|e| e.kind()),
        Some(FaultKind::Disconnected)
    );
}

#[test]
fn test_shadow_copied_package_loads() {
    let dir = package_dir();
    let manager = load(dir.path(), config().with_shadow_copy(true));
    assert_eq!(manager.get_types::<dyn SelectionBearing>().len(), 1);
}
