/*!
 * Proxy Tests
 * Exposed capability sets, error translation and calls after unload
 */

use crate::common::{loaded_shapes, package_dir, test_config};
use pretty_assertions::assert_eq;
use snip_modules::boundary::{Invocation, Outcome};
use snip_modules::capability::{
    ContextValue, Effect, EffectContext, ExportAction, ImageData, PointerAware, PointerButton,
    PointerEvent, Rect, ScreenshotCapturing, SelectionBearing, Surface,
};
use snip_modules::{
    Capability, CapabilitySet, FaultKind, ModuleError, ModuleManager, ModuleRegistry,
    StaticLauncher,
};
use std::io::Read;

fn module_error(err: &anyhow::Error) -> &ModuleError {
    err.downcast_ref::<ModuleError>()
        .expect("proxy errors are always ModuleError")
}

#[test]
fn test_proxy_exposes_only_primary_and_implemented_optionals() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];

    let lasso = host
        .create::<dyn Effect>(
            "shapes.Lasso",
            &[Capability::SelectionBearing, Capability::ExportAction],
        )
        .unwrap();

    let expected: CapabilitySet = [Capability::Effect, Capability::SelectionBearing]
        .into_iter()
        .collect();
    assert_eq!(lasso.capabilities(), expected);
    assert!(lasso.cast::<dyn ExportAction>().is_none());

    let mut selection = lasso.cast::<dyn SelectionBearing>().unwrap();
    assert_eq!(selection.selection().unwrap(), Rect::new(5, 5, 50, 20));
}

#[test]
fn test_unexposed_methods_are_refused() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];

    let lasso = host.create_raw("shapes.Lasso", "effect", &[]).unwrap();
    assert!(!lasso.capabilities().contains(Capability::SelectionBearing));

    let err = lasso.invoke(Invocation::Selection).unwrap_err();
    assert_eq!(err.kind(), FaultKind::CapabilityMismatch);

    let err = lasso
        .invoke(Invocation::Export {
            image: ImageData::blank(1, 1),
        })
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::CapabilityMismatch);
}

#[test]
fn test_primary_capability_must_be_implemented() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];

    let err = host
        .create::<dyn SelectionBearing>("shapes.Frame", &[])
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::CapabilityMismatch);
}

#[test]
fn test_non_interface_names_are_rejected() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];

    let err = host.create_raw("shapes.Frame", "shapes.Frame", &[]).unwrap_err();
    assert_eq!(err.kind(), FaultKind::NotInterface);

    let err = host
        .create_raw("shapes.Frame", "effect", &["Frame"])
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::NotInterface);
}

#[test]
fn test_foreign_errors_are_translated() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];
    let mut smudge = host.create::<dyn Effect>("shapes.Smudge", &[]).unwrap();

    let err = smudge.apply(&mut Surface::default()).unwrap_err();
    let err = module_error(&err);
    assert_eq!(err.kind(), FaultKind::Call);
    assert!(err.message().contains("ink ran out"), "{}", err.message());
}

#[test]
fn test_module_errors_pass_through_unchanged() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];
    let smudge = host
        .create::<dyn Effect>("shapes.Smudge", &[Capability::PointerAware])
        .unwrap();
    let mut pointer = smudge.cast::<dyn PointerAware>().unwrap();

    let err = pointer
        .pointer_down(PointerEvent::new(PointerButton::Left, 1, 1))
        .unwrap_err();
    assert_eq!(module_error(&err), &ModuleError::resource("cursor image missing"));
}

#[test]
fn test_panics_become_call_failures() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];
    let smudge = host
        .create::<dyn Effect>("shapes.Smudge", &[Capability::PointerAware])
        .unwrap();
    let mut pointer = smudge.cast::<dyn PointerAware>().unwrap();

    let err = pointer
        .pointer_up(PointerEvent::new(PointerButton::Left, 1, 1))
        .unwrap_err();
    let err = module_error(&err);
    assert_eq!(err.kind(), FaultKind::Call);
    assert!(err.message().contains("smudge tool crashed"));

    // The boundary survives the panic
    assert!(host.is_alive());
    pointer
        .pointer_move(PointerEvent::new(PointerButton::Left, 2, 2))
        .unwrap();
}

#[test]
fn test_calls_fail_after_unload() {
    let (_dir, mut manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    frame.apply(&mut Surface::default()).unwrap();

    manager.unload_module(&host).unwrap();
    assert!(manager.hosts().is_empty());
    assert!(!frame.is_alive());

    let err = frame.apply(&mut Surface::default()).unwrap_err();
    assert_eq!(module_error(&err).kind(), FaultKind::Disconnected);

    let err = host.get_types::<dyn Effect>().unwrap_err();
    assert_eq!(err.kind(), FaultKind::Disconnected);

    assert!(manager.unload_module(&host).is_err());
}

#[test]
fn test_resources_match_by_suffix() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];

    let mut bytes = Vec::new();
    host.resource_stream("Foo.png")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert_eq!(bytes, b"\x89PNG foo".to_vec());

    let err = host.resource_stream("Bar.png").unwrap_err();
    assert_eq!(err.kind(), FaultKind::Resource);
}

#[test]
fn test_proxy_clones_share_one_object() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];
    let frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let mut copy = frame.clone();

    assert_eq!(copy.id(), frame.id());
    drop(frame);
    let mut surface = Surface::new(Rect::new(0, 0, 4, 4));
    copy.apply(&mut surface).unwrap();
    assert_eq!(surface.commands.len(), 1);
}

#[test]
fn test_raw_invoke_returns_outcomes() {
    let (_dir, manager) = loaded_shapes();
    let host = &manager.hosts()[0];
    let lasso = host
        .create_raw("shapes.Lasso", "selection", &["effect"])
        .unwrap();

    assert_eq!(
        lasso.invoke(Invocation::Selection).unwrap(),
        Outcome::Selection(Rect::new(5, 5, 50, 20))
    );
}

/// Captures the whole of a very wide desktop
struct Panorama;

impl snip_modules::ModuleObject for Panorama {
    fn as_screenshot(&mut self) -> Option<&mut dyn ScreenshotCapturing> {
        Some(self)
    }
}

impl ScreenshotCapturing for Panorama {
    fn capture_screen(&mut self, context: &mut EffectContext) -> anyhow::Result<()> {
        let image = ImageData::blank(5120, 3400);
        context.set(EffectContext::SCREENSHOT_KEY, ContextValue::Image(image));
        Ok(())
    }
}

impl snip_modules::ModuleType for Panorama {
    const TYPE_NAME: &'static str = "wide.Panorama";
    const CAPABILITIES: &'static [Capability] = &[Capability::ScreenshotCapturing];

    fn create() -> Self {
        Panorama
    }
}

#[test]
fn test_oversized_reply_fails_the_call() {
    let launcher = std::sync::Arc::new(
        StaticLauncher::new()
            .with_module("wide", || ModuleRegistry::new("wide").export::<Panorama>()),
    );
    let dir = package_dir(&["wide"]);
    let mut manager = ModuleManager::with_launcher(test_config(), launcher);
    assert_eq!(
        manager.load_from(dir.path(), &[Capability::ScreenshotCapturing]),
        1
    );
    let host = &manager.hosts()[0];

    let mut capture = host
        .create::<dyn ScreenshotCapturing>("wide.Panorama", &[])
        .unwrap();
    let mut context = EffectContext::new(Rect::new(0, 0, 5120, 3400));
    let err = capture.capture_screen(&mut context).unwrap_err();
    let err = module_error(&err);
    assert_eq!(err.kind(), FaultKind::Call);
    assert!(context.screenshot().is_none());

    // The boundary keeps serving after the lost reply
    let again = host
        .create::<dyn ScreenshotCapturing>("wide.Panorama", &[])
        .unwrap();
    assert!(again.capabilities().contains(Capability::ScreenshotCapturing));
}
