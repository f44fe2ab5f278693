/*!
 * Capability Interfaces
 *
 * The roles a module type can claim. Module types implement them directly;
 * host-side proxies implement them by forwarding across the boundary.
 * Every method may fail with any error type inside a module; through a proxy
 * the error is always a `ModuleError`.
 */

use super::types::{
    CatalogSnapshot, EffectContext, ImageData, Invalidated, PointerEvent, Rect, Surface,
};

/// Paints onto a drawing surface
pub trait Effect: Send {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()>;
}

/// An effect with an edit session
pub trait Editable: Effect {
    fn start_edit(&mut self, context: &EffectContext) -> anyhow::Result<()>;
    fn commit_edit(&mut self) -> anyhow::Result<()>;
    fn cancel_edit(&mut self) -> anyhow::Result<()>;
}

/// Receives pointer input
pub trait PointerAware: Send {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()>;
    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()>;
    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()>;
}

/// Exposes a selection region
pub trait SelectionBearing: Send {
    fn selection(&mut self) -> anyhow::Result<Rect>;
}

/// Populates a shared context with a captured image
pub trait ScreenshotCapturing: Send {
    fn capture_screen(&mut self, context: &mut EffectContext) -> anyhow::Result<()>;
}

/// Consumes a final image
pub trait ExportAction: Send {
    fn export(&mut self, image: &ImageData) -> anyhow::Result<()>;
}

/// Raises repaint-needed notifications
///
/// Notifications queue up inside the module until the host drains them.
pub trait InvalidationEmitting: Send {
    fn take_invalidations(&mut self) -> anyhow::Result<Vec<Invalidated>>;
}

/// Manages an editor session
pub trait EditorManager: Send {
    fn take_screenshot(&mut self) -> anyhow::Result<()>;
    fn register_module(&mut self, id: u32, catalog: CatalogSnapshot) -> anyhow::Result<()>;
    fn unregister_module(&mut self, id: u32) -> anyhow::Result<()>;
}
