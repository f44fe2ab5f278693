/*!
 * Invocation Dispatch
 * Routes one invocation to the capability it belongs to on a module object
 */

use super::registry::ModuleObject;
use crate::boundary::{Invocation, Outcome};
use crate::core::errors::ModuleError;

/// Call the method named by `invocation` on `object`
///
/// Failures raised by module code come back untranslated; the interception
/// chain owns translation.
pub fn dispatch(object: &mut dyn ModuleObject, invocation: &Invocation) -> anyhow::Result<Outcome> {
    let missing = || {
        ModuleError::capability_mismatch(format!(
            "object does not implement '{}' required by {}",
            invocation.capability(),
            invocation.method()
        ))
    };

    match invocation {
        Invocation::Apply { surface } => {
            let effect = object.as_effect().ok_or_else(missing)?;
            let mut surface = surface.clone();
            effect.apply(&mut surface)?;
            Ok(Outcome::Surface(surface))
        }
        Invocation::StartEdit { context } => {
            object.as_editable().ok_or_else(missing)?.start_edit(context)?;
            Ok(Outcome::Unit)
        }
        Invocation::CommitEdit => {
            object.as_editable().ok_or_else(missing)?.commit_edit()?;
            Ok(Outcome::Unit)
        }
        Invocation::CancelEdit => {
            object.as_editable().ok_or_else(missing)?.cancel_edit()?;
            Ok(Outcome::Unit)
        }
        Invocation::PointerDown(event) => {
            object.as_pointer_aware().ok_or_else(missing)?.pointer_down(*event)?;
            Ok(Outcome::Unit)
        }
        Invocation::PointerMove(event) => {
            object.as_pointer_aware().ok_or_else(missing)?.pointer_move(*event)?;
            Ok(Outcome::Unit)
        }
        Invocation::PointerUp(event) => {
            object.as_pointer_aware().ok_or_else(missing)?.pointer_up(*event)?;
            Ok(Outcome::Unit)
        }
        Invocation::Selection => {
            let rect = object.as_selection().ok_or_else(missing)?.selection()?;
            Ok(Outcome::Selection(rect))
        }
        Invocation::CaptureScreen { context } => {
            let capturing = object.as_screenshot().ok_or_else(missing)?;
            let mut context = context.clone();
            capturing.capture_screen(&mut context)?;
            Ok(Outcome::Context(context))
        }
        Invocation::Export { image } => {
            object.as_export_action().ok_or_else(missing)?.export(image)?;
            Ok(Outcome::Unit)
        }
        Invocation::TakeInvalidations => {
            let events = object.as_invalidating().ok_or_else(missing)?.take_invalidations()?;
            Ok(Outcome::Invalidations(events))
        }
        Invocation::TakeScreenshot => {
            object.as_editor_manager().ok_or_else(missing)?.take_screenshot()?;
            Ok(Outcome::Unit)
        }
        Invocation::RegisterModule { id, catalog } => {
            object
                .as_editor_manager()
                .ok_or_else(missing)?
                .register_module(*id, catalog.clone())?;
            Ok(Outcome::Unit)
        }
        Invocation::UnregisterModule { id } => {
            object.as_editor_manager().ok_or_else(missing)?.unregister_module(*id)?;
            Ok(Outcome::Unit)
        }
    }
}
