/*!
 * Host-Side Proxies
 *
 * `Proxy<dyn Effect>`, `Proxy<dyn ExportAction>` and friends are adapters
 * that implement a capability trait by forwarding each call across the
 * boundary. The exposed capability set is fixed at creation; reaching an
 * optional capability takes a checked `cast`, so methods outside the set
 * cannot even be named.
 *
 * Dropping the last clone of a proxy releases the remote object.
 */

use crate::boundary::{Connection, Invocation, Outcome, Request, Response};
use crate::capability::{
    Capability, CapabilitySet, CatalogSnapshot, Editable, EditorManager, Effect, EffectContext,
    ExportAction, ImageData, Interface, InvalidationEmitting, Invalidated, PointerAware,
    PointerEvent, Rect, ScreenshotCapturing, SelectionBearing, Surface,
};
use crate::core::errors::{ModuleError, ModuleResult};
use crate::core::types::ObjectId;
use crate::lease::{Lease, LeaseHolder, LifetimeManager};
use crate::monitoring::CallSpan;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Host-side record of one object living in a boundary
pub struct RemoteObject {
    id: ObjectId,
    type_name: String,
    exposed: CapabilitySet,
    connection: Arc<Connection>,
    lease: Option<Arc<Lease>>,
    lifetime: Weak<LifetimeManager>,
}

impl RemoteObject {
    pub(crate) fn new(
        id: ObjectId,
        type_name: String,
        exposed: CapabilitySet,
        connection: Arc<Connection>,
        lease: Option<Arc<Lease>>,
        lifetime: Weak<LifetimeManager>,
    ) -> Self {
        Self {
            id,
            type_name,
            exposed,
            connection,
            lease,
            lifetime,
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.exposed
    }

    /// The object's lease while it is still live
    pub fn lease(&self) -> Option<Arc<Lease>> {
        self.lease.clone().filter(|lease| !lease.is_expired())
    }

    /// False once the boundary is gone or the lease ran out
    pub fn is_alive(&self) -> bool {
        !self.connection.is_closed()
            && self.lease.as_ref().map_or(true, |lease| !lease.is_expired())
    }

    /// Forward one call to the boundary
    pub fn invoke(&self, invocation: Invocation) -> ModuleResult<Outcome> {
        let capability = invocation.capability();
        if !self.exposed.contains(capability) {
            return Err(ModuleError::capability_mismatch(format!(
                "'{}' is not exposed by {} ({})",
                capability, self.id, self.type_name
            )));
        }
        if self.connection.is_closed() {
            return Err(ModuleError::disconnected(format!(
                "boundary {} hosting {} has been unloaded",
                self.connection.name(),
                self.id
            )));
        }
        if self.lease.as_ref().is_some_and(|lease| lease.is_expired()) {
            return Err(ModuleError::disconnected(format!(
                "lease for {} expired",
                self.id
            )));
        }

        let span = CallSpan::new(invocation.method(), self.id.0);
        let _entered = span.enter();

        let reply = self
            .connection
            .call(Request::Invoke {
                object: self.id,
                invocation,
            })
            .map_err(ModuleError::from);

        match reply {
            Ok(Response::Returned(outcome)) => {
                span.succeeded();
                if let Some(lease) = &self.lease {
                    lease.renew_on_call();
                }
                Ok(outcome)
            }
            Ok(Response::Failed(err)) => {
                span.failed(err.message());
                Err(err)
            }
            Ok(other) => {
                span.failed("unexpected reply");
                Err(ModuleError::protocol(format!(
                    "unexpected reply to invoke: {:?}",
                    other
                )))
            }
            Err(err) => {
                span.failed(err.message());
                Err(err)
            }
        }
    }
}

impl Drop for RemoteObject {
    fn drop(&mut self) {
        if let Some(lease) = &self.lease {
            if let Some(lifetime) = self.lifetime.upgrade() {
                lifetime.remove(lease.id());
            }
        }
        if !self.connection.is_closed() {
            trace!(object = %self.id, "Releasing remote object");
            let _ = self.connection.notify(Request::Release { object: self.id });
        }
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("capabilities", &self.exposed)
            .field("boundary", &self.connection.name())
            .finish()
    }
}

/// Typed handle to a remote object, usable as capability `I`
pub struct Proxy<I: ?Sized + Interface> {
    remote: Arc<RemoteObject>,
    _interface: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized + Interface> Proxy<I> {
    pub(crate) fn new(remote: Arc<RemoteObject>) -> Self {
        Self {
            remote,
            _interface: PhantomData,
        }
    }

    pub fn remote(&self) -> &Arc<RemoteObject> {
        &self.remote
    }

    pub fn id(&self) -> ObjectId {
        self.remote.id
    }

    pub fn type_name(&self) -> &str {
        &self.remote.type_name
    }

    /// Exposed capabilities, fixed at creation
    pub fn capabilities(&self) -> CapabilitySet {
        self.remote.exposed
    }

    pub fn exposes<J: ?Sized + Interface>(&self) -> bool {
        self.remote.exposed.contains(J::CAPABILITY)
    }

    /// View the same object as capability `J`, if it exposes it
    pub fn cast<J: ?Sized + Interface>(&self) -> Option<Proxy<J>> {
        self.exposes::<J>().then(|| Proxy::new(self.remote.clone()))
    }

    pub fn lease(&self) -> Option<Arc<Lease>> {
        self.remote.lease()
    }

    pub fn is_alive(&self) -> bool {
        self.remote.is_alive()
    }

    fn call(&self, invocation: Invocation) -> anyhow::Result<Outcome> {
        Ok(self.remote.invoke(invocation)?)
    }

    fn call_unit(&self, invocation: Invocation) -> anyhow::Result<()> {
        match self.call(invocation)? {
            Outcome::Unit => Ok(()),
            other => Err(unexpected(other).into()),
        }
    }
}

fn unexpected(outcome: Outcome) -> ModuleError {
    ModuleError::protocol(format!("unexpected outcome: {:?}", outcome))
}

impl<I: ?Sized + Interface> Clone for Proxy<I> {
    fn clone(&self) -> Self {
        Self::new(self.remote.clone())
    }
}

impl<I: ?Sized + Interface> fmt::Debug for Proxy<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", &I::CAPABILITY.name())
            .field("remote", &self.remote)
            .finish()
    }
}

impl<I: ?Sized + Interface> LeaseHolder for Proxy<I> {
    fn remote_object(&self) -> Option<&Arc<RemoteObject>> {
        Some(&self.remote)
    }
}

fn apply_remote<I: ?Sized + Interface>(proxy: &Proxy<I>, surface: &mut Surface) -> anyhow::Result<()> {
    match proxy.call(Invocation::Apply {
        surface: surface.clone(),
    })? {
        Outcome::Surface(painted) => {
            *surface = painted;
            Ok(())
        }
        other => Err(unexpected(other).into()),
    }
}

impl Effect for Proxy<dyn Effect> {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        apply_remote(self, surface)
    }
}

impl Effect for Proxy<dyn Editable> {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        apply_remote(self, surface)
    }
}

impl Editable for Proxy<dyn Editable> {
    fn start_edit(&mut self, context: &EffectContext) -> anyhow::Result<()> {
        self.call_unit(Invocation::StartEdit {
            context: context.clone(),
        })
    }

    fn commit_edit(&mut self) -> anyhow::Result<()> {
        self.call_unit(Invocation::CommitEdit)
    }

    fn cancel_edit(&mut self) -> anyhow::Result<()> {
        self.call_unit(Invocation::CancelEdit)
    }
}

impl PointerAware for Proxy<dyn PointerAware> {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.call_unit(Invocation::PointerDown(event))
    }

    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.call_unit(Invocation::PointerMove(event))
    }

    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.call_unit(Invocation::PointerUp(event))
    }
}

impl SelectionBearing for Proxy<dyn SelectionBearing> {
    fn selection(&mut self) -> anyhow::Result<Rect> {
        match self.call(Invocation::Selection)? {
            Outcome::Selection(rect) => Ok(rect),
            other => Err(unexpected(other).into()),
        }
    }
}

impl ScreenshotCapturing for Proxy<dyn ScreenshotCapturing> {
    fn capture_screen(&mut self, context: &mut EffectContext) -> anyhow::Result<()> {
        match self.call(Invocation::CaptureScreen {
            context: context.clone(),
        })? {
            Outcome::Context(updated) => {
                *context = updated;
                Ok(())
            }
            other => Err(unexpected(other).into()),
        }
    }
}

impl ExportAction for Proxy<dyn ExportAction> {
    fn export(&mut self, image: &ImageData) -> anyhow::Result<()> {
        self.call_unit(Invocation::Export {
            image: image.clone(),
        })
    }
}

impl InvalidationEmitting for Proxy<dyn InvalidationEmitting> {
    fn take_invalidations(&mut self) -> anyhow::Result<Vec<Invalidated>> {
        match self.call(Invocation::TakeInvalidations)? {
            Outcome::Invalidations(events) => Ok(events),
            other => Err(unexpected(other).into()),
        }
    }
}

impl EditorManager for Proxy<dyn EditorManager> {
    fn take_screenshot(&mut self) -> anyhow::Result<()> {
        self.call_unit(Invocation::TakeScreenshot)
    }

    fn register_module(&mut self, id: u32, catalog: CatalogSnapshot) -> anyhow::Result<()> {
        self.call_unit(Invocation::RegisterModule { id, catalog })
    }

    fn unregister_module(&mut self, id: u32) -> anyhow::Result<()> {
        self.call_unit(Invocation::UnregisterModule { id })
    }
}

/// Interface names as sent on the wire
pub(crate) fn capability_names(caps: &[Capability]) -> Vec<String> {
    caps.iter().map(|cap| cap.name().to_string()).collect()
}

/// Parse the exposed set reported by a boundary
pub(crate) fn parse_exposed(names: &[String]) -> ModuleResult<CapabilitySet> {
    names
        .iter()
        .map(|name| {
            Capability::parse(name).ok_or_else(|| {
                ModuleError::protocol(format!("boundary reported unknown capability '{}'", name))
            })
        })
        .collect()
}
