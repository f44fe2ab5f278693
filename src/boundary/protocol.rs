/*!
 * Boundary Protocol
 *
 * Messages exchanged between the host and a module boundary. Capabilities
 * travel by interface name; method calls are a closed union where each
 * variant belongs to exactly one capability.
 *
 * Encoded with bincode, so enums here use serde's default (external) tagging.
 */

use super::package::PackageSettings;
use crate::capability::{
    Capability, CatalogSnapshot, EffectContext, ImageData, Invalidated, PointerEvent, Rect,
    Surface,
};
use crate::core::errors::ModuleError;
use crate::core::types::ObjectId;
use crate::lease::LeaseTerms;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Correlated message; replies echo the request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub body: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Load the package and establish its working context
    Load {
        package: PathBuf,
        settings: PackageSettings,
        lease: LeaseTerms,
    },
    GetTypes {
        capability: String,
    },
    HasAnyCapability {
        capabilities: Vec<String>,
    },
    Create {
        type_name: String,
        primary: String,
        optional: Vec<String>,
    },
    GetResource {
        name: String,
    },
    Invoke {
        object: ObjectId,
        invocation: Invocation,
    },
    /// Extend an object's lease to `lease_time` from now
    Renew {
        object: ObjectId,
        lease_time: Duration,
    },
    Release {
        object: ObjectId,
    },
    Shutdown,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::GetTypes { .. } => "get_types",
            Self::HasAnyCapability { .. } => "has_any_capability",
            Self::Create { .. } => "create",
            Self::GetResource { .. } => "get_resource",
            Self::Invoke { .. } => "invoke",
            Self::Renew { .. } => "renew",
            Self::Release { .. } => "release",
            Self::Shutdown => "shutdown",
        }
    }

    /// Lease traffic never waits behind module code
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::Renew { .. } | Self::Release { .. } | Self::Shutdown
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Loaded {
        module: String,
        types: usize,
    },
    Types(Vec<String>),
    Bool(bool),
    Created {
        object: ObjectId,
        capabilities: Vec<String>,
        lease: LeaseTerms,
    },
    Resource(Vec<u8>),
    Returned(Outcome),
    Ack,
    Failed(ModuleError),
}

/// One method call on a capability interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Invocation {
    Apply { surface: Surface },
    StartEdit { context: EffectContext },
    CommitEdit,
    CancelEdit,
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    Selection,
    CaptureScreen { context: EffectContext },
    Export { image: ImageData },
    TakeInvalidations,
    TakeScreenshot,
    RegisterModule { id: u32, catalog: CatalogSnapshot },
    UnregisterModule { id: u32 },
}

impl Invocation {
    /// Capability that declares this method
    pub fn capability(&self) -> Capability {
        match self {
            Self::Apply { .. } => Capability::Effect,
            Self::StartEdit { .. } | Self::CommitEdit | Self::CancelEdit => Capability::Editable,
            Self::PointerDown(_) | Self::PointerMove(_) | Self::PointerUp(_) => {
                Capability::PointerAware
            }
            Self::Selection => Capability::SelectionBearing,
            Self::CaptureScreen { .. } => Capability::ScreenshotCapturing,
            Self::Export { .. } => Capability::ExportAction,
            Self::TakeInvalidations => Capability::InvalidationEmitting,
            Self::TakeScreenshot | Self::RegisterModule { .. } | Self::UnregisterModule { .. } => {
                Capability::EditorManager
            }
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Apply { .. } => "apply",
            Self::StartEdit { .. } => "start_edit",
            Self::CommitEdit => "commit_edit",
            Self::CancelEdit => "cancel_edit",
            Self::PointerDown(_) => "pointer_down",
            Self::PointerMove(_) => "pointer_move",
            Self::PointerUp(_) => "pointer_up",
            Self::Selection => "selection",
            Self::CaptureScreen { .. } => "capture_screen",
            Self::Export { .. } => "export",
            Self::TakeInvalidations => "take_invalidations",
            Self::TakeScreenshot => "take_screenshot",
            Self::RegisterModule { .. } => "register_module",
            Self::UnregisterModule { .. } => "unregister_module",
        }
    }
}

/// Value returned by an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Unit,
    Surface(Surface),
    Context(EffectContext),
    Selection(Rect),
    Invalidations(Vec<Invalidated>),
}
