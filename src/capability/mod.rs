/*!
 * Capability Interface Set
 *
 * The fixed vocabulary of roles a module type can claim. Discovery works by
 * capability, never by concrete type name. On the wire a capability travels
 * by its interface name; anything that does not parse is not an interface.
 */

pub mod traits;
pub mod types;

pub use traits::{
    Editable, EditorManager, Effect, ExportAction, InvalidationEmitting, PointerAware,
    ScreenshotCapturing, SelectionBearing,
};
pub use types::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One capability interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Effect,
    Editable,
    PointerAware,
    SelectionBearing,
    ScreenshotCapturing,
    ExportAction,
    InvalidationEmitting,
    EditorManager,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Effect,
        Capability::Editable,
        Capability::PointerAware,
        Capability::SelectionBearing,
        Capability::ScreenshotCapturing,
        Capability::ExportAction,
        Capability::InvalidationEmitting,
        Capability::EditorManager,
    ];

    /// Interface name used on the wire
    pub const fn name(self) -> &'static str {
        match self {
            Self::Effect => "effect",
            Self::Editable => "editable",
            Self::PointerAware => "pointer-aware",
            Self::SelectionBearing => "selection",
            Self::ScreenshotCapturing => "screenshot",
            Self::ExportAction => "export-action",
            Self::InvalidationEmitting => "invalidating",
            Self::EditorManager => "editor-manager",
        }
    }

    /// Resolve an interface name; `None` means "not an interface"
    pub fn parse(name: &str) -> Option<Capability> {
        Self::ALL.into_iter().find(|cap| cap.name() == name)
    }

    /// Interfaces this one extends
    pub const fn implied(self) -> &'static [Capability] {
        match self {
            Self::Editable => &[Capability::Effect],
            _ => &[],
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of capabilities, fixed-size and `Copy`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing `caps` and everything they extend
    pub fn closure_of(caps: &[Capability]) -> Self {
        let mut set = Self::empty();
        for cap in caps {
            set.insert(*cap);
            for implied in cap.implied() {
                set.insert(*implied);
            }
        }
        set
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn intersects(&self, other: &CapabilitySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 & other.0)
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | other.0)
    }

    pub fn is_subset(&self, other: &CapabilitySet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(move |cap| self.contains(*cap))
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|cap| cap.name().to_string()).collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|c| c.name())).finish()
    }
}

/// Ties a capability trait object type to its `Capability`
///
/// Implemented for `dyn Effect`, `dyn Editable`, and so on, so generic code
/// can name an interface by its trait: `host.create::<dyn Effect>(...)`.
pub trait Interface: 'static {
    const CAPABILITY: Capability;
}

macro_rules! interface {
    ($($trait_:ident => $cap:ident),* $(,)?) => {
        $(
            impl Interface for dyn $trait_ {
                const CAPABILITY: Capability = Capability::$cap;
            }
        )*
    };
}

interface! {
    Effect => Effect,
    Editable => Editable,
    PointerAware => PointerAware,
    SelectionBearing => SelectionBearing,
    ScreenshotCapturing => ScreenshotCapturing,
    ExportAction => ExportAction,
    InvalidationEmitting => InvalidationEmitting,
    EditorManager => EditorManager,
}
