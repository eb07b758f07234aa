//! Module lifecycle states.
//!
//! ```text
//! INSTALLED ──resolve──► RESOLVED ──start──► STARTING ──► ACTIVE
//!     ▲                     ▲ │                              │
//!     │ update              │ └──────── stop ◄── STOPPING ◄──┘
//!     │                     │
//!     └──── uninstall ──────┴──────────► UNINSTALLED (terminal)
//! ```
//!
//! `UNINSTALLED` is reachable from any state except `ACTIVE`,
//! `STARTING` and `STOPPING` — an active module must come to rest
//! first. Once entered it is terminal: the wiring is dropped and the
//! module's namespace is discarded.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an installed module.
///
/// # State Categories
///
/// | Category | States | Operations allowed |
/// |----------|--------|--------------------|
/// | At rest | `Installed`, `Resolved` | start, update, uninstall |
/// | Transient | `Starting`, `Stopping` | none (transition in flight) |
/// | Running | `Active` | stop, update |
/// | Terminal | `Uninstalled` | none |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Content stored, identity assigned, not yet wired.
    #[default]
    Installed,

    /// A consistent wiring exists for this module.
    Resolved,

    /// Activation entry point is running.
    Starting,

    /// Activation completed; the module is live.
    Active,

    /// Deactivation entry point is running.
    Stopping,

    /// Identity retired. Terminal.
    Uninstalled,
}

impl ModuleState {
    /// Returns `true` for the in-flight transition states.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Returns `true` if the module's code is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` once the module has a wiring (resolved or
    /// beyond, short of uninstalled).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::Starting | Self::Active | Self::Stopping
        )
    }

    /// Returns `true` if this is the terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Uninstalled)
    }

    /// Returns `true` if `uninstall()` is legal from this state.
    ///
    /// Active and transient modules must be stopped first.
    #[must_use]
    pub fn can_uninstall(&self) -> bool {
        matches!(self, Self::Installed | Self::Resolved)
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installed => f.write_str("installed"),
            Self::Resolved => f.write_str("resolved"),
            Self::Starting => f.write_str("starting"),
            Self::Active => f.write_str("active"),
            Self::Stopping => f.write_str("stopping"),
            Self::Uninstalled => f.write_str("uninstalled"),
        }
    }
}
