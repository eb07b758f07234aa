//! Event topics and kinds.
//!
//! Every event belongs to one of three kinds — framework, lifecycle or
//! service — and carries a kind-specific topic describing what
//! happened. Listeners subscribe by kind (plus an optional attribute
//! filter); the topic is what they switch on.
//!
//! # Kind / Topic Matrix
//!
//! | Kind | Topics |
//! |------|--------|
//! | `Framework` | `Started`, `Refreshed`, `Error` |
//! | `Lifecycle` | `Installed`, `Resolved`, `Starting`, `Started`, `Stopping`, `Stopped`, `Updated`, `Uninstalled`, `ResolutionFailed` |
//! | `Service` | `Registered`, `Modified`, `Unregistering` |

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three listener-subscribable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Framework-global events (startup, refresh completion, contained
    /// errors).
    Framework,
    /// Per-module lifecycle transitions.
    Lifecycle,
    /// Service registry changes.
    Service,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framework => f.write_str("framework"),
            Self::Lifecycle => f.write_str("lifecycle"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// Framework-global event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkTopic {
    /// The framework finished its startup sequence.
    Started,
    /// A refresh pass over a module set completed.
    Refreshed,
    /// A contained error (listener failure, activation failure
    /// reported asynchronously).
    Error,
}

/// Per-module lifecycle transition topics.
///
/// `Starting`/`Stopping` fire before the activator runs, `Started`/
/// `Stopped` after it returned; a failed activation emits
/// `ResolutionFailed`-style rollback through [`FrameworkTopic::Error`]
/// plus a terminal `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTopic {
    /// Module content accepted and a `ModuleId` assigned.
    Installed,
    /// Resolution produced a consistent wiring for the module.
    Resolved,
    /// Activation is about to run.
    Starting,
    /// Activation returned successfully.
    Started,
    /// Deactivation is about to run.
    Stopping,
    /// Deactivation completed; module is back to resolved.
    Stopped,
    /// Content and descriptor replaced in place.
    Updated,
    /// Terminal: identity retired, wiring and namespace dropped.
    Uninstalled,
    /// Resolution failed for this module (siblings unaffected).
    ResolutionFailed,
}

/// Service registry change topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTopic {
    /// A service was registered (also synthesized for back-fill when a
    /// listener subscribes late).
    Registered,
    /// A registration's properties changed.
    Modified,
    /// The service is about to leave the registry.
    Unregistering,
}

/// A kind-qualified topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "topic", rename_all = "snake_case")]
pub enum Topic {
    /// Framework-global topic.
    Framework(FrameworkTopic),
    /// Lifecycle topic.
    Lifecycle(LifecycleTopic),
    /// Service topic.
    Service(ServiceTopic),
}

impl Topic {
    /// Returns the kind this topic belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Framework(_) => EventKind::Framework,
            Self::Lifecycle(_) => EventKind::Lifecycle,
            Self::Service(_) => EventKind::Service,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framework(t) => write!(f, "framework/{t:?}"),
            Self::Lifecycle(t) => write!(f, "lifecycle/{t:?}"),
            Self::Service(t) => write!(f, "service/{t:?}"),
        }
    }
}
