//! Event layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ListenerFailed`](EventError::ListenerFailed) | `EVENT_LISTENER_FAILED` | No |
//! | [`QueueClosed`](EventError::QueueClosed) | `EVENT_QUEUE_CLOSED` | No |
//! | [`QueueFull`](EventError::QueueFull) | `EVENT_QUEUE_FULL` | Yes |

use loam_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event layer error.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum EventError {
    /// A listener reported a handling failure.
    ///
    /// Contained by the queue worker: logged, never propagated to the
    /// poster, never stops delivery to the remaining listeners.
    #[error("listener failed: {0}")]
    ListenerFailed(String),

    /// The queue was shut down; the event was not delivered.
    #[error("event queue closed")]
    QueueClosed,

    /// The bounded queue is at capacity (non-blocking post only).
    ///
    /// **Recoverable** — the worker drains continuously; retry or use
    /// the awaiting post.
    #[error("event queue full")]
    QueueFull,
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::ListenerFailed(_) => "EVENT_LISTENER_FAILED",
            Self::QueueClosed => "EVENT_QUEUE_CLOSED",
            Self::QueueFull => "EVENT_QUEUE_FULL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull)
    }
}
