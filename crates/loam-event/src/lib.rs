//! Event model for the LOAM module runtime.
//!
//! Lifecycle transitions, service registry changes and framework-level
//! conditions are all announced as immutable [`Event`] values, fanned
//! out asynchronously by the runtime's event queue to registered
//! [`EventListener`]s.
//!
//! # Delivery model
//!
//! ```text
//! ┌──────────────┐  post()   ┌──────────────┐  on_event()  ┌──────────┐
//! │  lifecycle / │ ────────► │  EventQueue  │ ───────────► │ Listener │
//! │  registry    │ (enqueue  │  (worker in  │  (FIFO, one  │          │
//! │  producers   │  only)    │ loam-runtime)│   at a time) │          │
//! └──────────────┘           └──────────────┘              └──────────┘
//! ```
//!
//! Producers never block beyond the enqueue; listener failures are
//! contained on the worker. This crate defines only the value types
//! and the listener contract — the queue itself lives in
//! `loam-runtime`, which is the only crate with a concurrency
//! substrate.

#![warn(missing_docs)]

mod error;
mod event;
mod listener;
mod topic;

pub use error::EventError;
pub use event::Event;
pub use listener::{EventListener, ListenerFilter};
pub use topic::{EventKind, FrameworkTopic, LifecycleTopic, ServiceTopic, Topic};
