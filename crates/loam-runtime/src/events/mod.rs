//! Asynchronous event delivery.

mod queue;

pub use queue::EventQueue;
