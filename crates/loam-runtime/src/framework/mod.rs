//! The framework coordinator and its shared context.

mod context;
mod error;
#[allow(clippy::module_inception)]
mod framework;

pub use context::FrameworkContext;
pub use error::RuntimeError;
pub use framework::Framework;
