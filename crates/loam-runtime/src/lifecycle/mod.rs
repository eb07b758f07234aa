//! Module lifecycle: per-module transition engine and the isolation
//! namespace.

mod handle;
mod namespace;

pub use handle::ModuleHandle;
pub use namespace::{NamespaceView, RuntimeModuleContext};
