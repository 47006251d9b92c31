//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the runtime and adapters are written against.
//! They contain no implementation details and use only domain types.

pub mod backend;
pub mod compiler;
pub mod reporter;

pub use backend::BuildBackend;
pub use compiler::{Compiler, CompilerEvent};
pub use reporter::{NoopReporter, Reporter};
