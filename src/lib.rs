//! Workspace root crate.
//!
//! Re-exports the core building blocks (physics, safety supervisor,
//! controller) so integration tests and downstream demos depend on a
//! single crate.

pub use controller::*;
pub use safety::*;
pub use sim::*;
