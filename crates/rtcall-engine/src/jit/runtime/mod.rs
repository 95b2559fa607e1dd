//! Native side of the generated code boundary

pub mod trampoline;

pub use trampoline::{call_to_runtime, StubEntryFn};
