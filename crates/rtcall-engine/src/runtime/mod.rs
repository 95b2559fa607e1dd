//! Runtime entries: descriptors, registry, builtins and Full-call frames

pub mod builtins;
pub mod entry;
pub mod frame;
pub mod registry;

pub use entry::{LeafFunction, NativeTarget, RuntimeEntry, RuntimeEntryKind, RuntimeFunction};
pub use frame::{NativeArguments, RuntimeFrame, SlotKind};
pub use registry::{RuntimeEntryRegistry, RuntimeEntryRegistryBuilder};
