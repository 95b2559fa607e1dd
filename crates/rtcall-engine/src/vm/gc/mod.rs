//! Garbage collection: object table heap, root set and mark-sweep collector

pub mod collector;
pub mod heap;
pub mod roots;

pub use collector::{collect, GcStats};
pub use heap::Heap;
pub use roots::{RootSet, RootSource};
