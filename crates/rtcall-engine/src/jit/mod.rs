//! Stub code generation
//!
//! This module provides:
//! - A builder-pattern assembler with an emission-time frame model
//! - Generators for Full and Leaf runtime entry call stubs
//! - A Cranelift backend lowering stubs to native code
//! - The trampoline generated code calls Full entries through

pub mod assembler;
pub mod backend;
pub mod code;
pub mod frame;
pub mod runtime;
pub mod stubs;

mod engine;
pub use engine::{JitConfig, JitEngine, OptLevel};
