//! Runtime entry call stubs
//!
//! This crate implements the bridge between generated native code and the
//! runtime's own native functions:
//! - **Runtime**: runtime entry descriptors, the entry registry and the
//!   frames Full calls publish to the collector (`runtime` module)
//! - **JIT**: the stub assembler, the Full and Leaf call stub generators and
//!   the Cranelift backend (`jit` module)
//! - **VM**: values, heap, zones, functions, the isolate and the uniform call
//!   path (`vm` module)
//! - **Harness**: drives generated stubs end to end (`harness` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rtcall_engine::{Harness, RuntimeEntryRegistry, Value};
//!
//! let mut harness = Harness::new(Arc::new(RuntimeEntryRegistry::with_builtins()))?;
//! let result = harness.call_runtime("TestSmiSub", &[Value::smi(10), Value::smi(20)])?;
//! assert_eq!(harness.expect_smi(result), -10);
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

// ============================================================================
// Core Modules
// ============================================================================

/// Runtime entries, registry and runtime frames
pub mod runtime;

/// Stub assembler, generators and code generation backend
pub mod jit;

/// Object model, isolate and call path
pub mod vm;

/// Execution harness for generated stubs
pub mod harness;

// ============================================================================
// Re-exports
// ============================================================================

pub use harness::{Harness, HarnessConfig};

pub use jit::{
    assembler::{Assembler, Instr, Reg},
    backend::{CodegenError, StackMapEntry},
    code::Code,
    stubs::{generate_call_leaf_runtime_stub, generate_call_runtime_stub, Operand},
    JitConfig, JitEngine, OptLevel,
};

pub use runtime::{
    LeafFunction, NativeArguments, RuntimeEntry, RuntimeEntryKind, RuntimeEntryRegistry,
    RuntimeEntryRegistryBuilder, RuntimeFrame, SlotKind,
};

pub use vm::{invoke_static, Function, Isolate, IsolateConfig, Value, ValueKind};
