//! Runtime entry descriptors
//!
//! A runtime entry is a native function generated code may call. It is
//! called under one of two conventions:
//!
//! - **Full**: boxed arguments are pushed on the stack together with a result
//!   slot, and the call goes through the `call_to_runtime` trampoline. The
//!   entry may allocate and therefore trigger a collection; the trampoline
//!   publishes the frame so the collector sees every slot.
//! - **Leaf**: raw value bits travel in the native argument registers and the
//!   target is called directly. A leaf entry must not allocate, collect or
//!   panic; nothing enforces this at runtime.

use std::fmt;

use crate::runtime::frame::NativeArguments;

/// Signature of a Full runtime entry
pub type RuntimeFunction = fn(&mut NativeArguments<'_>);

/// Calling convention of a runtime entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEntryKind {
    Full,
    Leaf,
}

impl fmt::Display for RuntimeEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEntryKind::Full => f.write_str("full"),
            RuntimeEntryKind::Leaf => f.write_str("leaf"),
        }
    }
}

/// Native target of a Leaf entry
///
/// The variant fixes the number of argument registers the target reads, so
/// a leaf entry's arity can never disagree with its native signature.
#[derive(Clone, Copy)]
pub enum LeafFunction {
    Args0(extern "C" fn() -> u64),
    Args1(extern "C" fn(u64) -> u64),
    Args2(extern "C" fn(u64, u64) -> u64),
    Args3(extern "C" fn(u64, u64, u64) -> u64),
    Args4(extern "C" fn(u64, u64, u64, u64) -> u64),
}

impl LeafFunction {
    /// Number of register arguments
    pub fn arity(&self) -> usize {
        match self {
            LeafFunction::Args0(_) => 0,
            LeafFunction::Args1(_) => 1,
            LeafFunction::Args2(_) => 2,
            LeafFunction::Args3(_) => 3,
            LeafFunction::Args4(_) => 4,
        }
    }

    /// Address of the native function
    pub fn address(&self) -> usize {
        match *self {
            LeafFunction::Args0(f) => f as usize,
            LeafFunction::Args1(f) => f as usize,
            LeafFunction::Args2(f) => f as usize,
            LeafFunction::Args3(f) => f as usize,
            LeafFunction::Args4(f) => f as usize,
        }
    }
}

/// Native function behind a runtime entry
#[derive(Clone, Copy)]
pub enum NativeTarget {
    Full(RuntimeFunction),
    Leaf(LeafFunction),
}

/// Descriptor of a registered runtime entry
pub struct RuntimeEntry {
    name: &'static str,
    arity: usize,
    target: NativeTarget,
}

impl RuntimeEntry {
    /// Describe a Full entry taking `arity` boxed arguments
    pub fn full(name: &'static str, arity: usize, function: RuntimeFunction) -> Self {
        Self {
            name,
            arity,
            target: NativeTarget::Full(function),
        }
    }

    /// Describe a Leaf entry; the arity comes from the native signature
    pub fn leaf(name: &'static str, function: LeafFunction) -> Self {
        Self {
            name,
            arity: function.arity(),
            target: NativeTarget::Leaf(function),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared argument count
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn kind(&self) -> RuntimeEntryKind {
        match self.target {
            NativeTarget::Full(_) => RuntimeEntryKind::Full,
            NativeTarget::Leaf(_) => RuntimeEntryKind::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == RuntimeEntryKind::Leaf
    }

    pub fn native_target(&self) -> NativeTarget {
        self.target
    }

    /// Address of the native function
    pub fn address(&self) -> usize {
        match self.target {
            NativeTarget::Full(f) => f as usize,
            NativeTarget::Leaf(f) => f.address(),
        }
    }
}

impl fmt::Debug for RuntimeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeEntry")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("kind", &self.kind())
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl fmt::Display for RuntimeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, arity {})", self.name, self.kind(), self.arity)
    }
}
