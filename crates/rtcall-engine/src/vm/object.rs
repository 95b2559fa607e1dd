//! Heap object kinds
//!
//! The heap only needs what runtime entries produce: boxed integers that do
//! not fit in a Smi. Objects hold no references to other objects, so
//! marking never has to trace through them.

use std::fmt;

/// A heap-allocated object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapObject {
    /// The `null` singleton (object table slot 0)
    Null,
    /// 64-bit integer outside the Smi range
    Mint(i64),
}

impl HeapObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::Null => "null",
            HeapObject::Mint(_) => "mint",
        }
    }
}

impl fmt::Display for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::Null => write!(f, "null"),
            HeapObject::Mint(v) => write!(f, "{}", v),
        }
    }
}

/// Kind of a value after resolving heap references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Smi,
    Mint,
    Null,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Smi => "smi",
            ValueKind::Mint => "mint",
            ValueKind::Null => "null",
        };
        f.write_str(name)
    }
}
