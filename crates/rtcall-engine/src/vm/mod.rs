//! Runtime core: values, heap, zones, functions and the isolate

pub mod entry;
pub mod function;
pub mod gc;
pub mod isolate;
pub mod object;
pub mod symbols;
pub mod value;
pub mod zone;

pub use entry::invoke_static;
pub use function::{Class, Function, FunctionKind, FunctionTable, OWNER_CLASS_NAME};
pub use isolate::{Isolate, IsolateConfig};
pub use object::{HeapObject, ValueKind};
pub use symbols::{Symbol, SymbolTable};
pub use value::Value;
pub use zone::Zone;
