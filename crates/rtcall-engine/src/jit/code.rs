//! Finalized stub code
//!
//! `Code` is immutable once built. It owns the executable memory, the
//! instruction listing it was generated from, its object pool and the runtime
//! entries whose addresses are embedded in the machine code.

use std::fmt;
use std::sync::Arc;

use crate::jit::assembler::display;
use crate::jit::assembler::{AssembledStub, Instr};
use crate::jit::backend::traits::{ExecutableCode, StackMapEntry};
use crate::jit::frame::FrameSummary;
use crate::jit::runtime::trampoline::StubEntryFn;
use crate::runtime::entry::RuntimeEntry;
use crate::vm::value::Value;

/// Executable, immutable stub code
pub struct Code {
    name: String,
    executable: ExecutableCode,
    instrs: Vec<Instr>,
    frame: FrameSummary,
    stack_maps: Vec<StackMapEntry>,
    object_pool: Vec<Value>,
    runtime_entries: Vec<Arc<RuntimeEntry>>,
}

impl Code {
    pub(crate) fn new(stub: &AssembledStub, executable: ExecutableCode) -> Self {
        Code {
            name: stub.name.clone(),
            executable,
            instrs: stub.instrs.clone(),
            frame: stub.frame,
            stack_maps: stub.stack_maps.clone(),
            object_pool: stub.object_pool.clone(),
            runtime_entries: stub.runtime_entries.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native entry point
    pub fn entry(&self) -> StubEntryFn {
        // Safety: the backend compiled this code with the stub entry signature
        unsafe { std::mem::transmute::<*const u8, StubEntryFn>(self.executable.code_ptr) }
    }

    pub fn entry_address(&self) -> usize {
        self.executable.code_ptr as usize
    }

    /// Size of the native code in bytes
    pub fn code_size(&self) -> usize {
        self.executable.code_size
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn frame_summary(&self) -> &FrameSummary {
        &self.frame
    }

    /// Invocation arguments the code reads
    pub fn param_count(&self) -> usize {
        self.frame.param_count
    }

    /// Stack maps of the Full calls, in instruction order
    pub fn stack_maps(&self) -> &[StackMapEntry] {
        &self.stack_maps
    }

    /// Stack map of the first call to `entry`
    pub fn stack_map_for(&self, entry: &str) -> Option<&StackMapEntry> {
        self.stack_maps.iter().find(|map| map.entry == entry)
    }

    /// Heap objects embedded as constants
    pub fn object_pool(&self) -> &[Value] {
        &self.object_pool
    }

    pub fn runtime_entries(&self) -> &[Arc<RuntimeEntry>] {
        &self.runtime_entries
    }

    /// Instruction listing
    pub fn disassemble(&self) -> String {
        display::listing(&self.name, &self.instrs, &self.frame)
    }

    /// Backend IR the machine code was compiled from
    pub fn backend_ir(&self) -> &str {
        &self.executable.ir
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("name", &self.name)
            .field("entry", &format_args!("{:#x}", self.entry_address()))
            .field("code_size", &self.code_size())
            .field("instrs", &self.instrs.len())
            .field("stack_maps", &self.stack_maps.len())
            .finish()
    }
}
