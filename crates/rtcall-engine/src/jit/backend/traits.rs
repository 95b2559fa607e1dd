//! Backend-agnostic code generation traits
//!
//! Defines the `CodegenBackend` trait a backend implements to turn an
//! assembled stub into executable memory, along with the stack map types
//! recorded for Full runtime calls.

use crate::jit::assembler::AssembledStub;
use crate::runtime::frame::SlotKind;

/// Target architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArch {
    X86_64,
    AArch64,
}

/// Target information
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub arch: TargetArch,
    pub pointer_size: usize,
}

impl TargetInfo {
    /// Required stack alignment at a native call, in bytes
    pub fn stack_alignment(&self) -> usize {
        16
    }

    /// Integer argument registers of the native calling convention
    pub fn argument_registers(&self) -> usize {
        match self.arch {
            TargetArch::X86_64 => 6,
            TargetArch::AArch64 => 8,
        }
    }
}

/// Error during code generation
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("Backend error: {0}")]
    BackendError(String),
    #[error("Code buffer {0} is already finalized")]
    AlreadyFinalized(String),
    #[error("Code buffer {0} does not end in ret")]
    Unterminated(String),
    #[error("Function {0} already has code attached")]
    CodeAlreadyAttached(String),
}

/// Where a tracked value lives at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerLocation {
    /// Byte offset from the stack pointer at the call
    StackOffset(i32),
}

/// One tracked slot at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSlot {
    pub kind: SlotKind,
    pub location: PointerLocation,
}

/// Describes the GC-visible slots at a Full runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapEntry {
    /// Index of the call instruction in the stub's listing
    pub instr_index: usize,
    /// Runtime entry called
    pub entry: &'static str,
    /// Result slot first, then arguments left to right
    pub live_slots: Vec<LiveSlot>,
}

/// Owner of executable memory; dropping it releases the memory
pub trait CodeMemory: Send + Sync {}

/// Executable native code
pub struct ExecutableCode {
    /// Pointer to the entry point
    pub code_ptr: *const u8,
    /// Size of the native code in bytes
    pub code_size: usize,
    /// Backend IR the code was compiled from, for dumps
    pub ir: String,
    /// Keeps `code_ptr` mapped
    pub memory: Box<dyn CodeMemory>,
}

// Safety: ExecutableCode is Send+Sync because the code_ptr points to
// immutable executable memory that won't change after finalization.
unsafe impl Send for ExecutableCode {}
unsafe impl Sync for ExecutableCode {}

impl std::fmt::Debug for ExecutableCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableCode")
            .field("code_ptr", &self.code_ptr)
            .field("code_size", &self.code_size)
            .finish()
    }
}

/// The backend-agnostic code generation trait
///
/// The compilation pipeline is:
///   Assembler → AssembledStub → compile_stub() → ExecutableCode
pub trait CodegenBackend: Send + Sync {
    /// Backend name (for diagnostics)
    fn name(&self) -> &str;

    /// Lower and compile a stub into executable memory
    fn compile_stub(&self, stub: &AssembledStub) -> Result<ExecutableCode, CodegenError>;

    /// Return target architecture information
    fn target_info(&self) -> TargetInfo;
}
