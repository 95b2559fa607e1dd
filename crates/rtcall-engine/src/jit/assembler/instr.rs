//! Stub instructions and registers
//!
//! Stubs are fixed sequences over a small set of named registers and a
//! word-addressed virtual stack. The backend maps registers to SSA variables
//! and the virtual stack to an explicit stack slot.

use std::sync::Arc;

use crate::runtime::entry::RuntimeEntry;
use crate::vm::value::Value;

/// Stub register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    /// Return value
    Ret,
    /// Isolate pointer
    Ctx,
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Arg4,
    Arg5,
    /// Scratch
    Tmp,
}

/// Argument registers of the Leaf convention, in order
pub const ARGUMENT_REGISTERS: [Reg; 6] = [Reg::Arg0, Reg::Arg1, Reg::Arg2, Reg::Arg3, Reg::Arg4, Reg::Arg5];

impl Reg {
    /// Number of registers
    pub const COUNT: usize = 9;

    /// Argument register `index`
    ///
    /// # Panics
    ///
    /// Panics if there is no such argument register.
    pub fn argument(index: usize) -> Reg {
        *ARGUMENT_REGISTERS
            .get(index)
            .unwrap_or_else(|| panic!("no argument register {}", index))
    }

    pub fn index(self) -> usize {
        match self {
            Reg::Ret => 0,
            Reg::Ctx => 1,
            Reg::Arg0 => 2,
            Reg::Arg1 => 3,
            Reg::Arg2 => 4,
            Reg::Arg3 => 5,
            Reg::Arg4 => 6,
            Reg::Arg5 => 7,
            Reg::Tmp => 8,
        }
    }

    pub fn all() -> [Reg; Reg::COUNT] {
        [
            Reg::Ret,
            Reg::Ctx,
            Reg::Arg0,
            Reg::Arg1,
            Reg::Arg2,
            Reg::Arg3,
            Reg::Arg4,
            Reg::Arg5,
            Reg::Tmp,
        ]
    }
}

/// A stub instruction
#[derive(Debug, Clone)]
pub enum Instr {
    // ===== Frame =====
    /// Open a frame with `frame_size` bytes of locals
    Enter { frame_size: usize },
    /// Close the frame
    Leave,
    /// Return `Ret` to the caller
    Ret,
    /// Reserve `bytes` of scratch space, padded to `words` so the stack is aligned
    ReserveAlignedFrameSpace { bytes: usize, words: usize },

    // ===== Registers =====
    /// Isolate pointer into `Ctx`
    LoadContext,
    LoadObject { dst: Reg, value: Value },
    /// Invocation argument `index` into `dst`
    LoadArgument { dst: Reg, index: usize },

    // ===== Stack =====
    PushObject { value: Value },
    PushRegister { src: Reg },
    /// Push `null` as the slot a Full entry writes its result to
    PushResultSlot,
    PopRegister { dst: Reg },
    DropSlots { count: usize },

    // ===== Calls =====
    CallRuntime { entry: Arc<RuntimeEntry>, argc: usize },
}

impl Instr {
    /// Mnemonic for listings
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instr::Enter { .. } => "enter",
            Instr::Leave => "leave",
            Instr::Ret => "ret",
            Instr::ReserveAlignedFrameSpace { .. } => "reserve_aligned",
            Instr::LoadContext => "load_context",
            Instr::LoadObject { .. } => "load_object",
            Instr::LoadArgument { .. } => "load_argument",
            Instr::PushObject { .. } => "push_object",
            Instr::PushRegister { .. } => "push",
            Instr::PushResultSlot => "push_result_slot",
            Instr::PopRegister { .. } => "pop",
            Instr::DropSlots { .. } => "drop",
            Instr::CallRuntime { .. } => "call_runtime",
        }
    }
}
