//! Builder-pattern stub assembler
//!
//! One method per instruction family. Every method checks the instruction
//! against the frame model before recording it, so a broken sequence panics
//! at the line that emits it rather than at run time.
//!
//! ```text
//! asm.enter(0)
//!    .load_context()
//!    .push_result_slot()
//!    .push_object(Value::smi(10))
//!    .push_object(Value::smi(20))
//!    .call_runtime(&sub)
//!    .drop_slots(2)
//!    .pop_register(Reg::Ret)
//!    .leave()
//!    .ret();
//! ```

pub mod display;
pub mod instr;

use std::sync::Arc;

pub use instr::{Instr, Reg, ARGUMENT_REGISTERS};

use crate::jit::backend::traits::{CodegenError, StackMapEntry, TargetInfo};
use crate::jit::frame::{FrameSummary, FrameTracker};
use crate::runtime::entry::RuntimeEntry;
use crate::vm::value::Value;

/// Mutable code buffer of one stub
pub struct Assembler {
    name: String,
    target: TargetInfo,
    instrs: Vec<Instr>,
    frame: FrameTracker,
    /// Heap objects embedded as constants
    object_pool: Vec<Value>,
    /// Runtime entries the stub calls
    runtime_entries: Vec<Arc<RuntimeEntry>>,
    finalized: bool,
}

/// Immutable snapshot of a finished buffer, handed to the backend
#[derive(Debug, Clone)]
pub struct AssembledStub {
    pub name: String,
    pub instrs: Vec<Instr>,
    pub frame: FrameSummary,
    pub stack_maps: Vec<StackMapEntry>,
    pub object_pool: Vec<Value>,
    pub runtime_entries: Vec<Arc<RuntimeEntry>>,
    pub word_size: usize,
}

impl AssembledStub {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Assembler {
    pub fn new(name: impl Into<String>, target: TargetInfo) -> Self {
        let frame = FrameTracker::new(&target);
        Assembler {
            name: name.into(),
            target,
            instrs: Vec::new(),
            frame,
            object_pool: Vec::new(),
            runtime_entries: Vec::new(),
            finalized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn frame(&self) -> &FrameTracker {
        &self.frame
    }

    pub fn object_pool(&self) -> &[Value] {
        &self.object_pool
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn begin(&self) {
        assert!(!self.finalized, "emission into finalized buffer {}", self.name);
        self.frame.check_emit();
    }

    fn emit(&mut self, instr: Instr) -> &mut Self {
        self.instrs.push(instr);
        self
    }

    fn pool_object(&mut self, value: Value) {
        if value.is_collectable() && !self.object_pool.contains(&value) {
            self.object_pool.push(value);
        }
    }

    // ===== Frame =====

    pub fn enter(&mut self, frame_size: usize) -> &mut Self {
        self.begin();
        self.frame.enter(frame_size);
        self.emit(Instr::Enter { frame_size })
    }

    pub fn leave(&mut self) -> &mut Self {
        self.begin();
        self.frame.leave();
        self.emit(Instr::Leave)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.begin();
        self.frame.ret();
        self.emit(Instr::Ret)
    }

    /// Reserve `bytes` of scratch space and align the stack for a native call
    pub fn reserve_aligned_frame_space(&mut self, bytes: usize) -> &mut Self {
        self.begin();
        let words = self.frame.reserve_aligned_frame_space(bytes);
        self.emit(Instr::ReserveAlignedFrameSpace { bytes, words })
    }

    // ===== Registers =====

    pub fn load_context(&mut self) -> &mut Self {
        self.begin();
        self.frame.load(Reg::Ctx);
        self.emit(Instr::LoadContext)
    }

    pub fn load_object(&mut self, dst: Reg, value: Value) -> &mut Self {
        self.begin();
        self.frame.load(dst);
        self.pool_object(value);
        self.emit(Instr::LoadObject { dst, value })
    }

    /// Invocation argument `index` into `dst`
    pub fn load_argument(&mut self, dst: Reg, index: usize) -> &mut Self {
        self.begin();
        self.frame.load_argument(dst, index);
        self.emit(Instr::LoadArgument { dst, index })
    }

    // ===== Stack =====

    pub fn push_object(&mut self, value: Value) -> &mut Self {
        self.begin();
        self.frame.push();
        self.pool_object(value);
        self.emit(Instr::PushObject { value })
    }

    pub fn push_register(&mut self, src: Reg) -> &mut Self {
        self.begin();
        self.frame.push_register(src);
        self.emit(Instr::PushRegister { src })
    }

    pub fn push_result_slot(&mut self) -> &mut Self {
        self.begin();
        self.frame.push_result_slot();
        self.emit(Instr::PushResultSlot)
    }

    pub fn pop_register(&mut self, dst: Reg) -> &mut Self {
        self.begin();
        self.frame.pop(dst);
        self.emit(Instr::PopRegister { dst })
    }

    pub fn drop_slots(&mut self, count: usize) -> &mut Self {
        self.begin();
        self.frame.drop_slots(count);
        self.emit(Instr::DropSlots { count })
    }

    // ===== Calls =====

    /// Call `entry` under its convention
    ///
    /// A Full entry takes the words pushed since the last result slot; a Leaf
    /// entry takes the first `arity` argument registers.
    pub fn call_runtime(&mut self, entry: &Arc<RuntimeEntry>) -> &mut Self {
        self.begin();
        let argc = self.frame.call_runtime(entry, self.instrs.len());
        if !self.runtime_entries.iter().any(|e| Arc::ptr_eq(e, entry)) {
            self.runtime_entries.push(entry.clone());
        }
        self.emit(Instr::CallRuntime {
            entry: entry.clone(),
            argc,
        })
    }

    /// Render the instruction listing
    pub fn disassemble(&self) -> String {
        display::listing(&self.name, &self.instrs, &self.frame.summary())
    }

    /// Snapshot the buffer for the backend and mark it finalized
    ///
    /// The buffer is only marked once `commit` accepts the snapshot, so a
    /// backend failure leaves it unfinalized.
    pub(crate) fn finalize_with<T>(
        &mut self,
        commit: impl FnOnce(&AssembledStub) -> Result<T, CodegenError>,
    ) -> Result<T, CodegenError> {
        if self.finalized {
            return Err(CodegenError::AlreadyFinalized(self.name.clone()));
        }
        if !self.frame.is_terminated() {
            return Err(CodegenError::Unterminated(self.name.clone()));
        }
        let summary = self.frame.summary();
        assert!(summary.is_balanced(), "{} finalized with an unbalanced frame", self.name);

        let stub = AssembledStub {
            name: self.name.clone(),
            instrs: self.instrs.clone(),
            frame: summary,
            stack_maps: self.frame.stack_maps().to_vec(),
            object_pool: self.object_pool.clone(),
            runtime_entries: self.runtime_entries.clone(),
            word_size: self.frame.word_size(),
        };
        let result = commit(&stub)?;
        self.finalized = true;
        Ok(result)
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("name", &self.name)
            .field("instrs", &self.instrs.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}
