//! Emission-time frame model
//!
//! `FrameTracker` follows every instruction the assembler emits and panics on
//! sequences that would corrupt the stack or call a runtime entry with a
//! broken convention. It also records the stack maps of Full calls.
//!
//! Depth is counted in words from the stub's entry: words reserved by
//! `enter` and `reserve_aligned_frame_space` belong to the frame, pushed
//! words sit on top of it.

use crate::jit::assembler::instr::{Reg, ARGUMENT_REGISTERS};
use crate::jit::backend::traits::{LiveSlot, PointerLocation, StackMapEntry, TargetInfo};
use crate::runtime::entry::{RuntimeEntry, RuntimeEntryKind};
use crate::runtime::frame::{slot_offset, SlotKind};

/// Frame facts of a finalized stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    /// Deepest virtual stack depth reached, in words
    pub max_stack_words: usize,
    /// Invocation arguments the stub reads
    pub param_count: usize,
    pub full_calls: usize,
    pub leaf_calls: usize,
    /// Stack depth at `ret`
    pub final_depth: usize,
}

impl FrameSummary {
    /// Net stack effect of the stub is zero
    pub fn is_balanced(&self) -> bool {
        self.final_depth == 0
    }
}

/// Frame model of a stub under construction
#[derive(Debug)]
pub struct FrameTracker {
    word_size: usize,
    align_words: usize,
    argument_registers: usize,
    entered: bool,
    frame_words: usize,
    pushed_words: usize,
    /// Set by `reserve_aligned_frame_space`, cleared by any later stack change
    aligned: bool,
    /// Depth of the result slot while a Full call's arguments are being pushed
    outgoing: Option<usize>,
    /// Bit per register holding a defined value
    loaded: u16,
    terminated: bool,
    max_stack_words: usize,
    param_count: usize,
    full_calls: usize,
    leaf_calls: usize,
    stack_maps: Vec<StackMapEntry>,
}

impl FrameTracker {
    pub fn new(target: &TargetInfo) -> Self {
        FrameTracker {
            word_size: target.pointer_size,
            align_words: (target.stack_alignment() / target.pointer_size).max(1),
            argument_registers: target.argument_registers().min(ARGUMENT_REGISTERS.len()),
            entered: false,
            frame_words: 0,
            pushed_words: 0,
            aligned: false,
            outgoing: None,
            loaded: 0,
            terminated: false,
            max_stack_words: 0,
            param_count: 0,
            full_calls: 0,
            leaf_calls: 0,
            stack_maps: Vec::new(),
        }
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// Current depth in words
    pub fn depth(&self) -> usize {
        self.frame_words + self.pushed_words
    }

    pub fn pushed_words(&self) -> usize {
        self.pushed_words
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_loaded(&self, reg: Reg) -> bool {
        self.loaded & (1 << reg.index()) != 0
    }

    pub fn stack_maps(&self) -> &[StackMapEntry] {
        &self.stack_maps
    }

    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            max_stack_words: self.max_stack_words,
            param_count: self.param_count,
            full_calls: self.full_calls,
            leaf_calls: self.leaf_calls,
            final_depth: self.depth(),
        }
    }

    fn words_for(&self, bytes: usize) -> usize {
        bytes.div_ceil(self.word_size)
    }

    fn define(&mut self, reg: Reg) {
        self.loaded |= 1 << reg.index();
    }

    fn clobber_volatile(&mut self) {
        for reg in ARGUMENT_REGISTERS.iter().chain([Reg::Tmp, Reg::Ret].iter()) {
            self.loaded &= !(1 << reg.index());
        }
    }

    fn grow(&mut self) {
        self.max_stack_words = self.max_stack_words.max(self.depth());
    }

    fn require_frame(&self, what: &str) {
        assert!(self.entered, "{} outside a frame", what);
    }

    fn require_not_staging(&self, what: &str) {
        assert!(
            self.outgoing.is_none(),
            "{} while staging runtime call arguments",
            what
        );
    }

    /// Called before every instruction
    pub fn check_emit(&self) {
        assert!(!self.terminated, "emission after ret");
    }

    // ===== Frame =====

    pub fn enter(&mut self, frame_size: usize) {
        assert!(!self.entered, "enter inside an open frame");
        self.entered = true;
        self.frame_words = self.words_for(frame_size);
        self.aligned = false;
        self.grow();
    }

    pub fn leave(&mut self) {
        self.require_frame("leave");
        self.require_not_staging("leave");
        assert!(
            self.pushed_words == 0,
            "leave with {} words still pushed",
            self.pushed_words
        );
        self.entered = false;
        self.frame_words = 0;
        self.aligned = false;
    }

    pub fn ret(&mut self) {
        assert!(
            !self.entered && self.depth() == 0,
            "ret with an unbalanced frame ({} words)",
            self.depth()
        );
        assert!(self.is_loaded(Reg::Ret), "ret without a value in {:?}", Reg::Ret);
        self.terminated = true;
    }

    /// Reserve scratch space and align the stack; returns the words added
    pub fn reserve_aligned_frame_space(&mut self, bytes: usize) -> usize {
        self.require_frame("reserve_aligned_frame_space");
        self.require_not_staging("reserve_aligned_frame_space");
        let depth = self.depth() + self.words_for(bytes);
        let padded = depth.next_multiple_of(self.align_words);
        let words = padded - self.depth();
        self.frame_words += words;
        self.aligned = true;
        self.grow();
        words
    }

    // ===== Registers =====

    pub fn load(&mut self, dst: Reg) {
        self.define(dst);
    }

    pub fn load_argument(&mut self, dst: Reg, index: usize) {
        self.param_count = self.param_count.max(index + 1);
        self.define(dst);
    }

    // ===== Stack =====

    pub fn push(&mut self) {
        self.require_frame("push");
        self.pushed_words += 1;
        self.aligned = false;
        self.grow();
    }

    pub fn push_register(&mut self, src: Reg) {
        assert!(self.is_loaded(src), "push of unloaded register {:?}", src);
        self.push();
    }

    pub fn push_result_slot(&mut self) {
        self.require_not_staging("push_result_slot");
        self.push();
        self.outgoing = Some(self.depth() - 1);
    }

    pub fn pop(&mut self, dst: Reg) {
        self.require_not_staging("pop");
        assert!(self.pushed_words > 0, "pop below the frame");
        self.pushed_words -= 1;
        self.aligned = false;
        self.define(dst);
    }

    pub fn drop_slots(&mut self, count: usize) {
        self.require_not_staging("drop");
        assert!(
            count <= self.pushed_words,
            "drop of {} slots below the frame ({} pushed)",
            count,
            self.pushed_words
        );
        self.pushed_words -= count;
        self.aligned = false;
    }

    // ===== Calls =====

    /// Check a runtime call against the frame; returns the argument count
    pub fn call_runtime(&mut self, entry: &RuntimeEntry, instr_index: usize) -> usize {
        self.require_frame("call_runtime");
        let argc = match entry.kind() {
            RuntimeEntryKind::Full => self.full_call(entry, instr_index),
            RuntimeEntryKind::Leaf => self.leaf_call(entry),
        };
        self.clobber_volatile();
        if entry.is_leaf() {
            self.define(Reg::Ret);
        }
        argc
    }

    fn full_call(&mut self, entry: &RuntimeEntry, instr_index: usize) -> usize {
        assert!(
            self.is_loaded(Reg::Ctx),
            "full runtime call to {} without the context register loaded",
            entry.name()
        );
        let Some(result_depth) = self.outgoing.take() else {
            panic!("full runtime call to {} without a result slot", entry.name());
        };
        let argc = self.depth() - result_depth - 1;
        assert_eq!(
            argc,
            entry.arity(),
            "runtime call to {} expects {} arguments, {} pushed",
            entry.name(),
            entry.arity(),
            argc
        );

        let live_slots = std::iter::once(SlotKind::Result)
            .chain((0..argc).map(SlotKind::Argument))
            .map(|kind| LiveSlot {
                kind,
                location: PointerLocation::StackOffset(slot_offset(kind, argc, self.word_size) as i32),
            })
            .collect();
        self.stack_maps.push(StackMapEntry {
            instr_index,
            entry: entry.name(),
            live_slots,
        });
        self.full_calls += 1;
        argc
    }

    fn leaf_call(&mut self, entry: &RuntimeEntry) -> usize {
        self.require_not_staging("leaf runtime call");
        assert!(
            self.aligned,
            "leaf runtime call to {} on an unaligned frame",
            entry.name()
        );
        assert!(
            entry.arity() <= self.argument_registers,
            "leaf runtime call to {} takes {} arguments, only {} argument registers",
            entry.name(),
            entry.arity(),
            self.argument_registers
        );
        for &reg in &ARGUMENT_REGISTERS[..entry.arity()] {
            assert!(
                self.is_loaded(reg),
                "leaf runtime call to {} reads {:?} which was not loaded",
                entry.name(),
                reg
            );
        }
        self.leaf_calls += 1;
        entry.arity()
    }
}
