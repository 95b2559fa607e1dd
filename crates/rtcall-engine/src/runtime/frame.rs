//! Runtime frames of in-flight Full calls
//!
//! A Full stub pushes a result slot followed by its arguments, so at the call
//! the stack looks like this (stack grows down, `argv` is the stack pointer):
//!
//! ```text
//! argv[argc]       result slot     (pushed first)
//! argv[argc - 1]   argument 0
//! ...
//! argv[0]          argument argc-1 (pushed last)
//! ```
//!
//! The trampoline publishes this region to the isolate for the duration of
//! the call. The collector reads it through raw pointers only, and so does
//! `NativeArguments`, so no Rust reference to the slots is ever held.

use std::ptr;

use crate::vm::isolate::Isolate;
use crate::vm::value::Value;

/// Role of a tracked stack slot at a Full call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Slot the callee writes its result into
    Result,
    /// Positional argument (0-based, left to right)
    Argument(usize),
}

/// Byte offset of `kind` from the stack pointer at the call
pub fn slot_offset(kind: SlotKind, argc: usize, word_size: usize) -> usize {
    match kind {
        SlotKind::Result => argc * word_size,
        SlotKind::Argument(i) => {
            assert!(i < argc, "argument {} out of range for {} arguments", i, argc);
            (argc - 1 - i) * word_size
        }
    }
}

/// Tracked stack region of one Full call
#[derive(Debug, Clone, Copy)]
pub struct RuntimeFrame {
    entry: &'static str,
    argv: *mut u64,
    argc: usize,
}

impl RuntimeFrame {
    /// # Safety
    ///
    /// `argv` must point at `argc + 1` writable words laid out as described in
    /// the module docs, valid for as long as the frame is used.
    pub unsafe fn new(entry: &'static str, argv: *mut u64, argc: usize) -> Self {
        Self { entry, argv, argc }
    }

    pub fn entry_name(&self) -> &'static str {
        self.entry
    }

    pub fn arg_count(&self) -> usize {
        self.argc
    }

    fn slot_ptr(&self, kind: SlotKind) -> *mut u64 {
        let index = slot_offset(kind, self.argc, 1);
        // Safety: index <= argc, within the region promised to `new`
        unsafe { self.argv.add(index) }
    }

    pub fn read(&self, kind: SlotKind) -> Value {
        Value::from_bits(unsafe { ptr::read(self.slot_ptr(kind)) })
    }

    pub fn write(&self, kind: SlotKind, value: Value) {
        unsafe { ptr::write(self.slot_ptr(kind), value.to_bits()) }
    }

    /// Every tracked slot, result slot first, with its offset from `argv`
    pub fn live_slots(&self) -> Vec<(SlotKind, usize, Value)> {
        let word = std::mem::size_of::<u64>();
        std::iter::once(SlotKind::Result)
            .chain((0..self.argc).map(SlotKind::Argument))
            .map(|kind| (kind, slot_offset(kind, self.argc, word), self.read(kind)))
            .collect()
    }
}

/// Arguments of a Full runtime entry call
///
/// Gives the entry its isolate, read access to the pushed arguments and write
/// access to the result slot.
pub struct NativeArguments<'a> {
    isolate: &'a mut Isolate,
    frame: RuntimeFrame,
}

impl<'a> NativeArguments<'a> {
    pub(crate) fn new(isolate: &'a mut Isolate, frame: RuntimeFrame) -> Self {
        Self { isolate, frame }
    }

    pub fn arg_count(&self) -> usize {
        self.frame.argc
    }

    /// Positional argument `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn arg_at(&self, index: usize) -> Value {
        self.frame.read(SlotKind::Argument(index))
    }

    /// Store the call's result
    pub fn set_return(&mut self, value: Value) {
        self.frame.write(SlotKind::Result, value);
    }

    /// Current content of the result slot
    pub fn return_value(&self) -> Value {
        self.frame.read(SlotKind::Result)
    }

    pub fn frame(&self) -> &RuntimeFrame {
        &self.frame
    }

    pub fn isolate(&self) -> &Isolate {
        &*self.isolate
    }

    pub fn isolate_mut(&mut self) -> &mut Isolate {
        &mut *self.isolate
    }
}
