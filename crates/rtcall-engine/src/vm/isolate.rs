//! Isolate: the runtime instance generated code runs against
//!
//! An isolate owns the heap, the symbol table, the zone stack, the runtime
//! frames of in-flight Full calls and the table of registered functions. Stub
//! code receives a raw pointer to it in the context register.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::runtime::frame::RuntimeFrame;
use crate::runtime::registry::RuntimeEntryRegistry;
use crate::vm::function::{Function, FunctionTable};
use crate::vm::gc::{self, GcStats, Heap, RootSet, RootSource};
use crate::vm::gc::heap::DEFAULT_GC_THRESHOLD;
use crate::vm::object::{HeapObject, ValueKind};
use crate::vm::symbols::{Symbol, SymbolTable};
use crate::vm::value::Value;
use crate::vm::zone::Zone;

/// Configuration for an isolate
#[derive(Debug, Clone)]
pub struct IsolateConfig {
    /// Allocations between automatic collections (default: 1024)
    pub gc_threshold: usize,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        IsolateConfig {
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

/// A runtime instance
pub struct Isolate {
    registry: Arc<RuntimeEntryRegistry>,
    heap: Heap,
    gc_stats: GcStats,
    symbols: SymbolTable,
    /// Zone stack; index 0 is the base zone and is never closed
    zones: Vec<Zone>,
    /// Frames of in-flight Full calls, innermost last
    frames: Vec<RuntimeFrame>,
    functions: FunctionTable,
    /// Panic raised inside a Full entry, waiting to be resumed
    pending_panic: Option<Box<dyn Any + Send>>,
}

impl Isolate {
    pub fn new(registry: Arc<RuntimeEntryRegistry>) -> Self {
        Self::with_config(registry, IsolateConfig::default())
    }

    pub fn with_config(registry: Arc<RuntimeEntryRegistry>, config: IsolateConfig) -> Self {
        Isolate {
            registry,
            heap: Heap::new(config.gc_threshold),
            gc_stats: GcStats::default(),
            symbols: SymbolTable::new(),
            zones: vec![Zone::new()],
            frames: Vec::new(),
            functions: FunctionTable::new(),
            pending_panic: None,
        }
    }

    pub fn registry(&self) -> &Arc<RuntimeEntryRegistry> {
        &self.registry
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn gc_stats(&self) -> &GcStats {
        &self.gc_stats
    }

    // ===== Symbols =====

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        self.symbols.resolve(symbol)
    }

    // ===== Zones =====

    /// Run `f` inside a fresh zone
    ///
    /// Every handle created by `f` is released when it returns, or when it
    /// unwinds.
    pub fn with_zone<R>(&mut self, f: impl FnOnce(&mut Isolate) -> R) -> R {
        let depth = self.open_zone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.close_zone(depth);
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Push a zone and return the depth to pass to `close_zone`
    pub(crate) fn open_zone(&mut self) -> usize {
        let depth = self.zones.len();
        self.zones.push(Zone::new());
        depth
    }

    /// Drop every zone opened at or above `depth`
    pub(crate) fn close_zone(&mut self, depth: usize) {
        assert!(depth > 0, "the base zone cannot be closed");
        self.zones.truncate(depth);
    }

    /// Number of open zones, including the base zone
    pub fn zone_depth(&self) -> usize {
        self.zones.len()
    }

    /// Root `value` in the innermost zone
    pub fn new_handle(&mut self, value: Value) -> Value {
        match self.zones.last_mut() {
            Some(zone) => zone.add(value),
            None => unreachable!("base zone closed"),
        }
    }

    // ===== Allocation =====

    /// Allocate `object`, collecting first when the threshold is reached
    ///
    /// The new object is not rooted; callers store it somewhere the collector
    /// sees before allocating again.
    pub fn allocate(&mut self, object: HeapObject) -> Value {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.allocate(object)
    }

    /// Integer `value` as a Smi, or boxed as a Mint when it does not fit
    pub fn new_integer(&mut self, value: i64) -> Value {
        match Value::try_smi(value) {
            Some(smi) => smi,
            None => self.allocate(HeapObject::Mint(value)),
        }
    }

    /// Integer held by `value`, if it is one
    pub fn integer_value(&self, value: Value) -> Option<i64> {
        if let Some(v) = value.as_smi() {
            return Some(v);
        }
        match self.heap.get(value)? {
            HeapObject::Mint(v) => Some(*v),
            HeapObject::Null => None,
        }
    }

    /// Integer held by `value`
    ///
    /// # Panics
    ///
    /// Panics if `value` is not an integer.
    pub fn checked_integer(&self, value: Value) -> i64 {
        self.integer_value(value)
            .unwrap_or_else(|| panic!("expected an integer, got {}", self.describe(value)))
    }

    /// Kind of `value` after resolving heap references
    ///
    /// # Panics
    ///
    /// Panics on a reference to a freed object.
    pub fn kind_of(&self, value: Value) -> ValueKind {
        if value.is_smi() {
            return ValueKind::Smi;
        }
        match self.heap.get(value) {
            Some(HeapObject::Null) => ValueKind::Null,
            Some(HeapObject::Mint(_)) => ValueKind::Mint,
            None => panic!("dangling reference {:?}", value),
        }
    }

    /// Short description of `value` for diagnostics
    pub fn describe(&self, value: Value) -> String {
        if value.is_smi() {
            return format!("smi {}", value);
        }
        match self.heap.get(value) {
            Some(HeapObject::Null) => "null".to_string(),
            Some(object) => format!("{} {}", object.type_name(), object),
            None => format!("freed {:?}", value),
        }
    }

    // ===== Garbage collection =====

    /// Every root the collector would currently start from
    pub fn roots(&self) -> RootSet {
        let mut roots = RootSet::new();
        for (depth, zone) in self.zones.iter().enumerate() {
            for &handle in zone.handles() {
                roots.add(RootSource::Zone(depth), handle);
            }
        }
        for (depth, frame) in self.frames.iter().enumerate() {
            for (_, _, value) in frame.live_slots() {
                roots.add(RootSource::RuntimeFrame(depth), value);
            }
        }
        for function in self.functions.iter() {
            if let Some(code) = function.code() {
                for &value in code.object_pool() {
                    roots.add(RootSource::CodePool, value);
                }
            }
        }
        roots
    }

    /// Run a full collection; returns the number of objects freed
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self.roots();
        gc::collect(&mut self.heap, &roots, &mut self.gc_stats)
    }

    // ===== Runtime frames =====

    pub(crate) fn push_runtime_frame(&mut self, frame: RuntimeFrame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_runtime_frame(&mut self) -> Option<RuntimeFrame> {
        self.frames.pop()
    }

    /// Frames of the Full calls currently in flight, innermost last
    pub fn runtime_frames(&self) -> &[RuntimeFrame] {
        &self.frames
    }

    pub fn runtime_frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ===== Panics raised in runtime entries =====

    pub(crate) fn set_pending_panic(&mut self, payload: Box<dyn Any + Send>) {
        // The first panic wins; a stub keeps running until it returns
        if self.pending_panic.is_none() {
            self.pending_panic = Some(payload);
        }
    }

    pub(crate) fn take_pending_panic(&mut self) -> Option<Box<dyn Any + Send>> {
        self.pending_panic.take()
    }

    pub fn has_pending_panic(&self) -> bool {
        self.pending_panic.is_some()
    }

    // ===== Functions =====

    /// Register a function so it can be looked up and its code stays rooted
    ///
    /// # Panics
    ///
    /// Panics if a function with the same name is already registered.
    pub fn register_fake_function(&mut self, function: Arc<Function>) {
        log::debug!("registering function {}", function.name());
        self.functions.insert(function);
    }

    pub fn lookup_function(&self, name: &str) -> Option<Arc<Function>> {
        let symbol = self.symbols.get(name)?;
        self.functions.get(symbol).cloned()
    }

    pub fn unregister_function(&mut self, name: &str) -> Option<Arc<Function>> {
        let symbol = self.symbols.get(name)?;
        self.functions.remove(symbol)
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

impl std::fmt::Debug for Isolate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Isolate")
            .field("live_objects", &self.heap.live_objects())
            .field("zones", &self.zones.len())
            .field("frames", &self.frames.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolate() -> Isolate {
        Isolate::new(Arc::new(RuntimeEntryRegistry::with_builtins()))
    }

    #[test]
    fn test_new_integer_representation() {
        let mut iso = isolate();
        let small = iso.new_integer(-10);
        assert_eq!(small, Value::smi(-10));
        assert_eq!(iso.kind_of(small), ValueKind::Smi);

        let big = iso.new_integer(i64::MIN);
        assert_eq!(iso.kind_of(big), ValueKind::Mint);
        assert_eq!(iso.checked_integer(big), i64::MIN);
    }

    #[test]
    #[should_panic(expected = "expected an integer, got null")]
    fn test_checked_integer_rejects_null() {
        isolate().checked_integer(Value::null());
    }

    #[test]
    fn test_zone_handles_released_on_close() {
        let mut iso = isolate();
        let value = iso.with_zone(|iso| {
            let v = iso.new_integer(i64::MAX);
            iso.new_handle(v);
            assert_eq!(iso.zone_depth(), 2);
            assert_eq!(iso.collect_garbage(), 0);
            v
        });
        assert_eq!(iso.zone_depth(), 1);
        assert_eq!(iso.collect_garbage(), 1);
        assert!(!iso.heap().is_live(value));
    }

    #[test]
    fn test_zone_closed_on_panic() {
        let mut iso = isolate();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            iso.with_zone(|_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(iso.zone_depth(), 1);
    }

    #[test]
    #[should_panic(expected = "the base zone cannot be closed")]
    fn test_base_zone_cannot_be_closed() {
        isolate().close_zone(0);
    }

    #[test]
    fn test_base_zone_roots_survive() {
        let mut iso = isolate();
        let v = iso.new_integer(i64::MAX);
        iso.new_handle(v);
        iso.collect_garbage();
        assert!(iso.heap().is_live(v));
        assert_eq!(iso.roots().from_source(RootSource::Zone(0)).count(), 1);
    }

    #[test]
    fn test_runtime_frame_slots_are_roots() {
        let mut iso = isolate();
        let arg = iso.new_integer(i64::MAX);
        let mut words = [arg.to_bits(), Value::null().to_bits()];
        let frame = unsafe { RuntimeFrame::new("Any", words.as_mut_ptr(), 1) };

        iso.push_runtime_frame(frame);
        iso.collect_garbage();
        assert!(iso.heap().is_live(arg));
        assert_eq!(iso.runtime_frame_depth(), 1);

        iso.pop_runtime_frame();
        iso.collect_garbage();
        assert!(!iso.heap().is_live(arg));
    }

    #[test]
    fn test_automatic_collection_at_threshold() {
        let registry = Arc::new(RuntimeEntryRegistry::with_builtins());
        let mut iso = Isolate::with_config(registry, IsolateConfig { gc_threshold: 4 });
        assert_eq!(iso.heap().threshold(), 4);
        for i in 0..8 {
            iso.new_integer(i64::MAX - i);
        }
        assert!(iso.gc_stats().collections >= 1);
    }

    #[test]
    fn test_first_pending_panic_wins() {
        let mut iso = isolate();
        iso.set_pending_panic(Box::new("first"));
        iso.set_pending_panic(Box::new("second"));
        let payload = iso.take_pending_panic().unwrap();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"first"));
        assert!(!iso.has_pending_panic());
    }
}
