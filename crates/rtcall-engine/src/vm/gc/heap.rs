//! Object table heap
//!
//! Objects live in a table indexed by the payload of a heap `Value`. Slot 0
//! holds `null` and is never freed. Freed slots are recycled through a free
//! list, so indices are stable for the lifetime of an object and the
//! collector never moves anything.

use crate::vm::object::HeapObject;
use crate::vm::value::Value;

/// Default number of allocations between collections
pub const DEFAULT_GC_THRESHOLD: usize = 1024;

struct HeapSlot {
    object: Option<HeapObject>,
    marked: bool,
}

/// Heap allocator for GC-managed objects
pub struct Heap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    live_objects: usize,
    /// Allocations since the last collection
    allocated_since_gc: usize,
    /// Allocation count that triggers a collection
    threshold: usize,
}

impl Heap {
    /// Create a heap containing only `null`
    pub fn new(threshold: usize) -> Self {
        Self {
            slots: vec![HeapSlot {
                object: Some(HeapObject::Null),
                marked: false,
            }],
            free_list: Vec::new(),
            live_objects: 1,
            allocated_since_gc: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the next allocation should be preceded by a collection
    pub fn should_collect(&self) -> bool {
        self.allocated_since_gc >= self.threshold
    }

    /// Allocate an object and return a reference to it
    ///
    /// Never collects; the isolate decides when to collect before calling this.
    pub fn allocate(&mut self, object: HeapObject) -> Value {
        assert!(
            !matches!(object, HeapObject::Null),
            "null is a singleton and cannot be allocated"
        );
        self.allocated_since_gc += 1;
        self.live_objects += 1;

        let slot = HeapSlot {
            object: Some(object),
            marked: false,
        };
        match self.free_list.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                Value::heap(index)
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("object table exhausted");
                self.slots.push(slot);
                Value::heap(index)
            }
        }
    }

    /// Resolve a heap reference
    pub fn get(&self, value: Value) -> Option<&HeapObject> {
        let index = value.heap_index()? as usize;
        self.slots.get(index)?.object.as_ref()
    }

    /// Check whether a heap reference points at a live object
    pub fn is_live(&self, value: Value) -> bool {
        self.get(value).is_some()
    }

    /// Number of live objects, including `null`
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    pub(super) fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            slot.marked = false;
        }
    }

    /// Mark the object referenced by `value`; returns true if newly marked
    pub(super) fn mark(&mut self, value: Value) -> bool {
        let Some(index) = value.heap_index() else {
            return false;
        };
        match self.slots.get_mut(index as usize) {
            Some(slot) if slot.object.is_some() && !slot.marked => {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Free every unmarked object except `null`; returns the number freed
    pub(super) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.object.is_some() && !slot.marked {
                slot.object = None;
                self.free_list.push(index as u32);
                freed += 1;
            }
        }
        self.live_objects -= freed;
        self.allocated_since_gc = 0;
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(DEFAULT_GC_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_preallocated() {
        let heap = Heap::default();
        assert_eq!(heap.get(Value::null()), Some(&HeapObject::Null));
        assert_eq!(heap.live_objects(), 1);
    }

    #[test]
    fn test_allocate_and_get() {
        let mut heap = Heap::default();
        let v = heap.allocate(HeapObject::Mint(i64::MAX));
        assert!(v.is_collectable());
        assert_eq!(heap.get(v), Some(&HeapObject::Mint(i64::MAX)));
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_smi_is_not_a_heap_reference() {
        let heap = Heap::default();
        assert_eq!(heap.get(Value::smi(3)), None);
    }

    #[test]
    fn test_threshold() {
        assert_eq!(Heap::new(0).threshold(), 1);

        let mut heap = Heap::new(2);
        assert_eq!(heap.threshold(), 2);
        assert!(!heap.should_collect());
        heap.allocate(HeapObject::Mint(1));
        heap.allocate(HeapObject::Mint(2));
        assert!(heap.should_collect());
    }

    #[test]
    fn test_sweep_recycles_slots() {
        let mut heap = Heap::default();
        let a = heap.allocate(HeapObject::Mint(1));
        let b = heap.allocate(HeapObject::Mint(2));

        heap.clear_marks();
        heap.mark(b);
        assert_eq!(heap.sweep(), 1);
        assert!(!heap.is_live(a));
        assert!(heap.is_live(b));
        assert!(heap.is_live(Value::null()));

        // The freed slot is reused
        let c = heap.allocate(HeapObject::Mint(3));
        assert_eq!(c.heap_index(), a.heap_index());
    }
}
