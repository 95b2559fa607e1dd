//! Mark-sweep garbage collector
//!
//! Objects carry no outgoing references, so marking is a single pass over
//! the root set followed by a sweep of the object table.

use std::time::{Duration, Instant};

use super::heap::Heap;
use super::roots::RootSet;

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,
    /// Total objects freed
    pub objects_freed: usize,
    /// Total pause time across all collections
    pub total_pause_time: Duration,
    /// Roots seen by the last collection
    pub last_root_count: usize,
    /// Objects marked in last collection
    pub last_marked_count: usize,
    /// Objects freed in last collection
    pub last_freed_count: usize,
    /// Live objects after last collection
    pub live_objects: usize,
}

impl GcStats {
    fn update(&mut self, pause_time: Duration, roots: usize, marked: usize, freed: usize, live: usize) {
        self.collections += 1;
        self.objects_freed += freed;
        self.total_pause_time += pause_time;
        self.last_root_count = roots;
        self.last_marked_count = marked;
        self.last_freed_count = freed;
        self.live_objects = live;
    }
}

/// Run one collection over `heap` and record it in `stats`
///
/// Returns the number of objects freed.
pub fn collect(heap: &mut Heap, roots: &RootSet, stats: &mut GcStats) -> usize {
    let start = Instant::now();

    heap.clear_marks();
    let marked = roots.iter().filter(|root| heap.mark(*root)).count();
    let freed = heap.sweep();

    stats.update(start.elapsed(), roots.len(), marked, freed, heap.live_objects());
    log::debug!(
        "gc #{}: {} roots, {} marked, {} freed, {} live",
        stats.collections,
        roots.len(),
        marked,
        freed,
        heap.live_objects()
    );
    freed
}
