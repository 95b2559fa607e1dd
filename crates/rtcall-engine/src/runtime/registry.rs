//! Runtime entry registry
//!
//! Entries are registered during an initialization phase through
//! `RuntimeEntryRegistryBuilder`, which is then frozen into an immutable
//! `RuntimeEntryRegistry`. The frozen registry is shared by `Arc` and passed
//! explicitly to every isolate; there is no global table.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::builtins;
use super::entry::RuntimeEntry;

/// Registry under construction
#[derive(Default)]
pub struct RuntimeEntryRegistryBuilder {
    entries: Vec<Arc<RuntimeEntry>>,
    by_name: FxHashMap<&'static str, usize>,
}

impl RuntimeEntryRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry
    ///
    /// # Panics
    ///
    /// Panics if an entry with the same name is already registered.
    pub fn register(&mut self, entry: RuntimeEntry) -> Arc<RuntimeEntry> {
        let name = entry.name();
        assert!(
            !self.by_name.contains_key(name),
            "runtime entry {} registered twice",
            name
        );
        let entry = Arc::new(entry);
        self.by_name.insert(name, self.entries.len());
        self.entries.push(entry.clone());
        entry
    }

    /// Register the builtin entries
    pub fn register_builtins(&mut self) -> &mut Self {
        builtins::register_all(self);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Freeze the registry
    pub fn build(self) -> RuntimeEntryRegistry {
        log::debug!("runtime entry registry frozen with {} entries", self.entries.len());
        RuntimeEntryRegistry {
            entries: self.entries,
            by_name: self.by_name,
        }
    }
}

/// Immutable runtime entry table
pub struct RuntimeEntryRegistry {
    entries: Vec<Arc<RuntimeEntry>>,
    by_name: FxHashMap<&'static str, usize>,
}

impl RuntimeEntryRegistry {
    pub fn builder() -> RuntimeEntryRegistryBuilder {
        RuntimeEntryRegistryBuilder::new()
    }

    /// Registry containing only the builtin entries
    pub fn with_builtins() -> Self {
        let mut builder = RuntimeEntryRegistryBuilder::new();
        builder.register_builtins();
        builder.build()
    }

    /// Look up an entry by name
    ///
    /// # Panics
    ///
    /// Panics if no entry with that name is registered.
    pub fn lookup(&self, name: &str) -> Arc<RuntimeEntry> {
        self.get(name)
            .unwrap_or_else(|| panic!("unknown runtime entry: {}", name))
    }

    /// Look up an entry by name without failing
    pub fn get(&self, name: &str) -> Option<Arc<RuntimeEntry>> {
        self.by_name.get(name).map(|&i| self.entries[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RuntimeEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RuntimeEntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEntryRegistry")
            .field("count", &self.entries.len())
            .finish()
    }
}
