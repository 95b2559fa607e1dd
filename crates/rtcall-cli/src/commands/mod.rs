pub mod disasm;
pub mod list;
pub mod run;

use std::sync::Arc;

use anyhow::{bail, Context};
use rtcall_engine::{Harness, HarnessConfig, RuntimeEntry, RuntimeEntryRegistry};

pub fn registry() -> Arc<RuntimeEntryRegistry> {
    Arc::new(RuntimeEntryRegistry::with_builtins())
}

pub fn harness(config: HarnessConfig) -> anyhow::Result<Harness> {
    Harness::with_config(registry(), config).context("failed to set up the JIT")
}

/// Entry named `name`, with the list of known entries on failure
pub fn find_entry(harness: &Harness, name: &str) -> anyhow::Result<Arc<RuntimeEntry>> {
    match harness.registry().get(name) {
        Some(entry) => Ok(entry),
        None => {
            let known: Vec<&str> = harness.registry().iter().map(|e| e.name()).collect();
            bail!("unknown runtime entry {} (known: {})", name, known.join(", "))
        }
    }
}
