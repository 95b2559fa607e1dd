//! `rtcall run`: call a runtime entry through a freshly generated stub.

use anyhow::{ensure, Context};
use rtcall_engine::{HarnessConfig, RuntimeEntryKind, Value};

pub fn execute(config: HarnessConfig, name: &str, args: &[i64]) -> anyhow::Result<()> {
    let mut harness = super::harness(config)?;
    let entry = super::find_entry(&harness, name)?;
    ensure!(
        args.len() == entry.arity(),
        "{} expects {} arguments, got {}",
        name,
        entry.arity(),
        args.len()
    );

    let operands = args
        .iter()
        .map(|&arg| match entry.kind() {
            RuntimeEntryKind::Full => Ok(harness.new_integer(arg)),
            // Leaf entries receive raw bits and only take Smis
            RuntimeEntryKind::Leaf => {
                Value::try_smi(arg).with_context(|| format!("{} does not fit in a smi", arg))
            }
        })
        .collect::<anyhow::Result<Vec<Value>>>()?;

    log::info!("calling {} ({}) with {:?}", name, entry.kind(), args);
    let result = harness.call_entry(name, &operands)?;
    println!("{}", harness.isolate().describe(result));
    Ok(())
}
