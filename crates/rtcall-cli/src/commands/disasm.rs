//! `rtcall disasm`: show the stub generated for a runtime entry.

use rtcall_engine::jit::stubs::{generate_call_leaf_runtime_stub, generate_call_runtime_stub, Operand};
use rtcall_engine::jit::backend::PointerLocation;
use rtcall_engine::{HarnessConfig, RuntimeEntryKind};

pub fn execute(config: HarnessConfig, name: &str, ir: bool) -> anyhow::Result<()> {
    let harness = super::harness(config)?;
    let entry = super::find_entry(&harness, name)?;

    let mut asm = harness.engine().new_assembler(format!("Stub_{}", name));
    let operands: Vec<Operand> = (0..entry.arity()).map(Operand::Argument).collect();
    match entry.kind() {
        RuntimeEntryKind::Full => generate_call_runtime_stub(&mut asm, &entry, &operands),
        RuntimeEntryKind::Leaf => generate_call_leaf_runtime_stub(&mut asm, &entry, &operands),
    }
    let code = harness.engine().finalize_code(&mut asm)?;

    print!("{}", code.disassemble());
    println!("native code: {} bytes", code.code_size());
    for map in code.stack_maps() {
        println!("stack map at {:04} ({}):", map.instr_index, map.entry);
        for slot in &map.live_slots {
            let PointerLocation::StackOffset(offset) = slot.location;
            println!("  {:?} at sp+{}", slot.kind, offset);
        }
    }
    if ir {
        println!();
        print!("{}", code.backend_ir());
    }
    Ok(())
}
