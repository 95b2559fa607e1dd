//! Stub generators for runtime entry calls
//!
//! Both generators emit a fixed sequence around a single runtime call. The
//! Full variant passes boxed values on the stack through the trampoline; the
//! Leaf variant passes raw bits in argument registers and calls the target
//! directly.

use std::sync::Arc;

use crate::jit::assembler::{Assembler, Reg};
use crate::runtime::entry::{RuntimeEntry, RuntimeEntryKind};
use crate::vm::value::Value;

/// Where a stub takes an operand from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Constant embedded in the code
    Object(Value),
    /// Positional argument of the invocation
    Argument(usize),
}

fn check_operands(entry: &RuntimeEntry, kind: RuntimeEntryKind, operands: &[Operand]) {
    assert_eq!(
        entry.kind(),
        kind,
        "{} is a {} runtime entry",
        entry.name(),
        entry.kind()
    );
    assert_eq!(
        operands.len(),
        entry.arity(),
        "{} expects {} operands, got {}",
        entry.name(),
        entry.arity(),
        operands.len()
    );
}

/// Stub calling a Full entry with `operands` and returning its result
///
/// # Panics
///
/// Panics if `entry` is not a Full entry or the operand count differs from
/// its arity.
pub fn generate_call_runtime_stub(asm: &mut Assembler, entry: &Arc<RuntimeEntry>, operands: &[Operand]) {
    check_operands(entry, RuntimeEntryKind::Full, operands);

    asm.enter(0).load_context().push_result_slot();
    for operand in operands {
        match *operand {
            Operand::Object(value) => {
                asm.push_object(value);
            }
            Operand::Argument(index) => {
                asm.load_argument(Reg::Tmp, index).push_register(Reg::Tmp);
            }
        }
    }
    asm.call_runtime(entry)
        .drop_slots(entry.arity())
        .pop_register(Reg::Ret)
        .leave()
        .ret();
}

/// Stub calling a Leaf entry with `operands` in the argument registers
///
/// # Panics
///
/// Panics if `entry` is not a Leaf entry or the operand count differs from
/// its arity.
pub fn generate_call_leaf_runtime_stub(asm: &mut Assembler, entry: &Arc<RuntimeEntry>, operands: &[Operand]) {
    check_operands(entry, RuntimeEntryKind::Leaf, operands);

    asm.enter(0).reserve_aligned_frame_space(0);
    for (i, operand) in operands.iter().enumerate() {
        let reg = Reg::argument(i);
        match *operand {
            Operand::Object(value) => asm.load_object(reg, value),
            Operand::Argument(index) => asm.load_argument(reg, index),
        };
    }
    asm.call_runtime(entry).leave().ret();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::assembler::Instr;
    use crate::jit::backend::traits::{TargetArch, TargetInfo};
    use crate::runtime::registry::RuntimeEntryRegistry;

    fn assembler() -> Assembler {
        Assembler::new(
            "stub",
            TargetInfo {
                arch: TargetArch::X86_64,
                pointer_size: 8,
            },
        )
    }

    #[test]
    fn test_full_stub_shape() {
        let registry = RuntimeEntryRegistry::with_builtins();
        let mut asm = assembler();
        generate_call_runtime_stub(
            &mut asm,
            &registry.lookup("TestSmiSub"),
            &[Operand::Object(Value::smi(10)), Operand::Argument(0)],
        );
        let listing: Vec<String> = asm.instructions().iter().map(|i| i.to_string()).collect();
        assert_eq!(
            listing,
            vec![
                "enter 0",
                "load_context ctx",
                "push_result_slot",
                "push_object smi(10)",
                "load_argument tmp, arg0",
                "push tmp",
                "call_runtime TestSmiSub ; full, 2 args",
                "drop 2",
                "pop ret",
                "leave",
                "ret",
            ]
        );
        assert!(asm.frame().summary().is_balanced());
    }

    #[test]
    fn test_leaf_stub_shape() {
        let registry = RuntimeEntryRegistry::with_builtins();
        let mut asm = assembler();
        generate_call_leaf_runtime_stub(
            &mut asm,
            &registry.lookup("TestLeafSmiAdd"),
            &[Operand::Object(Value::smi(10)), Operand::Object(Value::smi(20))],
        );
        let instrs = asm.instructions();
        assert!(matches!(instrs[1], Instr::ReserveAlignedFrameSpace { bytes: 0, .. }));
        assert!(matches!(instrs[2], Instr::LoadObject { dst: Reg::Arg0, .. }));
        assert!(matches!(instrs[3], Instr::LoadObject { dst: Reg::Arg1, .. }));
        assert_eq!(instrs.len(), 7);
        assert!(asm.frame().stack_maps().is_empty());
    }

    #[test]
    #[should_panic(expected = "TestSmiSub expects 2 operands, got 1")]
    fn test_full_stub_arity_mismatch() {
        let registry = RuntimeEntryRegistry::with_builtins();
        generate_call_runtime_stub(&mut assembler(), &registry.lookup("TestSmiSub"), &[Operand::Argument(0)]);
    }

    #[test]
    #[should_panic(expected = "TestLeafSmiAdd is a leaf runtime entry")]
    fn test_full_stub_rejects_leaf_entry() {
        let registry = RuntimeEntryRegistry::with_builtins();
        generate_call_runtime_stub(
            &mut assembler(),
            &registry.lookup("TestLeafSmiAdd"),
            &[Operand::Argument(0), Operand::Argument(1)],
        );
    }
}
