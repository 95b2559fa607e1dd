//! Native signatures of stub code and of the functions it calls
//!
//! Every word crossing these boundaries is an `i64`: raw value bits,
//! pointers and counts alike.

use cranelift_codegen::ir::{self, types, AbiParam, InstBuilder};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::FunctionBuilder;

use crate::vm::value::Value;

/// Bits of `null`, the initial content of a result slot
pub const NULL_BITS: u64 = Value::null().to_bits();

/// Stack slot alignment (log2 bytes)
pub const STACK_SLOT_ALIGN_SHIFT: u8 = 4;

/// `StubEntryFn`: (isolate, args_ptr, arg_count) -> value
pub fn stub_entry_signature(call_conv: CallConv) -> ir::Signature {
    let mut sig = ir::Signature::new(call_conv);
    sig.params.push(AbiParam::new(types::I64)); // isolate
    sig.params.push(AbiParam::new(types::I64)); // args_ptr
    sig.params.push(AbiParam::new(types::I64)); // arg_count
    sig.returns.push(AbiParam::new(types::I64)); // value bits
    sig
}

/// `call_to_runtime`: (isolate, entry, argv, argc)
pub fn call_to_runtime_signature(call_conv: CallConv) -> ir::Signature {
    let mut sig = ir::Signature::new(call_conv);
    for _ in 0..4 {
        sig.params.push(AbiParam::new(types::I64));
    }
    sig
}

/// Leaf target taking `arity` raw words and returning one
pub fn leaf_signature(call_conv: CallConv, arity: usize) -> ir::Signature {
    let mut sig = ir::Signature::new(call_conv);
    for _ in 0..arity {
        sig.params.push(AbiParam::new(types::I64));
    }
    sig.returns.push(AbiParam::new(types::I64));
    sig
}

/// Emit a value constant
pub fn emit_value(builder: &mut FunctionBuilder<'_>, value: Value) -> ir::Value {
    builder.ins().iconst(types::I64, value.to_bits() as i64)
}

/// Emit an address constant
pub fn emit_address(builder: &mut FunctionBuilder<'_>, address: usize) -> ir::Value {
    builder.ins().iconst(types::I64, address as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_bits_match_engine() {
        assert_eq!(NULL_BITS, 1);
        assert_eq!(Value::from_bits(NULL_BITS), Value::null());
    }

    #[test]
    fn test_signatures() {
        let conv = CallConv::SystemV;
        let entry = stub_entry_signature(conv);
        assert_eq!(entry.params.len(), 3);
        assert_eq!(entry.returns.len(), 1);

        let trampoline = call_to_runtime_signature(conv);
        assert_eq!(trampoline.params.len(), 4);
        assert!(trampoline.returns.is_empty());

        assert_eq!(leaf_signature(conv, 2).params.len(), 2);
        assert_eq!(leaf_signature(conv, 0).returns.len(), 1);
    }
}
