//! Builtin runtime entries

use super::entry::{LeafFunction, RuntimeEntry};
use super::frame::NativeArguments;
use super::registry::RuntimeEntryRegistryBuilder;
use crate::vm::value::Value;

/// Name of the Full integer subtraction entry
pub const TEST_SMI_SUB: &str = "TestSmiSub";
/// Name of the Leaf Smi addition entry
pub const TEST_LEAF_SMI_ADD: &str = "TestLeafSmiAdd";

pub(super) fn register_all(builder: &mut RuntimeEntryRegistryBuilder) {
    builder.register(RuntimeEntry::full(TEST_SMI_SUB, 2, test_smi_sub));
    builder.register(RuntimeEntry::leaf(
        TEST_LEAF_SMI_ADD,
        LeafFunction::Args2(test_leaf_smi_add),
    ));
}

/// `left - right` on integers; the result is boxed when it leaves Smi range
fn test_smi_sub(args: &mut NativeArguments<'_>) {
    let left = args.isolate().checked_integer(args.arg_at(0));
    let right = args.isolate().checked_integer(args.arg_at(1));
    let result = args.isolate_mut().new_integer(left.wrapping_sub(right));
    args.set_return(result);
}

/// `left + right` on Smis, wrapping inside the Smi range
///
/// Operates on tagged bits directly: adding two Smis yields the tagged sum.
/// Callers must pass Smis; other operands produce an unspecified word.
extern "C" fn test_leaf_smi_add(left: u64, right: u64) -> u64 {
    Value::from_bits(left.wrapping_add(right)).to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_add_on_tagged_bits() {
        let sum = test_leaf_smi_add(Value::smi(10).to_bits(), Value::smi(20).to_bits());
        assert_eq!(Value::from_bits(sum), Value::smi(30));

        let neg = test_leaf_smi_add(Value::smi(-7).to_bits(), Value::smi(3).to_bits());
        assert_eq!(Value::from_bits(neg), Value::smi(-4));
    }

    #[test]
    fn test_leaf_add_wraps_in_smi_range() {
        let sum = test_leaf_smi_add(Value::smi(Value::SMI_MAX).to_bits(), Value::smi(1).to_bits());
        assert_eq!(Value::from_bits(sum), Value::smi(Value::SMI_MIN));
    }
}
