//! End-to-end stub call tests.
//!
//! Generates Full and Leaf runtime call stubs, finalizes them with Cranelift
//! and runs them through the harness and the uniform call path.
//! Organized in 5 categories:
//! 1. Builtin scenarios
//! 2. Property tests over integer pairs
//! 3. Operands from constants and invocation arguments
//! 4. Finalization and registration
//! 5. Result lifetime across scopes

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rtcall_engine::jit::stubs::{generate_call_leaf_runtime_stub, generate_call_runtime_stub, Operand};
use rtcall_engine::{CodegenError, Function, Harness, Reg, RuntimeEntryRegistry, Value, ValueKind};

fn harness() -> Harness {
    Harness::new(Arc::new(RuntimeEntryRegistry::with_builtins())).expect("host JIT")
}

// ============================================================================
// 1. Builtin scenarios
// ============================================================================

#[test]
fn test_call_runtime_smi_sub() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("Test_CallRuntimeStubCode", |_, asm| {
            generate_call_runtime_stub(
                asm,
                &sub,
                &[Operand::Object(Value::smi(10)), Operand::Object(Value::smi(20))],
            );
        })
        .unwrap();

    let result = harness.invoke(&stub, &[]);
    assert_eq!(harness.expect_smi(result), -10);
}

#[test]
fn test_call_leaf_runtime_smi_add() {
    let mut harness = harness();
    let add = harness.registry().lookup("TestLeafSmiAdd");
    let stub = harness
        .build_stub("Test_CallLeafRuntimeStubCode", |_, asm| {
            generate_call_leaf_runtime_stub(
                asm,
                &add,
                &[Operand::Object(Value::smi(10)), Operand::Object(Value::smi(20))],
            );
        })
        .unwrap();

    let result = harness.invoke(&stub, &[]);
    assert_eq!(harness.expect_smi(result), 30);
}

#[test]
fn test_convenience_calls() {
    let mut harness = harness();
    let sub = harness.call_runtime("TestSmiSub", &[Value::smi(10), Value::smi(20)]).unwrap();
    assert_eq!(harness.expect_smi(sub), -10);

    let add = harness.call_leaf_runtime("TestLeafSmiAdd", &[Value::smi(10), Value::smi(20)]).unwrap();
    assert_eq!(harness.expect_smi(add), 30);

    let by_kind = harness.call_entry("TestLeafSmiAdd", &[Value::smi(-4), Value::smi(1)]).unwrap();
    assert_eq!(harness.expect_smi(by_kind), -3);
}

#[test]
fn test_sub_result_leaves_smi_range() {
    let mut harness = harness();
    let result = harness
        .call_runtime("TestSmiSub", &[Value::smi(Value::SMI_MIN), Value::smi(1)])
        .unwrap();

    assert_eq!(harness.isolate().kind_of(result), ValueKind::Mint);
    assert_eq!(harness.expect_integer(result), Value::SMI_MIN - 1);

    // The result is rooted in the caller's zone
    harness.isolate_mut().collect_garbage();
    assert_eq!(harness.expect_integer(result), Value::SMI_MIN - 1);
}

#[test]
fn test_mint_arguments() {
    let mut harness = harness();
    let a = harness.new_integer(i64::MAX);
    let b = harness.new_integer(i64::MAX - 5);
    let result = harness.call_runtime("TestSmiSub", &[a, b]).unwrap();
    assert_eq!(harness.expect_smi(result), 5);
}

// ============================================================================
// 2. Property tests over integer pairs
// ============================================================================

#[test]
fn test_full_sub_matches_wrapping_sub() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("SubArgs", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..500 {
        let (a, b): (i64, i64) = if rng.gen_bool(0.5) {
            (rng.gen(), rng.gen())
        } else {
            (rng.gen_range(-1000..1000), rng.gen_range(-1000..1000))
        };
        let args = [harness.new_integer(a), harness.new_integer(b)];
        let result = harness.invoke(&stub, &args);
        assert_eq!(harness.expect_integer(result), a.wrapping_sub(b), "{} - {}", a, b);
    }
    assert_eq!(harness.isolate().runtime_frame_depth(), 0);
}

#[test]
fn test_leaf_add_matches_add() {
    let mut harness = harness();
    let add = harness.registry().lookup("TestLeafSmiAdd");
    let stub = harness
        .build_stub("AddArgs", |_, asm| {
            generate_call_leaf_runtime_stub(asm, &add, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap();

    let half = Value::SMI_MAX / 2;
    let mut rng = StdRng::seed_from_u64(0xadd);
    for _ in 0..500 {
        let a = rng.gen_range(-half..=half);
        let b = rng.gen_range(-half..=half);
        let result = harness.invoke(&stub, &[Value::smi(a), Value::smi(b)]);
        assert_eq!(harness.expect_smi(result), a + b, "{} + {}", a, b);
    }
}

// ============================================================================
// 3. Operands from constants and invocation arguments
// ============================================================================

#[test]
fn test_mixed_operands() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("ConstMinusArg", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Object(Value::smi(100)), Operand::Argument(0)]);
        })
        .unwrap();

    assert_eq!(stub.param_count(), 1);
    let result = harness.invoke(&stub, &[Value::smi(58)]);
    assert_eq!(harness.expect_smi(result), 42);
}

#[test]
fn test_heap_constant_operand_is_pooled() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("MintConst", |isolate, asm| {
            let big = isolate.new_integer(i64::MIN);
            let big = isolate.new_handle(big);
            generate_call_runtime_stub(asm, &sub, &[Operand::Object(big), Operand::Object(Value::smi(-1))]);
        })
        .unwrap();

    let code = stub.code().unwrap().clone();
    assert_eq!(code.object_pool().len(), 1);

    // The generation zone is gone; the code pool keeps the constant alive
    harness.isolate_mut().collect_garbage();
    let result = harness.invoke(&stub, &[]);
    assert_eq!(harness.expect_integer(result), i64::MIN + 1);
}

#[test]
fn test_stub_frame_is_balanced() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("Balanced", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap();

    let code = stub.code().unwrap();
    let summary = code.frame_summary();
    assert!(summary.is_balanced());
    assert_eq!(summary.max_stack_words, 3);
    assert_eq!(summary.full_calls, 1);
    assert_eq!(code.runtime_entries().len(), 1);

    let zones = harness.isolate().zone_depth();
    harness.invoke(&stub, &[Value::smi(1), Value::smi(2)]);
    assert_eq!(harness.isolate().runtime_frame_depth(), 0);
    assert_eq!(harness.isolate().zone_depth(), zones);
}

// ============================================================================
// 4. Finalization and registration
// ============================================================================

#[test]
fn test_finalize_twice_keeps_first_code() {
    let harness = harness();
    let add = harness.registry().lookup("TestLeafSmiAdd");
    let mut asm = harness.engine().new_assembler("Twice");
    generate_call_leaf_runtime_stub(
        &mut asm,
        &add,
        &[Operand::Object(Value::smi(1)), Operand::Object(Value::smi(2))],
    );

    let code = harness.engine().finalize_code(&mut asm).unwrap();
    for _ in 0..3 {
        let again = harness.engine().finalize_code(&mut asm);
        assert!(matches!(again, Err(CodegenError::AlreadyFinalized(ref name)) if name == "Twice"));
    }

    let bits = unsafe { (code.entry())(std::ptr::null_mut(), std::ptr::null(), 0) };
    assert_eq!(Value::from_bits(bits), Value::smi(3));
}

#[test]
fn test_unterminated_buffer_is_rejected() {
    let harness = harness();
    let mut asm = harness.engine().new_assembler("Open");
    asm.enter(0).load_object(Reg::Ret, Value::null()).leave();
    let result = harness.engine().finalize_code(&mut asm);
    assert!(matches!(result, Err(CodegenError::Unterminated(_))));
    assert!(!asm.is_finalized());
}

#[test]
fn test_code_attaches_once() {
    let mut harness = harness();
    let add = harness.registry().lookup("TestLeafSmiAdd");
    let stub = harness
        .build_stub("Once", |_, asm| {
            generate_call_leaf_runtime_stub(asm, &add, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap();

    let other = stub.code().unwrap().clone();
    assert!(matches!(stub.attach_code(other), Err(CodegenError::CodeAlreadyAttached(_))));
}

#[test]
fn test_registration_lifecycle() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("Registered", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap();

    let found = harness.isolate().lookup_function("Registered").unwrap();
    assert!(Arc::ptr_eq(&found, &stub));
    assert_eq!(harness.isolate().symbol_name(stub.owner().name()), "ownerClass");

    // One-shot invocations clean up after themselves
    harness.call_runtime("TestSmiSub", &[Value::smi(3), Value::smi(1)]).unwrap();
    assert!(harness.isolate().lookup_function("Test_CallRuntime_TestSmiSub").is_none());
    assert_eq!(harness.isolate().functions().len(), 1);

    assert!(harness.isolate_mut().unregister_function("Registered").is_some());
    assert!(harness.isolate().lookup_function("Registered").is_none());
}

#[test]
fn test_disassembly_lists_call() {
    let mut harness = harness();
    let sub = harness.registry().lookup("TestSmiSub");
    let stub = harness
        .build_stub("Listed", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Object(Value::smi(10)), Operand::Object(Value::smi(20))]);
        })
        .unwrap();

    let code = stub.code().unwrap();
    let listing = code.disassemble();
    assert!(listing.starts_with("stub Listed (params: 0, max stack: 3 words)"));
    assert!(listing.contains("call_runtime TestSmiSub ; full, 2 args"));
    assert!(code.code_size() > 0);
    assert!(!code.backend_ir().is_empty());
}

// ============================================================================
// 5. Result lifetime across scopes
// ============================================================================

fn sub_stub(harness: &mut Harness) -> Arc<Function> {
    let sub = harness.registry().lookup("TestSmiSub");
    harness
        .build_stub("SubArguments", |_, asm| {
            generate_call_runtime_stub(asm, &sub, &[Operand::Argument(0), Operand::Argument(1)]);
        })
        .unwrap()
}

#[test]
fn test_scoped_results_are_released() {
    let mut harness = harness();
    let stub = sub_stub(&mut harness);
    harness.isolate_mut().collect_garbage();
    let baseline = harness.isolate().heap().live_objects();

    for i in 0..100i64 {
        harness.scope(|h| {
            let big = h.new_integer(i64::MAX - i);
            let result = h.invoke(&stub, &[Value::smi(Value::SMI_MIN), Value::smi(1)]);
            assert_eq!(h.isolate().kind_of(result), ValueKind::Mint);

            // Rooted until the scope closes
            h.isolate_mut().collect_garbage();
            assert_eq!(h.expect_integer(result), Value::SMI_MIN - 1);
            assert_eq!(h.expect_integer(big), i64::MAX - i);
        });
    }

    harness.isolate_mut().collect_garbage();
    assert_eq!(harness.isolate().heap().live_objects(), baseline);
    assert_eq!(harness.isolate().zone_depth(), 1);
}

#[test]
fn test_unscoped_results_stay_in_base_zone() {
    let mut harness = harness();
    let stub = sub_stub(&mut harness);
    harness.isolate_mut().collect_garbage();
    let baseline = harness.isolate().heap().live_objects();

    for _ in 0..10 {
        harness.invoke(&stub, &[Value::smi(Value::SMI_MIN), Value::smi(1)]);
    }
    harness.isolate_mut().collect_garbage();
    assert_eq!(harness.isolate().heap().live_objects(), baseline + 10);
}

#[test]
fn test_scope_returns_value_and_nests() {
    let mut harness = harness();
    let outer = harness.scope(|h| {
        let inner = h.scope(|h| {
            assert_eq!(h.isolate().zone_depth(), 3);
            h.call_runtime("TestSmiSub", &[Value::smi(7), Value::smi(2)]).unwrap()
        });
        assert_eq!(h.isolate().zone_depth(), 2);
        h.expect_smi(inner)
    });
    assert_eq!(outer, 5);
    assert_eq!(harness.isolate().zone_depth(), 1);
}

#[test]
fn test_scope_closes_on_panic() {
    let mut harness = harness();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        harness.scope(|h| {
            h.new_integer(i64::MAX);
            h.call_runtime("TestSmiSub", &[Value::null(), Value::smi(1)])
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(harness.isolate().zone_depth(), 1);
    assert_eq!(harness.isolate_mut().collect_garbage(), 1);
}
