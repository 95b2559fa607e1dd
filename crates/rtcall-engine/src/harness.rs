//! Execution harness for generated stubs
//!
//! The harness binds generated code to a synthetic static function, registers
//! it with its isolate and drives it through the uniform call path, the same
//! way managed code would call it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::jit::assembler::Assembler;
use crate::jit::backend::CodegenError;
use crate::jit::code::Code;
use crate::jit::stubs::{self, Operand};
use crate::jit::{JitConfig, JitEngine};
use crate::runtime::entry::RuntimeEntryKind;
use crate::runtime::registry::RuntimeEntryRegistry;
use crate::vm::entry::invoke_static;
use crate::vm::function::{Class, Function, OWNER_CLASS_NAME};
use crate::vm::isolate::{Isolate, IsolateConfig};
use crate::vm::object::ValueKind;
use crate::vm::value::Value;

/// Configuration for a harness
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    pub jit: JitConfig,
    pub isolate: IsolateConfig,
}

/// Generates, registers and invokes stubs against one isolate
pub struct Harness {
    engine: JitEngine,
    isolate: Isolate,
}

impl Harness {
    pub fn new(registry: Arc<RuntimeEntryRegistry>) -> Result<Self, CodegenError> {
        Self::with_config(registry, HarnessConfig::default())
    }

    pub fn with_config(registry: Arc<RuntimeEntryRegistry>, config: HarnessConfig) -> Result<Self, CodegenError> {
        Ok(Harness {
            engine: JitEngine::with_config(config.jit)?,
            isolate: Isolate::with_config(registry, config.isolate),
        })
    }

    pub fn engine(&self) -> &JitEngine {
        &self.engine
    }

    pub fn isolate(&self) -> &Isolate {
        &self.isolate
    }

    pub fn isolate_mut(&mut self) -> &mut Isolate {
        &mut self.isolate
    }

    pub fn registry(&self) -> &Arc<RuntimeEntryRegistry> {
        self.isolate.registry()
    }

    /// Run `f` inside a fresh zone
    ///
    /// Values returned by `new_integer` and the invoke methods are rooted in
    /// the innermost open zone. Outside a scope that is the base zone, which
    /// lives as long as the harness, so long-running drivers should wrap each
    /// call in a scope. The zone is closed when `f` returns or unwinds.
    pub fn scope<R>(&mut self, f: impl FnOnce(&mut Harness) -> R) -> R {
        let depth = self.isolate.open_zone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.isolate.close_zone(depth);
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Integer value rooted in the current zone
    pub fn new_integer(&mut self, value: i64) -> Value {
        let v = self.isolate.new_integer(value);
        self.isolate.new_handle(v)
    }

    fn new_function(&mut self, name: &str, code: Arc<Code>) -> Result<Arc<Function>, CodegenError> {
        let owner = Class::new(self.isolate.intern(OWNER_CLASS_NAME));
        let symbol = self.isolate.intern(name);
        let function = Arc::new(Function::new(name, symbol, owner, code.param_count()));
        function.attach_code(code)?;
        Ok(function)
    }

    /// Generate a stub inside a generation zone, finalize it and register it
    /// as a static function named `name`
    ///
    /// # Panics
    ///
    /// Panics if `generate` breaks an emission contract, or if a function
    /// named `name` is already registered.
    pub fn build_stub(
        &mut self,
        name: &str,
        generate: impl FnOnce(&mut Isolate, &mut Assembler),
    ) -> Result<Arc<Function>, CodegenError> {
        let engine = &self.engine;
        let code = self.isolate.with_zone(|isolate| {
            let mut asm = engine.new_assembler(name);
            generate(isolate, &mut asm);
            engine.finalize_code(&mut asm)
        })?;
        let function = self.new_function(name, code)?;
        self.isolate.register_fake_function(function.clone());
        Ok(function)
    }

    /// Invoke a registered stub with positional `args`
    ///
    /// The result is rooted in the current zone.
    pub fn invoke(&mut self, stub: &Arc<Function>, args: &[Value]) -> Value {
        invoke_static(&mut self.isolate, stub, args, &[])
    }

    /// Finalize `asm`, invoke it once as `name` and unregister it again
    pub fn invoke_stub(&mut self, name: &str, asm: &mut Assembler, args: &[Value]) -> Result<Value, CodegenError> {
        let code = self.engine.finalize_code(asm)?;
        let function = self.new_function(name, code)?;
        self.isolate.register_fake_function(function.clone());

        let isolate = &mut self.isolate;
        let result = panic::catch_unwind(AssertUnwindSafe(|| invoke_static(isolate, &function, args, &[])));
        self.isolate.unregister_function(name);
        match result {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Generate a Full call stub on `entry_name` and invoke it with `operands`
    /// passed as invocation arguments
    ///
    /// # Panics
    ///
    /// Panics if the entry is unknown, is not a Full entry, or if the operand
    /// count differs from its arity.
    pub fn call_runtime(&mut self, entry_name: &str, operands: &[Value]) -> Result<Value, CodegenError> {
        let entry = self.registry().lookup(entry_name);
        let mut asm = self.engine.new_assembler(format!("Test_CallRuntime_{}", entry_name));
        let arguments: Vec<Operand> = (0..operands.len()).map(Operand::Argument).collect();
        stubs::generate_call_runtime_stub(&mut asm, &entry, &arguments);
        let name = asm.name().to_string();
        self.invoke_stub(&name, &mut asm, operands)
    }

    /// Generate a Leaf call stub on `entry_name` and invoke it with `operands`
    /// passed as invocation arguments
    ///
    /// # Panics
    ///
    /// Panics if the entry is unknown, is not a Leaf entry, if the operand
    /// count differs from its arity, or if an operand is not a Smi. Leaf
    /// entries see raw bits and cannot unwind, so operands are checked here.
    pub fn call_leaf_runtime(&mut self, entry_name: &str, operands: &[Value]) -> Result<Value, CodegenError> {
        let entry = self.registry().lookup(entry_name);
        for operand in operands {
            assert!(
                operand.is_smi(),
                "{} takes smi operands, got {}",
                entry_name,
                self.isolate.describe(*operand)
            );
        }
        let mut asm = self.engine.new_assembler(format!("Test_CallLeafRuntime_{}", entry_name));
        let arguments: Vec<Operand> = (0..operands.len()).map(Operand::Argument).collect();
        stubs::generate_call_leaf_runtime_stub(&mut asm, &entry, &arguments);
        let name = asm.name().to_string();
        self.invoke_stub(&name, &mut asm, operands)
    }

    /// Call `entry_name` under whichever convention it was registered with
    pub fn call_entry(&mut self, entry_name: &str, operands: &[Value]) -> Result<Value, CodegenError> {
        match self.registry().lookup(entry_name).kind() {
            RuntimeEntryKind::Full => self.call_runtime(entry_name, operands),
            RuntimeEntryKind::Leaf => self.call_leaf_runtime(entry_name, operands),
        }
    }

    // ===== Checked casts =====

    /// Payload of a Smi result
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a Smi.
    pub fn expect_smi(&self, value: Value) -> i64 {
        value
            .as_smi()
            .unwrap_or_else(|| panic!("expected a smi, got {}", self.isolate.describe(value)))
    }

    /// Integer result, Smi or Mint
    ///
    /// # Panics
    ///
    /// Panics if `value` is not an integer.
    pub fn expect_integer(&self, value: Value) -> i64 {
        self.isolate.checked_integer(value)
    }

    /// # Panics
    ///
    /// Panics if `value` is not `null`.
    pub fn expect_null(&self, value: Value) {
        assert_eq!(
            self.isolate.kind_of(value),
            ValueKind::Null,
            "expected null, got {}",
            self.isolate.describe(value)
        );
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness").field("isolate", &self.isolate).finish()
    }
}
