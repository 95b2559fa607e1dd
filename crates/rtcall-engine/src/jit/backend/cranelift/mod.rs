//! Cranelift code generation backend
//!
//! Implements `CodegenBackend` with Cranelift. Every stub is compiled into
//! its own `JITModule`, which owns the stub's executable memory for as long
//! as the resulting `Code` lives. Supports x86_64 and AArch64 hosts.

pub mod abi;
pub mod lowering;

use std::sync::Arc;

use cranelift_codegen::isa::TargetIsa;
use cranelift_codegen::ir;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use parking_lot::Mutex;
use target_lexicon::Architecture;

use self::abi::stub_entry_signature;
use self::lowering::LoweringContext;
use crate::jit::assembler::AssembledStub;
use crate::jit::backend::traits::*;
use crate::jit::engine::{JitConfig, OptLevel};

/// Cranelift-based code generation backend
pub struct CraneliftBackend {
    /// The target ISA (instruction set architecture)
    isa: Arc<dyn TargetIsa>,
    /// Reused across compilations
    builder_ctx: Mutex<FunctionBuilderContext>,
}

impl CraneliftBackend {
    /// Create a backend targeting the host machine
    pub fn host() -> Result<Self, CodegenError> {
        Self::with_config(&JitConfig::default())
    }

    /// Create a host backend with custom settings
    pub fn with_config(config: &JitConfig) -> Result<Self, CodegenError> {
        let mut flag_builder = settings::builder();
        let opt_level = match config.opt_level {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        };
        set_flag(&mut flag_builder, "opt_level", opt_level)?;
        // JITModule places code at absolute addresses
        set_flag(&mut flag_builder, "is_pic", "false")?;
        set_flag(&mut flag_builder, "use_colocated_libcalls", "false")?;
        set_flag(
            &mut flag_builder,
            "enable_verifier",
            if config.enable_verifier { "true" } else { "false" },
        )?;

        let flags = settings::Flags::new(flag_builder);

        let isa = cranelift_native::builder()
            .map_err(|e| CodegenError::BackendError(format!("host ISA unavailable: {}", e)))?
            .finish(flags)
            .map_err(|e| CodegenError::BackendError(format!("host ISA setup failed: {}", e)))?;

        Ok(Self::with_isa(isa))
    }

    /// Create a backend with a specific ISA
    pub fn with_isa(isa: Arc<dyn TargetIsa>) -> Self {
        CraneliftBackend {
            isa,
            builder_ctx: Mutex::new(FunctionBuilderContext::new()),
        }
    }
}

fn set_flag(builder: &mut settings::Builder, name: &str, value: &str) -> Result<(), CodegenError> {
    builder
        .set(name, value)
        .map_err(|e| CodegenError::BackendError(format!("cranelift flag {}={}: {}", name, value, e)))
}

/// Executable memory of one stub
struct JitMemory(Option<JITModule>);

// Safety: the module is only touched again in Drop, and the code it maps is
// immutable after finalize_definitions.
unsafe impl Send for JitMemory {}
unsafe impl Sync for JitMemory {}

impl CodeMemory for JitMemory {}

impl Drop for JitMemory {
    fn drop(&mut self) {
        if let Some(module) = self.0.take() {
            // Safety: the owning Code is being dropped, nothing can call into it
            unsafe { module.free_memory() };
        }
    }
}

impl CodegenBackend for CraneliftBackend {
    fn name(&self) -> &str {
        "cranelift"
    }

    fn compile_stub(&self, stub: &AssembledStub) -> Result<ExecutableCode, CodegenError> {
        let builder = JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        let mut module = JITModule::new(builder);

        // Set up the function signature (StubEntryFn ABI)
        let call_conv = self.isa.default_call_conv();
        let sig = stub_entry_signature(call_conv);
        let func_id = module
            .declare_function(stub.name(), Linkage::Local, &sig)
            .map_err(|e| CodegenError::BackendError(format!("Failed to declare {}: {}", stub.name(), e)))?;

        let mut codegen_ctx = module.make_context();
        codegen_ctx.func.signature = sig;
        codegen_ctx.func.name = ir::UserFuncName::user(0, func_id.as_u32());

        // Build Cranelift IR from the stub
        {
            let mut builder_ctx = self.builder_ctx.lock();
            let builder = FunctionBuilder::new(&mut codegen_ctx.func, &mut builder_ctx);

            // lower() takes ownership of builder (finalize() consumes it)
            LoweringContext::lower(stub, builder, call_conv).map_err(|e| {
                CodegenError::BackendError(format!("Lowering failed: {}", e))
            })?;
        }
        let ir = codegen_ctx.func.display().to_string();

        // Compile to machine code
        module.define_function(func_id, &mut codegen_ctx).map_err(|e| {
            CodegenError::BackendError(format!("Cranelift compilation failed: {:?}", e))
        })?;
        let code_size = codegen_ctx
            .compiled_code()
            .map_or(0, |code| code.code_buffer().len());
        module.clear_context(&mut codegen_ctx);

        module.finalize_definitions().map_err(|e| {
            CodegenError::BackendError(format!("Failed to finalize {}: {}", stub.name(), e))
        })?;
        let code_ptr = module.get_finalized_function(func_id);

        Ok(ExecutableCode {
            code_ptr,
            code_size,
            ir,
            memory: Box::new(JitMemory(Some(module))),
        })
    }

    fn target_info(&self) -> TargetInfo {
        let arch = match self.isa.triple().architecture {
            Architecture::X86_64 => TargetArch::X86_64,
            Architecture::Aarch64(_) => TargetArch::AArch64,
            _ => TargetArch::X86_64, // fallback
        };
        TargetInfo {
            arch,
            pointer_size: self.isa.pointer_bytes() as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::assembler::{Assembler, Reg};
    use crate::jit::runtime::trampoline::StubEntryFn;
    use crate::vm::value::Value;

    fn compile(backend: &CraneliftBackend, asm: &mut Assembler) -> ExecutableCode {
        asm.finalize_with(|stub| backend.compile_stub(stub)).unwrap()
    }

    #[test]
    fn test_cranelift_backend_creation() {
        let backend = CraneliftBackend::host().unwrap();
        assert_eq!(backend.name(), "cranelift");
        let info = backend.target_info();
        assert_eq!(info.pointer_size, 8);
    }

    #[test]
    fn test_compile_constant_return() {
        let backend = CraneliftBackend::host().unwrap();
        let mut asm = Assembler::new("const", backend.target_info());
        asm.load_object(Reg::Ret, Value::smi(42)).ret();

        let code = compile(&backend, &mut asm);
        assert!(code.code_size > 0);
        assert!(code.ir.contains("return"));

        let entry: StubEntryFn = unsafe { std::mem::transmute(code.code_ptr) };
        let bits = unsafe { entry(std::ptr::null_mut(), std::ptr::null(), 0) };
        assert_eq!(Value::from_bits(bits), Value::smi(42));
    }

    #[test]
    fn test_compile_push_pop_through_stack() {
        let backend = CraneliftBackend::host().unwrap();
        let mut asm = Assembler::new("roundtrip", backend.target_info());
        asm.enter(16)
            .load_argument(Reg::Tmp, 1)
            .push_register(Reg::Tmp)
            .push_object(Value::smi(7))
            .drop_slots(1)
            .pop_register(Reg::Ret)
            .leave()
            .ret();

        let code = compile(&backend, &mut asm);
        let entry: StubEntryFn = unsafe { std::mem::transmute(code.code_ptr) };
        let args = [Value::smi(1).to_bits(), Value::smi(2).to_bits()];
        let bits = unsafe { entry(std::ptr::null_mut(), args.as_ptr(), 2) };
        assert_eq!(Value::from_bits(bits), Value::smi(2));
    }

    #[test]
    fn test_compile_with_optimizations_off() {
        let config = JitConfig {
            opt_level: OptLevel::None,
            enable_verifier: true,
        };
        let backend = CraneliftBackend::with_config(&config).unwrap();
        let mut asm = Assembler::new("noopt", backend.target_info());
        asm.load_object(Reg::Ret, Value::null()).ret();
        assert!(compile(&backend, &mut asm).code_size > 0);
    }
}
