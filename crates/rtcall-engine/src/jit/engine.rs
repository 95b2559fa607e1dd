//! Top-level JIT engine: hands out assemblers and finalizes them into code.

use std::sync::Arc;

use crate::jit::assembler::Assembler;
use crate::jit::backend::traits::{CodegenBackend, CodegenError, TargetInfo};
use crate::jit::backend::CraneliftBackend;
use crate::jit::code::Code;

/// Cranelift optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

/// Configuration for the JIT engine
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// Cranelift optimization level (default: speed)
    pub opt_level: OptLevel,
    /// Run the Cranelift IR verifier on every stub (default: true)
    pub enable_verifier: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            opt_level: OptLevel::Speed,
            enable_verifier: true,
        }
    }
}

/// Top-level JIT engine
pub struct JitEngine {
    backend: CraneliftBackend,
    target: TargetInfo,
}

impl JitEngine {
    /// Create a new JIT engine with default configuration
    pub fn new() -> Result<Self, CodegenError> {
        Self::with_config(JitConfig::default())
    }

    /// Create a new JIT engine with custom configuration
    pub fn with_config(config: JitConfig) -> Result<Self, CodegenError> {
        let backend = CraneliftBackend::with_config(&config)?;
        let target = backend.target_info();
        Ok(JitEngine { backend, target })
    }

    pub fn backend(&self) -> &CraneliftBackend {
        &self.backend
    }

    pub fn target_info(&self) -> &TargetInfo {
        &self.target
    }

    /// Empty code buffer for the host target
    pub fn new_assembler(&self, name: impl Into<String>) -> Assembler {
        Assembler::new(name, self.target.clone())
    }

    /// Finalize a buffer into executable code
    ///
    /// A buffer is finalized at most once; finalizing it again returns
    /// `AlreadyFinalized` and leaves the first `Code` untouched.
    pub fn finalize_code(&self, asm: &mut Assembler) -> Result<Arc<Code>, CodegenError> {
        let code = asm.finalize_with(|stub| {
            let executable = self.backend.compile_stub(stub)?;
            Ok(Code::new(stub, executable))
        })?;
        log::debug!(
            "finalized {}: {} instructions, {} bytes at {:#x}",
            code.name(),
            code.instructions().len(),
            code.code_size(),
            code.entry_address()
        );
        Ok(Arc::new(code))
    }
}
