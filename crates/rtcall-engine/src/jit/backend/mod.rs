//! Backend-agnostic code generation traits and the Cranelift implementation

pub mod traits;
pub mod cranelift;

pub use traits::{
    CodeMemory, CodegenBackend, CodegenError, ExecutableCode, LiveSlot,
    PointerLocation, StackMapEntry, TargetArch, TargetInfo,
};
pub use self::cranelift::CraneliftBackend;
