//! Stub instructions → Cranelift IR lowering
//!
//! Stub registers become Cranelift variables. The virtual stack becomes one
//! explicit stack slot of `max_stack_words` words, addressed top-down so the
//! memory layout matches a real downward-growing stack: the word pushed last
//! has the lowest address, which is what `call_to_runtime` receives as `argv`.

use cranelift_codegen::ir::{self, types, InstBuilder, MemFlags, StackSlot, StackSlotData, StackSlotKind};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::{FunctionBuilder, Variable};
use std::sync::Arc;

use super::abi;
use crate::jit::assembler::{AssembledStub, Instr, Reg, ARGUMENT_REGISTERS};
use crate::jit::runtime::trampoline::call_to_runtime_address;
use crate::runtime::entry::{NativeTarget, RuntimeEntry};

/// State maintained during lowering of a single stub
pub struct LoweringContext<'a> {
    stub: &'a AssembledStub,
    call_conv: CallConv,
    /// Variable per stub register, indexed by `Reg::index`
    reg_vars: Vec<Variable>,
    /// Backing store of the virtual stack
    stack: StackSlot,
    /// Capacity of `stack` in words
    capacity: usize,
    /// Current virtual stack depth in words
    depth: usize,
    params: FunctionParams,
    returned: bool,
}

/// The three parameters of the stub entry ABI
struct FunctionParams {
    isolate: ir::Value,
    args_ptr: ir::Value,
    _arg_count: ir::Value,
}

impl<'a> LoweringContext<'a> {
    /// Lower a whole stub into Cranelift IR.
    /// Takes ownership of the FunctionBuilder since finalize() consumes it.
    pub fn lower(
        stub: &'a AssembledStub,
        mut builder: FunctionBuilder<'_>,
        call_conv: CallConv,
    ) -> Result<(), LowerError> {
        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        builder.seal_block(entry_block);

        let params = FunctionParams {
            isolate: builder.block_params(entry_block)[0],
            args_ptr: builder.block_params(entry_block)[1],
            _arg_count: builder.block_params(entry_block)[2],
        };

        let capacity = stub.frame.max_stack_words.max(1);
        let stack = builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            (capacity * stub.word_size) as u32,
            abi::STACK_SLOT_ALIGN_SHIFT,
        ));

        let mut ctx = LoweringContext {
            stub,
            call_conv,
            reg_vars: Vec::with_capacity(Reg::COUNT),
            stack,
            capacity,
            depth: 0,
            params,
            returned: false,
        };
        ctx.declare_all_regs(&mut builder);

        for instr in &stub.instrs {
            if ctx.returned {
                return Err(LowerError::UnsupportedInstruction(format!(
                    "{} after ret in {}",
                    instr, stub.name
                )));
            }
            ctx.lower_instr(instr, &mut builder)?;
        }
        if !ctx.returned {
            return Err(LowerError::MissingReturn(stub.name.clone()));
        }

        builder.finalize();
        Ok(())
    }

    /// Declare every stub register, zero-initialised
    fn declare_all_regs(&mut self, builder: &mut FunctionBuilder<'_>) {
        for _ in Reg::all() {
            // In Cranelift 0.128, declare_var takes only a type and returns the Variable
            let var = builder.declare_var(types::I64);
            let zero = builder.ins().iconst(types::I64, 0);
            builder.def_var(var, zero);
            self.reg_vars.push(var);
        }
    }

    fn use_reg(&self, builder: &mut FunctionBuilder<'_>, reg: Reg) -> ir::Value {
        builder.use_var(self.reg_vars[reg.index()])
    }

    fn def_reg(&self, builder: &mut FunctionBuilder<'_>, reg: Reg, val: ir::Value) {
        builder.def_var(self.reg_vars[reg.index()], val);
    }

    /// Byte offset of stack word `depth` within the slot
    fn word_offset(&self, depth: usize) -> Result<i32, LowerError> {
        if depth >= self.capacity {
            return Err(LowerError::StackOverflow {
                depth,
                capacity: self.capacity,
            });
        }
        Ok(((self.capacity - 1 - depth) * self.stub.word_size) as i32)
    }

    fn push(&mut self, builder: &mut FunctionBuilder<'_>, val: ir::Value) -> Result<(), LowerError> {
        let offset = self.word_offset(self.depth)?;
        builder.ins().stack_store(val, self.stack, offset);
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self, builder: &mut FunctionBuilder<'_>) -> Result<ir::Value, LowerError> {
        self.depth = self.depth.checked_sub(1).ok_or(LowerError::StackUnderflow)?;
        let offset = self.word_offset(self.depth)?;
        Ok(builder.ins().stack_load(types::I64, self.stack, offset))
    }

    /// Lower a single stub instruction to Cranelift IR
    fn lower_instr(&mut self, instr: &Instr, builder: &mut FunctionBuilder<'_>) -> Result<(), LowerError> {
        match instr {
            // ===== Frame =====
            Instr::Enter { frame_size } => {
                self.depth += frame_size.div_ceil(self.stub.word_size);
            }
            Instr::ReserveAlignedFrameSpace { words, .. } => {
                self.depth += words;
            }
            Instr::Leave => {
                self.depth = 0;
            }
            Instr::Ret => {
                let val = self.use_reg(builder, Reg::Ret);
                builder.ins().return_(&[val]);
                self.returned = true;
            }

            // ===== Registers =====
            Instr::LoadContext => {
                self.def_reg(builder, Reg::Ctx, self.params.isolate);
            }
            Instr::LoadObject { dst, value } => {
                let val = abi::emit_value(builder, *value);
                self.def_reg(builder, *dst, val);
            }
            Instr::LoadArgument { dst, index } => {
                let offset = (index * self.stub.word_size) as i32;
                let val = builder
                    .ins()
                    .load(types::I64, MemFlags::trusted(), self.params.args_ptr, offset);
                self.def_reg(builder, *dst, val);
            }

            // ===== Stack =====
            Instr::PushObject { value } => {
                let val = abi::emit_value(builder, *value);
                self.push(builder, val)?;
            }
            Instr::PushRegister { src } => {
                let val = self.use_reg(builder, *src);
                self.push(builder, val)?;
            }
            Instr::PushResultSlot => {
                let val = builder.ins().iconst(types::I64, abi::NULL_BITS as i64);
                self.push(builder, val)?;
            }
            Instr::PopRegister { dst } => {
                let val = self.pop(builder)?;
                self.def_reg(builder, *dst, val);
            }
            Instr::DropSlots { count } => {
                self.depth = self.depth.checked_sub(*count).ok_or(LowerError::StackUnderflow)?;
            }

            // ===== Calls =====
            Instr::CallRuntime { entry, argc } => match entry.native_target() {
                NativeTarget::Full(_) => self.lower_full_call(entry, *argc, builder)?,
                NativeTarget::Leaf(function) => {
                    self.lower_leaf_call(function.address(), function.arity(), builder)?
                }
            },
        }
        Ok(())
    }

    /// `call_to_runtime(ctx, entry, argv, argc)` with `argv` at the last pushed word
    fn lower_full_call(
        &mut self,
        entry: &Arc<RuntimeEntry>,
        argc: usize,
        builder: &mut FunctionBuilder<'_>,
    ) -> Result<(), LowerError> {
        let top = self.depth.checked_sub(1).ok_or(LowerError::StackUnderflow)?;
        let argv_offset = self.word_offset(top)?;

        let sig_ref = builder.import_signature(abi::call_to_runtime_signature(self.call_conv));
        let callee = abi::emit_address(builder, call_to_runtime_address());
        let ctx = self.use_reg(builder, Reg::Ctx);
        // The finalized code keeps the entry alive
        let entry_ptr = abi::emit_address(builder, Arc::as_ptr(entry) as usize);
        let argv = builder.ins().stack_addr(types::I64, self.stack, argv_offset);
        let argc = builder.ins().iconst(types::I64, argc as i64);

        builder.ins().call_indirect(sig_ref, callee, &[ctx, entry_ptr, argv, argc]);
        Ok(())
    }

    /// Direct call of a leaf target with the argument registers
    fn lower_leaf_call(
        &mut self,
        address: usize,
        arity: usize,
        builder: &mut FunctionBuilder<'_>,
    ) -> Result<(), LowerError> {
        if arity > ARGUMENT_REGISTERS.len() {
            return Err(LowerError::UnsupportedInstruction(format!(
                "leaf call with {} arguments",
                arity
            )));
        }
        let args: Vec<ir::Value> = ARGUMENT_REGISTERS[..arity]
            .iter()
            .map(|&reg| self.use_reg(builder, reg))
            .collect();

        let sig_ref = builder.import_signature(abi::leaf_signature(self.call_conv, arity));
        let callee = abi::emit_address(builder, address);
        let call = builder.ins().call_indirect(sig_ref, callee, &args);
        let result = builder.inst_results(call)[0];
        self.def_reg(builder, Reg::Ret, result);
        Ok(())
    }
}

/// Error during Cranelift lowering
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("Unsupported instruction: {0}")]
    UnsupportedInstruction(String),
    #[error("Stub {0} does not return")]
    MissingReturn(String),
    #[error("Virtual stack overflow: word {depth} of {capacity}")]
    StackOverflow { depth: usize, capacity: usize },
    #[error("Virtual stack underflow")]
    StackUnderflow,
}
