//! Pretty-printing for stub listings

use std::fmt::{self, Write};

use super::instr::{Instr, Reg};
use crate::jit::frame::FrameSummary;

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Ret => "ret",
            Reg::Ctx => "ctx",
            Reg::Arg0 => "a0",
            Reg::Arg1 => "a1",
            Reg::Arg2 => "a2",
            Reg::Arg3 => "a3",
            Reg::Arg4 => "a4",
            Reg::Arg5 => "a5",
            Reg::Tmp => "tmp",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.mnemonic();
        match self {
            Instr::Enter { frame_size } => write!(f, "{} {}", op, frame_size),
            Instr::Leave | Instr::Ret | Instr::PushResultSlot => f.write_str(op),
            Instr::ReserveAlignedFrameSpace { bytes, words } => {
                write!(f, "{} {} ; {} words", op, bytes, words)
            }
            Instr::LoadContext => write!(f, "{} {}", op, Reg::Ctx),
            Instr::LoadObject { dst, value } => write!(f, "{} {}, {:?}", op, dst, value),
            Instr::LoadArgument { dst, index } => write!(f, "{} {}, arg{}", op, dst, index),
            Instr::PushObject { value } => write!(f, "{} {:?}", op, value),
            Instr::PushRegister { src } => write!(f, "{} {}", op, src),
            Instr::PopRegister { dst } => write!(f, "{} {}", op, dst),
            Instr::DropSlots { count } => write!(f, "{} {}", op, count),
            Instr::CallRuntime { entry, argc } => {
                write!(f, "{} {} ; {}, {} args", op, entry.name(), entry.kind(), argc)
            }
        }
    }
}

/// Numbered listing of a stub
pub fn listing(name: &str, instrs: &[Instr], frame: &FrameSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "stub {} (params: {}, max stack: {} words)",
        name, frame.param_count, frame.max_stack_words
    );
    for (i, instr) in instrs.iter().enumerate() {
        let _ = writeln!(out, "  {:04}  {}", i, instr);
    }
    out
}
