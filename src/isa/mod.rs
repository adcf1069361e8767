pub mod inst;
pub mod types;

pub use inst::{AluOp, Cond, ImmOp, Inst, Mnemonic};
pub use types::{Byte, Dst, GpReg, Regs, Src, Word};
