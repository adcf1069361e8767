use super::types::{Byte, Dst, GpReg, Src, IMM3_MAX, LDI_MAX};
use crate::common;
use derive_more::Display;
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    ImmediateOutOfRange(Mnemonic, Byte),
    InvalidOperandCombination(Inst, &'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ImmediateOutOfRange(m, v) => {
                write!(f, "Immediate #{} out of range for {}", v, m)
            }
            Error::InvalidOperandCombination(inst, msg) => {
                write!(f, "Invalid operands in '{}': {}", inst, msg)
            }
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString)]
pub enum Mnemonic {
    LDI,
    MOV,
    ADD,
    SUB,
    ADC,
    SBC,
    ADDI,
    SUBI,
    AND,
    XOR,
    NOT,
    CMP,
    JMP,
    JEQ,
    JGT,
    JLT,
    JGE,
    JLE,
    JNE,
    JC,
    NOP,
    HLT,
}

impl Mnemonic {
    pub fn lookup(name: &str) -> Option<Mnemonic> {
        Mnemonic::iter().find(|m| common::eq_ignore_case(name, &m.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Adc,
    Sbc,
    And,
    Xor,
    Not,
    Cmp,
}

impl AluOp {
    pub fn mnemonic(self) -> Mnemonic {
        match self {
            AluOp::Add => Mnemonic::ADD,
            AluOp::Sub => Mnemonic::SUB,
            AluOp::Adc => Mnemonic::ADC,
            AluOp::Sbc => Mnemonic::SBC,
            AluOp::And => Mnemonic::AND,
            AluOp::Xor => Mnemonic::XOR,
            AluOp::Not => Mnemonic::NOT,
            AluOp::Cmp => Mnemonic::CMP,
        }
    }

    /// `XOR`, `NOT` and `CMP` can only read `RA`, `M` or `ACC`.
    pub fn accepts(self, src: Src) -> bool {
        match self {
            AluOp::Xor | AluOp::Not | AluOp::Cmp => {
                matches!(src, Src::Gp(GpReg::RA) | Src::M | Src::Acc)
            }
            _ => true,
        }
    }

    pub fn accepts_reg(self, r: GpReg) -> bool {
        self.accepts(Src::Gp(r))
    }

    pub fn sets_carry(self) -> bool {
        matches!(self, AluOp::Add | AluOp::Sub | AluOp::Adc | AluOp::Sbc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp {
    Addi,
    Subi,
}

impl ImmOp {
    pub fn mnemonic(self) -> Mnemonic {
        match self {
            ImmOp::Addi => Mnemonic::ADDI,
            ImmOp::Subi => Mnemonic::SUBI,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Cond {
    Always,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Carry,
}

impl Cond {
    pub fn mnemonic(self) -> Mnemonic {
        match self {
            Cond::Always => Mnemonic::JMP,
            Cond::Eq => Mnemonic::JEQ,
            Cond::Ne => Mnemonic::JNE,
            Cond::Gt => Mnemonic::JGT,
            Cond::Lt => Mnemonic::JLT,
            Cond::Ge => Mnemonic::JGE,
            Cond::Le => Mnemonic::JLE,
            Cond::Carry => Mnemonic::JC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    Ldi(Byte),
    Mov(Dst, Src),
    Alu(AluOp, Src),
    AluImm(ImmOp, Byte),
    Jump(Cond, String),
    Nop,
    Hlt,
}

impl Inst {
    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            Inst::Ldi(_) => Mnemonic::LDI,
            Inst::Mov(..) => Mnemonic::MOV,
            Inst::Alu(op, _) => op.mnemonic(),
            Inst::AluImm(op, _) => op.mnemonic(),
            Inst::Jump(cond, _) => cond.mnemonic(),
            Inst::Nop => Mnemonic::NOP,
            Inst::Hlt => Mnemonic::HLT,
        }
    }

    /// Checks the operand restrictions the assembler enforces. Failing
    /// here is always a code generator bug.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Inst::Ldi(v) if *v > LDI_MAX => Err(Error::ImmediateOutOfRange(Mnemonic::LDI, *v)),
            Inst::AluImm(op, v) if *v > IMM3_MAX => {
                Err(Error::ImmediateOutOfRange(op.mnemonic(), *v))
            }
            Inst::Mov(Dst::Gp(d), Src::Gp(s)) if d == s => Err(Error::InvalidOperandCombination(
                self.clone(),
                "source and destination are the same register",
            )),
            Inst::Mov(Dst::M, Src::M) => Err(Error::InvalidOperandCombination(
                self.clone(),
                "memory to memory move",
            )),
            Inst::Alu(op, src) if !op.accepts(*src) => Err(Error::InvalidOperandCombination(
                self.clone(),
                "source must be one of RA, M or ACC",
            )),
            Inst::Jump(_, label) if label.is_empty() => Err(Error::InvalidOperandCombination(
                self.clone(),
                "empty jump target",
            )),
            _ => Ok(()),
        }
    }

    /// Only the arithmetic instructions leave a carry (or borrow) behind.
    pub fn sets_carry(&self) -> bool {
        match self {
            Inst::Alu(op, _) => op.sets_carry(),
            Inst::AluImm(..) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match self {
            Inst::Ldi(v) | Inst::AluImm(_, v) => write!(f, "{} #{}", m, v),
            Inst::Mov(dst, src) => write!(f, "{} {}, {}", m, dst, src),
            Inst::Alu(_, src) => write!(f, "{} {}", m, src),
            Inst::Jump(_, label) => write!(f, "{} {}", m, label),
            Inst::Nop | Inst::Hlt => write!(f, "{}", m),
        }
    }
}
