use super::address::Indirect;
use super::Error;
use crate::compiler::ast::{BinOp, Expr};
use crate::compiler::memory::Type;
use crate::compiler::regalloc::{Operand, Pending, Value};
use crate::compiler::session::CompileSession;
use crate::isa::types::IMM3_MAX;
use crate::isa::{AluOp, Byte, Dst, GpReg, ImmOp, Inst, Src, Word};
use log::debug;
use num_traits::{WrappingAdd, WrappingSub};
use std::convert::TryFrom;
use std::ops::{BitAnd, BitXor};

/// How many bytes an expression's value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Width {
    Byte,
    Wide,
}

impl BinOp {
    pub(super) fn alu(self) -> AluOp {
        match self {
            BinOp::Add => AluOp::Add,
            BinOp::Sub => AluOp::Sub,
            BinOp::And => AluOp::And,
            BinOp::Xor => AluOp::Xor,
        }
    }

    fn fold<T>(self, a: T, b: T) -> T
    where
        T: WrappingAdd + WrappingSub + BitAnd<Output = T> + BitXor<Output = T>,
    {
        match self {
            BinOp::Add => a.wrapping_add(&b),
            BinOp::Sub => a.wrapping_sub(&b),
            BinOp::And => a & b,
            BinOp::Xor => a ^ b,
        }
    }
}

impl CompileSession {
    pub(super) fn expr_type(&self, expr: &Expr) -> Result<Width, Error> {
        match expr {
            Expr::Literal(v) => Ok(if Byte::try_from(*v).is_ok() {
                Width::Byte
            } else {
                Width::Wide
            }),
            Expr::VarRef(name) => match self.memory.resolve(name)?.ty {
                Type::Byte => Ok(Width::Byte),
                Type::UInt16 => Ok(Width::Wide),
                Type::ByteArray(_) => Err(Error::TypeMismatch(format!(
                    "array '{}' used as a value",
                    name
                ))),
            },
            Expr::ArrayIndex(name, idx) => {
                self.array(name)?;
                if self.expr_type(idx)? == Width::Wide && self.constant(idx)?.is_none() {
                    return Err(Error::TypeMismatch(format!(
                        "index into '{}' must be a byte",
                        name
                    )));
                }
                Ok(Width::Byte)
            }
            Expr::Deref(ptr) => {
                self.expr_type(ptr)?;
                Ok(Width::Byte)
            }
            Expr::AddrOf(name) => {
                self.memory.resolve(name)?;
                Ok(Width::Wide)
            }
            Expr::Not(e) => self.expr_type(e),
            Expr::BinOp(_, l, r) => Ok(self.expr_type(l)?.max(self.expr_type(r)?)),
            Expr::Compare(..) => Err(Error::TypeMismatch(String::from(
                "a comparison has no value",
            ))),
        }
    }

    /// The base address and length of the array `name`.
    pub(super) fn array(&self, name: &str) -> Result<(Word, usize), Error> {
        let sym = self.memory.resolve(name)?;
        match sym.ty {
            Type::ByteArray(len) => Ok((sym.addr, len)),
            _ => Err(Error::TypeMismatch(format!("'{}' is not an array", name))),
        }
    }

    /// Fold a byte-typed expression made only of literals.
    pub(super) fn const_byte(&self, expr: &Expr) -> Option<Byte> {
        match expr {
            Expr::Literal(v) => Byte::try_from(*v).ok(),
            Expr::Not(e) => self.const_byte(e).map(|v| !v),
            Expr::BinOp(op, l, r) => Some(op.fold(self.const_byte(l)?, self.const_byte(r)?)),
            _ => None,
        }
    }

    /// Fold an expression evaluated at 16 bits, where `&name` is a constant.
    pub(super) fn fold16(&self, expr: &Expr) -> Result<Option<Word>, Error> {
        Ok(match expr {
            Expr::Literal(v) => Some(*v),
            Expr::AddrOf(name) => Some(self.memory.resolve(name)?.addr),
            Expr::Not(e) => self.fold16(e)?.map(|v| !v),
            Expr::BinOp(op, l, r) => match (self.fold16(l)?, self.fold16(r)?) {
                (Some(a), Some(b)) => Some(op.fold(a, b)),
                _ => None,
            },
            _ => None,
        })
    }

    /// Fold an expression at its own width.
    pub(super) fn constant(&self, expr: &Expr) -> Result<Option<Word>, Error> {
        match self.expr_type(expr)? {
            Width::Byte => Ok(self.const_byte(expr).map(Word::from)),
            Width::Wide => self.fold16(expr),
        }
    }

    /// The fixed address of `name[idx]`, if `idx` is a constant.
    pub(super) fn element(&self, name: &str, idx: &Expr) -> Result<Option<Word>, Error> {
        let (base, len) = self.array(name)?;
        match self.constant(idx)? {
            Some(k) if usize::from(k) < len => Ok(Some(base.wrapping_add(k))),
            Some(k) => Err(Error::IndexOutOfBounds(name.to_owned(), usize::from(k), len)),
            None => Ok(None),
        }
    }

    /// The byte an expression reads, when it can be had without arithmetic.
    pub(super) fn operand(&self, expr: &Expr) -> Result<Option<Operand>, Error> {
        if let Some(v) = self.const_byte(expr) {
            return Ok(Some(Operand::Lit(v)));
        }

        Ok(match expr {
            Expr::VarRef(name) => {
                let sym = self.memory.resolve(name)?;
                match sym.ty {
                    Type::Byte => Some(Operand::Cell(sym.addr)),
                    _ => None,
                }
            }
            Expr::ArrayIndex(name, idx) => self.element(name, idx)?.map(Operand::Cell),
            Expr::Deref(ptr) => self.constant(ptr)?.map(Operand::Cell),
            _ => None,
        })
    }

    /// The operands read by the leaves of `expr`.
    fn leaves(&self, expr: &Expr, out: &mut Vec<Operand>) -> Result<(), Error> {
        if let Some(op) = self.operand(expr)? {
            out.push(op);
            return Ok(());
        }

        match expr {
            Expr::Not(e) | Expr::Deref(e) | Expr::ArrayIndex(_, e) => self.leaves(e, out),
            Expr::BinOp(_, l, r) | Expr::Compare(_, l, r) => {
                self.leaves(l, out)?;
                self.leaves(r, out)
            }
            Expr::Literal(_) | Expr::VarRef(_) | Expr::AddrOf(_) => Ok(()),
        }
    }

    /// A register holding `op`: one which already has it, or `RD`.
    pub(super) fn eval_operand(&mut self, op: Operand) -> Result<Value, Error> {
        if let Some(r) = self.regs.holding(op) {
            debug!("{:?} already in {}", op, r);
            return Ok(Value::Reg(r));
        }

        if self.regs.acc_holds(op) {
            return Ok(Value::Acc);
        }

        self.load(GpReg::RD, op)?;
        Ok(Value::Reg(GpReg::RD))
    }

    /// Compute a byte expression, leaving it in `ACC` or a register.
    pub(super) fn eval(&mut self, expr: &Expr) -> Result<Value, Error> {
        if let Some(op) = self.operand(expr)? {
            return self.eval_operand(op);
        }

        match expr {
            Expr::Not(inner) => {
                let src = self.byte_source(inner, AluOp::Not)?;
                self.emit(Inst::Alu(AluOp::Not, src))?;
                Ok(Value::Acc)
            }
            Expr::BinOp(op, l, r) => {
                let imm = match op {
                    BinOp::Add => Some(ImmOp::Addi),
                    BinOp::Sub => Some(ImmOp::Subi),
                    _ => None,
                };
                if let (Some(imm), Some(k)) = (imm, self.const_byte(r)) {
                    if k <= IMM3_MAX {
                        self.into_rd(l)?;
                        self.emit(Inst::AluImm(imm, k))?;
                        return Ok(Value::Acc);
                    }
                }

                let alu = op.alu();
                let src = self.stage_pair(l, r, alu)?;
                self.emit(Inst::Alu(alu, src))?;
                Ok(Value::Acc)
            }
            Expr::ArrayIndex(name, idx) => self.read_indirect(Indirect::Index(name, idx)),
            Expr::Deref(ptr) => self.read_indirect(Indirect::Deref(ptr)),
            Expr::Compare(..) => Err(Error::TypeMismatch(String::from(
                "a comparison has no value",
            ))),
            Expr::Literal(_) | Expr::VarRef(_) | Expr::AddrOf(_) => Err(Error::TypeMismatch(
                String::from("16-bit value used where a byte is expected"),
            )),
        }
    }

    fn read_indirect(&mut self, target: Indirect) -> Result<Value, Error> {
        self.place_address(target)?;
        self.emit(Inst::Mov(Dst::Gp(GpReg::RD), Src::M))?;
        Ok(Value::Reg(GpReg::RD))
    }

    /// Compute a byte expression into `RD`.
    pub(super) fn into_rd(&mut self, expr: &Expr) -> Result<(), Error> {
        if let Some(op) = self.operand(expr)? {
            return self.load(GpReg::RD, op);
        }

        match self.eval(expr)? {
            Value::Reg(GpReg::RD) => Ok(()),
            v => Ok(self.emit(Inst::Mov(Dst::Gp(GpReg::RD), v.src()))?),
        }
    }

    /// Compute a byte expression as a source `alu` accepts, without
    /// touching `RD`.
    fn byte_source(&mut self, expr: &Expr, alu: AluOp) -> Result<Src, Error> {
        if let Some(op) = self.operand(expr)? {
            return self.source(op, alu);
        }

        let src = self.eval(expr)?.src();
        if alu.accepts(src) {
            Ok(src)
        } else {
            self.emit(Inst::Mov(Dst::Gp(GpReg::RA), src))?;
            Ok(Src::Gp(GpReg::RA))
        }
    }

    /// Bring `l` into `RD` and `r` into a source operand for `alu`. A
    /// compound right side is computed first and kept out of the way while
    /// the left side is loaded.
    pub(super) fn stage_pair(&mut self, l: &Expr, r: &Expr, alu: AluOp) -> Result<Src, Error> {
        if let Some(rop) = self.operand(r)? {
            self.into_rd(l)?;
            return self.source(rop, alu);
        }

        let v = self.eval(r)?;
        let pending = match self.operand(l)? {
            Some(op) => Pending::Operand(op),
            None => {
                let mut live = Vec::new();
                self.leaves(l, &mut live)?;
                Pending::Compound(live)
            }
        };

        let saved = self.spill(v, &pending)?;
        self.into_rd(l)?;
        self.restore(saved, alu)
    }
}
