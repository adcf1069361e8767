use super::expr::Width;
use super::Error;
use crate::compiler::ast::{BinOp, Expr};
use crate::compiler::memory::Type;
use crate::compiler::phases::emit::Line;
use crate::compiler::regalloc::{Operand, Value};
use crate::compiler::session::CompileSession;
use crate::isa::types::{hi, lo};
use crate::isa::{inst, AluOp, GpReg, Inst, Word};

/// The two halves of a 16-bit value which is available without arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Wide {
    lo: Operand,
    hi: Operand,
}

impl Wide {
    fn cells(addr: Word) -> Self {
        Wide {
            lo: Operand::Cell(addr),
            hi: Operand::Cell(addr.wrapping_add(1)),
        }
    }

    fn reads(&self, addr: Word) -> bool {
        let wide = Wide::cells(addr);
        [self.lo, self.hi].iter().any(|op| *op == wide.lo || *op == wide.hi)
    }
}

impl BinOp {
    /// The instructions for the low and the high byte.
    fn halves(self) -> (AluOp, AluOp) {
        match self {
            BinOp::Add => (AluOp::Add, AluOp::Adc),
            BinOp::Sub => (AluOp::Sub, AluOp::Sbc),
            BinOp::And => (AluOp::And, AluOp::And),
            BinOp::Xor => (AluOp::Xor, AluOp::Xor),
        }
    }
}

impl CompileSession {
    fn wide_operand(&self, expr: &Expr) -> Result<Option<Wide>, Error> {
        if let Some(v) = self.fold16(expr)? {
            return Ok(Some(Wide {
                lo: Operand::Lit(lo(v)),
                hi: Operand::Lit(hi(v)),
            }));
        }

        if let Expr::VarRef(name) = expr {
            let sym = self.memory.resolve(name)?;
            if sym.ty == Type::UInt16 {
                return Ok(Some(Wide::cells(sym.addr)));
            }
        }

        if self.expr_type(expr)? == Width::Byte {
            return Ok(self.operand(expr)?.map(|op| Wide {
                lo: op,
                hi: Operand::Lit(0),
            }));
        }

        Ok(None)
    }

    /// Make `expr` available as a pair of operands, computing it into a
    /// scratch pair if it needs arithmetic.
    fn wide_leaf(&mut self, expr: &Expr) -> Result<Wide, Error> {
        if let Some(w) = self.wide_operand(expr)? {
            return Ok(w);
        }

        let tmp = self.memory.acquire_scratch(2)?;
        self.wide_into(expr, tmp)?;
        Ok(Wide::cells(tmp))
    }

    /// Compute `expr` at 16 bits into `dest` (low) and `dest + 1` (high).
    /// Byte operands are zero-extended.
    pub(super) fn wide_into(&mut self, expr: &Expr, dest: Word) -> Result<(), Error> {
        if let Some(w) = self.wide_operand(expr)? {
            if w == Wide::cells(dest) {
                return Ok(());
            }
            self.store_operand(w.lo, dest)?;
            return self.store_operand(w.hi, dest.wrapping_add(1));
        }

        match expr {
            Expr::Not(inner) => {
                let w = self.wide_leaf(inner)?;
                for (i, half) in [w.lo, w.hi].iter().enumerate() {
                    let src = self.source(*half, AluOp::Not)?;
                    self.emit(Inst::Alu(AluOp::Not, src))?;
                    self.store(Value::Acc, dest.wrapping_add(i as Word))?;
                }
                Ok(())
            }
            Expr::BinOp(op, l, r) => {
                let b = self.wide_leaf(r)?;
                // The left side may be built in place unless the right side
                // still has to read the destination.
                let a = match self.wide_operand(l)? {
                    Some(a) => a,
                    None if !b.reads(dest) => {
                        self.wide_into(l, dest)?;
                        Wide::cells(dest)
                    }
                    None => self.wide_leaf(l)?,
                };
                self.wide_binop(*op, a, b, dest)
            }
            _ => {
                let v = self.eval(expr)?;
                self.store(v, dest)?;
                self.store_operand(Operand::Lit(0), dest.wrapping_add(1))
            }
        }
    }

    /// Combine two 16-bit operands a byte at a time. Nothing between the low
    /// and the high step touches the carry flag.
    fn wide_binop(&mut self, op: BinOp, a: Wide, b: Wide, dest: Word) -> Result<(), Error> {
        let (alu_lo, alu_hi) = op.halves();
        let steps = [(a.lo, b.lo, alu_lo), (a.hi, b.hi, alu_hi)];
        let mut low_done = 0;
        for (i, (x, y, alu)) in steps.iter().enumerate() {
            self.load(GpReg::RD, *x)?;
            let src = self.source(*y, *alu)?;
            if i == 1 && matches!(alu, AluOp::Adc | AluOp::Sbc) {
                self.carry_kept(low_done)?;
            }
            self.emit(Inst::Alu(*alu, src))?;
            low_done = self.lines().len();
            self.store(Value::Acc, dest.wrapping_add(i as Word))?;
        }
        Ok(())
    }

    /// Fail if anything emitted since line `from` overwrote the carry flag.
    fn carry_kept(&self, from: usize) -> Result<(), Error> {
        let clobber = self.lines()[from..].iter().find_map(|line| match line {
            Line::Inst(i) if i.sets_carry() => Some(i.clone()),
            _ => None,
        });
        match clobber {
            Some(i) => Err(Error::Internal(inst::Error::InvalidOperandCombination(
                i,
                "overwrites the carry between the halves of a 16-bit operation",
            ))),
            None => Ok(()),
        }
    }
}
