use super::expr::Width;
use super::Error;
use crate::compiler::ast::Expr;
use crate::compiler::memory::Type;
use crate::compiler::regalloc::Operand;
use crate::compiler::session::CompileSession;
use crate::isa::types::{hi, lo, BYTE_MAX};
use crate::isa::{AluOp, Cond, Dst, GpReg, Inst, Src, Word};
use log::debug;

/// A memory cell whose address is only known at run time.
#[derive(Debug, Clone, Copy)]
pub(super) enum Indirect<'a> {
    Index(&'a str, &'a Expr),
    Deref(&'a Expr),
}

impl CompileSession {
    /// Point `MARL`/`MARH` at the cell named by `target`.
    pub(super) fn place_address(&mut self, target: Indirect) -> Result<(), Error> {
        match target {
            Indirect::Index(name, idx) => self.place_element(name, idx),
            Indirect::Deref(ptr) => self.place_pointer(ptr),
        }
    }

    fn place_element(&mut self, name: &str, idx: &Expr) -> Result<(), Error> {
        let (base, len) = self.array(name)?;
        let (base_lo, base_hi) = (lo(base), hi(base));

        if base_lo == 0 {
            let v = self.eval(idx)?;
            self.emit(Inst::Mov(Dst::Marl, v.src()))?;
            return self.put(Dst::Marh, Operand::Lit(base_hi));
        }

        let src = self.stage_pair(&Expr::Literal(Word::from(base_lo)), idx, AluOp::Add)?;
        self.emit(Inst::Alu(AluOp::Add, src))?;
        self.emit(Inst::Mov(Dst::Marl, Src::Acc))?;

        // The low byte can only wrap if the array reaches past the page.
        if usize::from(base_lo) + len.saturating_sub(1) <= usize::from(BYTE_MAX) {
            return self.put(Dst::Marh, Operand::Lit(base_hi));
        }

        let labels = self.labels.carry_labels();
        debug!("'{}' crosses a page, emitting {}", name, labels.carry);
        self.emit(Inst::Jump(Cond::Carry, labels.carry.clone()))?;
        self.put(Dst::Marh, Operand::Lit(base_hi))?;
        self.emit(Inst::Jump(Cond::Always, labels.done.clone()))?;
        self.define_label(&labels.carry);
        self.put(Dst::Marh, Operand::Lit(base_hi.wrapping_add(1)))?;
        self.define_label(&labels.done);
        Ok(())
    }

    fn place_pointer(&mut self, ptr: &Expr) -> Result<(), Error> {
        if self.expr_type(ptr)? == Width::Byte {
            let v = self.eval(ptr)?;
            self.emit(Inst::Mov(Dst::Marl, v.src()))?;
            return self.put(Dst::Marh, Operand::Lit(0));
        }

        let cell = match ptr {
            Expr::VarRef(name) if self.memory.resolve(name)?.ty == Type::UInt16 => {
                self.memory.resolve(name)?.addr
            }
            _ => {
                let tmp = self.memory.acquire_scratch(2)?;
                self.wide_into(ptr, tmp)?;
                tmp
            }
        };

        // Both halves pass through registers, since loading the pointer
        // itself needs the address pair.
        self.load(GpReg::RD, Operand::Cell(cell))?;
        self.set_mar(cell.wrapping_add(1))?;
        self.emit(Inst::Mov(Dst::Gp(GpReg::RA), Src::M))?;
        self.emit(Inst::Mov(Dst::Marl, Src::Gp(GpReg::RD)))?;
        self.emit(Inst::Mov(Dst::Marh, Src::Gp(GpReg::RA)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::phases::emit::Line;
    use crate::config::Config;

    fn session(start: u32) -> CompileSession {
        let mut cfg = Config::default();
        cfg.variable_start_addr = start;
        cfg.variable_end_addr = 0x0400;
        cfg.stack_start_addr = 0x0800;
        CompileSession::new(&cfg)
    }

    fn index(name: &str, var: &str) -> Expr {
        Expr::ArrayIndex(
            String::from(name),
            Box::new(Expr::VarRef(String::from(var))),
        )
    }

    fn labels(s: &CompileSession) -> Vec<String> {
        s.lines()
            .iter()
            .filter_map(|l| match l {
                Line::Label(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn page_crossing_index_takes_carry_path() {
        let mut s = session(0x00FE);
        s.memory.declare("arr", Type::ByteArray(5)).unwrap();
        s.memory.declare("i", Type::Byte).unwrap();
        s.eval(&index("arr", "i")).unwrap();

        assert_eq!(labels(&s), vec!["idx_carry_1", "idx_done_1"]);
        assert!(s
            .lines()
            .contains(&Line::Inst(Inst::Jump(Cond::Carry, String::from("idx_carry_1")))));
    }

    #[test]
    fn index_within_page_has_no_branch() {
        let mut s = session(0x0010);
        s.memory.declare("arr", Type::ByteArray(5)).unwrap();
        s.memory.declare("i", Type::Byte).unwrap();
        s.eval(&index("arr", "i")).unwrap();

        assert!(labels(&s).is_empty());
        assert!(s
            .lines()
            .contains(&Line::Inst(Inst::Mov(Dst::Marl, Src::Acc))));
    }

    #[test]
    fn page_aligned_index_skips_the_add() {
        let mut s = session(0x0100);
        s.memory.declare("arr", Type::ByteArray(8)).unwrap();
        s.memory.declare("i", Type::Byte).unwrap();
        s.eval(&index("arr", "i")).unwrap();

        assert!(!s
            .lines()
            .iter()
            .any(|l| matches!(l, Line::Inst(Inst::Alu(AluOp::Add, _)))));
    }

    #[test]
    fn wide_pointer_loads_both_halves() {
        let mut s = session(0x0010);
        s.memory.declare("p", Type::UInt16).unwrap();
        s.eval(&Expr::Deref(Box::new(Expr::VarRef(String::from("p")))))
            .unwrap();

        let tail: Vec<String> = s
            .lines()
            .iter()
            .rev()
            .take(4)
            .map(|l| match l {
                Line::Inst(inst) => inst.to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(
            tail,
            vec!["MOV RD, M", "MOV MARH, RA", "MOV MARL, RD", "MOV RA, M"]
        );
    }
}
