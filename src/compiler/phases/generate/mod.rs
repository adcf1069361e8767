mod address;
mod expr;
mod flow;
mod wide;

use super::types::Located;
use crate::compiler::ast::{Block, Expr, Place, Program, Stmt};
use crate::compiler::memory::{self, Type};
use crate::compiler::regalloc::{Operand, Value};
use crate::compiler::session::CompileSession;
use crate::config::OptLevel;
use crate::isa::inst::{self, Inst};
use crate::isa::{Dst, GpReg, Src, Word};
use address::Indirect;
use expr::Width;
use log::{debug, info, warn};
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    Memory(memory::Error),
    TypeMismatch(String),
    IndexOutOfBounds(String, usize, usize),
    Internal(inst::Error),
}

impl Error {
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Memory(err) => write!(f, "{}", err),
            Error::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            Error::IndexOutOfBounds(name, idx, len) => write!(
                f,
                "Index {} is out of bounds for '{}' of length {}",
                idx, name, len
            ),
            Error::Internal(err) => write!(f, "Internal code generator error: {}", err),
        }
    }
}

impl From<memory::Error> for Error {
    fn from(err: memory::Error) -> Self {
        Error::Memory(err)
    }
}

impl From<inst::Error> for Error {
    fn from(err: inst::Error) -> Self {
        Error::Internal(err)
    }
}

/// Lower `program` into `session`, finishing with `HLT`.
pub fn generate(program: &Program, session: &mut CompileSession) -> Result<(), Located<Error>> {
    session.block(&program.stmts)?;
    session
        .emit(Inst::Hlt)
        .map_err(|err| Located::from(Error::from(err)))?;

    info!(
        "generated {} line(s), {} variable(s)",
        session.lines().len(),
        session.memory().variable_count()
    );
    Ok(())
}

impl CompileSession {
    fn block(&mut self, block: &Block) -> Result<(), Located<Error>> {
        for stmt in block {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Located<Stmt>) -> Result<(), Located<Error>> {
        let result = match stmt.get() {
            Stmt::VarDecl(name, ty) => self.generate_decl(name, *ty),
            Stmt::Assign(place, value) => self.generate_assign(place, value),
            Stmt::If {
                then,
                elifs,
                otherwise,
            } => self.generate_if(stmt, then, elifs, otherwise.as_ref()),
            Stmt::While(arm) => self.generate_while(stmt, arm),
            Stmt::ExprStmt(expr) => self.generate_expr_stmt(stmt, expr),
            Stmt::RawAsm(text) => {
                self.raw(text);
                Ok(())
            }
        };

        // Scratch cells only live for the statement which took them.
        self.memory.release_all_scratch();
        result.map_err(|err| err.proximate_to_option_loc(stmt.loc()))
    }

    fn generate_decl(&mut self, name: &str, ty: Type) -> Result<(), Located<Error>> {
        self.memory
            .declare(name, ty)
            .map(|_| ())
            .map_err(|err| Located::from(Error::from(err)))
    }

    fn generate_expr_stmt(&mut self, stmt: &Located<Stmt>, expr: &Expr) -> Result<(), Located<Error>> {
        self.check_condition(expr).map_err(Located::from)?;
        warn!(
            "expression statement at line {} has no effect",
            stmt.line().unwrap_or_default()
        );
        Ok(())
    }

    fn generate_assign(&mut self, place: &Place, value: &Expr) -> Result<(), Located<Error>> {
        self.assign(place, value).map_err(Located::from)
    }

    fn assign(&mut self, place: &Place, value: &Expr) -> Result<(), Error> {
        let width = self.expr_type(value)?;

        let name = match place {
            Place::Var(name) => name,
            Place::Index(name, idx) => {
                self.expect_byte(width, "an array element")?;
                return match self.element(name, idx)? {
                    Some(addr) => self.assign_cell(addr, value),
                    None => self.assign_indirect(Indirect::Index(name, idx), value),
                };
            }
            Place::Deref(ptr) => {
                self.expect_byte(width, "a dereferenced pointer")?;
                self.expr_type(ptr)?;
                return match self.constant(ptr)? {
                    Some(addr) => self.assign_cell(addr, value),
                    None => self.assign_indirect(Indirect::Deref(ptr), value),
                };
            }
        };

        let sym = self.memory.resolve(name)?.clone();
        let self_assign = *value == Expr::VarRef(name.clone());
        if self_assign && self.opt_level() >= OptLevel::Aggressive {
            debug!("dropping self-assignment to '{}'", name);
            return Ok(());
        }

        match sym.ty {
            Type::Byte => {
                self.expect_byte(width, &format!("byte '{}'", name))?;
                self.assign_cell(sym.addr, value)
            }
            Type::UInt16 => self.wide_into(value, sym.addr),
            Type::ByteArray(_) => Err(Error::TypeMismatch(format!(
                "cannot assign to array '{}' as a whole",
                name
            ))),
        }
    }

    fn expect_byte(&self, width: Width, place: &str) -> Result<(), Error> {
        match width {
            Width::Byte => Ok(()),
            Width::Wide => Err(Error::TypeMismatch(format!(
                "cannot assign a 16-bit value to {}",
                place
            ))),
        }
    }

    /// Store a byte expression into a fixed cell.
    fn assign_cell(&mut self, addr: Word, value: &Expr) -> Result<(), Error> {
        match self.operand(value)? {
            Some(op @ Operand::Lit(_)) => self.store_operand(op, addr),
            _ => {
                let v = self.eval(value)?;
                self.store(v, addr)
            }
        }
    }

    /// Store a byte expression through an address only known at run time.
    /// The value is computed first and parked in `RB`, since forming the
    /// address needs `RD`, `RA` and `ACC`.
    fn assign_indirect(&mut self, target: Indirect, value: &Expr) -> Result<(), Error> {
        if let Some(op @ Operand::Lit(_)) = self.operand(value)? {
            self.place_address(target)?;
            return self.put(Dst::M, op);
        }

        let v = self.eval(value)?;
        if v != Value::Reg(GpReg::RB) {
            self.emit(Inst::Mov(Dst::Gp(GpReg::RB), v.src()))?;
        }

        self.regs.pin(GpReg::RB);
        let placed = self.place_address(target);
        self.regs.unpin(GpReg::RB);
        placed?;

        self.emit(Inst::Mov(Dst::M, Src::Gp(GpReg::RB)))?;
        Ok(())
    }

    /// Write a computed byte to `addr`.
    pub(crate) fn store(&mut self, v: Value, addr: Word) -> Result<(), Error> {
        if self.opt_level() >= OptLevel::Aggressive
            && self.regs.src_tag(v.src()) == Some(Operand::Cell(addr))
        {
            debug!("{:#06x} already holds the stored value", addr);
            return Ok(());
        }

        let mut v = v;
        if self.mar_clobbers(addr).intersects(v.regs()) {
            self.emit(Inst::Mov(Dst::Gp(GpReg::RD), v.src()))?;
            v = Value::Reg(GpReg::RD);
        }
        self.set_mar(addr)?;
        self.emit(Inst::Mov(Dst::M, v.src()))?;
        Ok(())
    }

    /// Write a known byte to `addr`.
    pub(crate) fn store_operand(&mut self, op: Operand, addr: Word) -> Result<(), Error> {
        match op {
            Operand::Lit(_) => {
                self.set_mar(addr)?;
                self.put(Dst::M, op)
            }
            Operand::Cell(_) => {
                let v = self.eval_operand(op)?;
                self.store(v, addr)
            }
        }
    }
}
