use super::memory::Type;
use super::phases::types::Located;
use crate::isa::{Cond, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    /// Evaluate the comparison on two known bytes, unsigned.
    pub fn test(self, a: u8, b: u8) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Gt => a > b,
            CmpOp::Le => a <= b,
            CmpOp::Ge => a >= b,
        }
    }

    /// The branch which is taken when the comparison fails.
    pub fn fails(self) -> Cond {
        match self {
            CmpOp::Eq => Cond::Ne,
            CmpOp::Ne => Cond::Eq,
            CmpOp::Lt => Cond::Ge,
            CmpOp::Gt => Cond::Le,
            CmpOp::Le => Cond::Gt,
            CmpOp::Ge => Cond::Lt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Word),
    VarRef(String),
    ArrayIndex(String, Box<Expr>),
    Deref(Box<Expr>),
    AddrOf(String),
    Not(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinOp(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Compare(op, Box::new(lhs), Box::new(rhs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Var(String),
    Index(String, Expr),
    Deref(Expr),
}

pub type Block = Vec<Located<Stmt>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arm {
    pub cond: Located<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    VarDecl(String, Type),
    Assign(Place, Expr),
    If {
        then: Arm,
        elifs: Vec<Arm>,
        otherwise: Option<Block>,
    },
    While(Arm),
    ExprStmt(Expr),
    RawAsm(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub stmts: Block,
}

impl Program {
    /// Counts statements, including those nested in blocks.
    pub fn stmt_count(&self) -> usize {
        fn count(block: &[Located<Stmt>]) -> usize {
            block
                .iter()
                .map(|stmt| {
                    1 + match stmt.get() {
                        Stmt::If {
                            then,
                            elifs,
                            otherwise,
                        } => {
                            count(&then.body)
                                + elifs.iter().map(|arm| count(&arm.body)).sum::<usize>()
                                + otherwise.as_deref().map_or(0, count)
                        }
                        Stmt::While(arm) => count(&arm.body),
                        _ => 0,
                    }
                })
                .sum()
        }
        count(&self.stmts)
    }
}
