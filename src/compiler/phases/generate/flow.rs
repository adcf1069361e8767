use super::expr::Width;
use super::Error;
use crate::compiler::ast::{Arm, Block, Expr, Stmt};
use crate::compiler::phases::types::Located;
use crate::compiler::session::CompileSession;
use crate::isa::{AluOp, Cond, Inst};
use log::debug;
use std::iter;

impl CompileSession {
    /// Type-check an expression used as a condition.
    pub(super) fn check_condition(&self, cond: &Expr) -> Result<(), Error> {
        let sides: Vec<&Expr> = match cond {
            Expr::Compare(_, l, r) => vec![l.as_ref(), r.as_ref()],
            e => vec![e],
        };

        for side in sides {
            if self.expr_type(side)? == Width::Wide {
                return Err(Error::TypeMismatch(String::from(
                    "conditions compare bytes, not 16-bit values",
                )));
            }
        }
        Ok(())
    }

    /// Jump to `label` when `cond` is false, and fall through when it holds.
    fn branch_unless(&mut self, cond: &Expr, label: &str) -> Result<(), Error> {
        self.check_condition(cond)?;

        let zero = Expr::Literal(0);
        let (l, r, fails) = match cond {
            Expr::Compare(op, l, r) => {
                if let (Some(a), Some(b)) = (self.const_byte(l), self.const_byte(r)) {
                    return self.branch_known(op.test(a, b), label);
                }
                (l.as_ref(), r.as_ref(), op.fails())
            }
            e => {
                if let Some(v) = self.const_byte(e) {
                    return self.branch_known(v != 0, label);
                }
                (e, &zero, Cond::Eq)
            }
        };

        let src = self.stage_pair(l, r, AluOp::Cmp)?;
        self.emit(Inst::Alu(AluOp::Cmp, src))?;
        self.emit(Inst::Jump(fails, label.to_owned()))?;
        Ok(())
    }

    fn branch_known(&mut self, holds: bool, label: &str) -> Result<(), Error> {
        debug!("condition is always {}", holds);
        if !holds {
            self.emit(Inst::Jump(Cond::Always, label.to_owned()))?;
        }
        Ok(())
    }

    pub(super) fn generate_if(
        &mut self,
        stmt: &Located<Stmt>,
        then: &Arm,
        elifs: &[Arm],
        otherwise: Option<&Block>,
    ) -> Result<(), Located<Error>> {
        let here = |err: Error| stmt.locate(err);
        let labels = self.labels.if_labels(elifs.len());
        self.mark_label(&labels.start);

        for (i, arm) in iter::once(then).chain(elifs).enumerate() {
            let skip = match labels.elifs.get(i) {
                Some(next) => next,
                None if otherwise.is_some() => &labels.otherwise,
                None => &labels.end,
            };

            self.branch_unless(arm.cond.get(), skip)
                .map_err(|err| arm.cond.locate(err))?;
            self.block(&arm.body)?;

            if *skip != labels.end {
                self.emit(Inst::Jump(Cond::Always, labels.end.clone()))
                    .map_err(|err| here(err.into()))?;
                self.define_label(skip);
            }
        }

        if let Some(body) = otherwise {
            self.block(body)?;
        }
        self.define_label(&labels.end);
        Ok(())
    }

    pub(super) fn generate_while(&mut self, stmt: &Located<Stmt>, arm: &Arm) -> Result<(), Located<Error>> {
        let labels = self.labels.while_labels();
        self.define_label(&labels.start);

        self.branch_unless(arm.cond.get(), &labels.end)
            .map_err(|err| arm.cond.locate(err))?;
        self.block(&arm.body)?;

        self.emit(Inst::Jump(Cond::Always, labels.start.clone()))
            .map_err(|err| stmt.locate(Error::from(err)))?;
        self.define_label(&labels.end);
        Ok(())
    }
}
