use super::tokenize::{Keyword, Symbol, Token};
use super::types::{Loc, Located};
use crate::compiler::ast::{Arm, BinOp, Block, CmpOp, Expr, Place, Program, Stmt};
use crate::compiler::memory::Type;
use crate::isa::Word;
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    UnexpectedToken(Token, &'static str),
    UnexpectedEndOfStream(&'static str),
    InvalidArraySize(Word),
    NotAssignable,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedToken(tk, expected) => {
                write!(f, "Expected {}, found {}", expected, tk)
            }
            Error::UnexpectedEndOfStream(expected) => {
                write!(f, "Expected {}, found end of input", expected)
            }
            Error::InvalidArraySize(n) => write!(f, "Invalid array size {}", n),
            Error::NotAssignable => write!(f, "Left side of '=' is not assignable"),
        }
    }
}

type PResult<T> = Result<T, Located<Error>>;

struct Parser {
    tokens: std::iter::Peekable<std::vec::IntoIter<Located<Token>>>,
    last: Option<Loc>,
}

impl Parser {
    fn new(tokens: Vec<Located<Token>>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            last: None,
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(Located::get)
    }

    fn peek_sym(&mut self, sym: Symbol) -> bool {
        self.peek() == Some(&Token::Sym(sym))
    }

    fn peek_keyword(&mut self, kw: Keyword) -> bool {
        self.peek() == Some(&Token::Keyword(kw))
    }

    fn next(&mut self, expected: &'static str) -> PResult<Located<Token>> {
        match self.tokens.next() {
            Some(tk) => {
                self.last = tk.loc();
                Ok(tk)
            }
            None => Err(self.at_end(expected)),
        }
    }

    fn at_end(&self, expected: &'static str) -> Located<Error> {
        let err = Error::UnexpectedEndOfStream(expected);
        match self.last {
            Some(loc) => Located::with_loc(loc, err),
            None => Located::from(err),
        }
    }

    fn unexpected<T>(tk: Located<Token>, expected: &'static str) -> PResult<T> {
        Err(tk.map(|tk| Error::UnexpectedToken(tk, expected)))
    }

    fn expect_sym(&mut self, sym: Symbol, expected: &'static str) -> PResult<()> {
        let tk = self.next(expected)?;
        match tk.get() {
            Token::Sym(s) if *s == sym => Ok(()),
            _ => Parser::unexpected(tk, expected),
        }
    }

    fn expect_name(&mut self, expected: &'static str) -> PResult<String> {
        let tk = self.next(expected)?;
        let loc = tk.loc();
        match tk.value() {
            Token::Name(name) => Ok(name),
            other => Parser::unexpected(Parser::at(loc, other), expected),
        }
    }

    fn program(&mut self) -> PResult<Program> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            self.statement(&mut stmts)?;
        }
        Ok(Program { stmts })
    }

    /// Parse statements until one of `terminators` is next (it is not consumed).
    fn block(&mut self, terminators: &[Keyword], expected: &'static str) -> PResult<Block> {
        let mut stmts = Vec::new();
        loop {
            let done = self.peek().map(|tk| match tk {
                Token::Keyword(kw) => terminators.contains(kw),
                _ => false,
            });

            match done {
                None => return Err(self.at_end(expected)),
                Some(true) => return Ok(stmts),
                Some(false) => self.statement(&mut stmts)?,
            }
        }
    }

    fn statement(&mut self, out: &mut Block) -> PResult<()> {
        let first = self.next("a statement")?;
        match first.get() {
            Token::Sym(Symbol::Semi) => Ok(()),
            Token::Keyword(Keyword::Byte) => self.declaration(first, true, out),
            Token::Keyword(Keyword::UInt16) => self.declaration(first, false, out),
            Token::Keyword(Keyword::If) => {
                let stmt = self.if_chain()?;
                out.push(first.transfer(stmt));
                Ok(())
            }
            Token::Keyword(Keyword::While) => {
                let cond = self.condition()?;
                let body = self.block(&[Keyword::EndWhile], "'endwhile'")?;
                self.next("'endwhile'")?;
                out.push(first.transfer(Stmt::While(Arm { cond, body })));
                Ok(())
            }
            Token::RawAsm(text) => {
                let stmt = Stmt::RawAsm(text.clone());
                out.push(first.transfer(stmt));
                Ok(())
            }
            Token::Keyword(_) => Parser::unexpected(first, "a statement"),
            _ => {
                let loc = first.loc();
                let lhs = self.expression_from(Some(first))?;
                let stmt = if self.peek_sym(Symbol::Assign) {
                    self.next("'='")?;
                    let place = Parser::place(lhs).map_err(|err| Parser::at(loc, err))?;
                    Stmt::Assign(place, self.compare()?)
                } else {
                    Stmt::ExprStmt(lhs)
                };
                self.expect_sym(Symbol::Semi, "';'")?;
                out.push(Parser::at(loc, stmt));
                Ok(())
            }
        }
    }

    fn at<T>(loc: Option<Loc>, val: T) -> Located<T> {
        match loc {
            Some(loc) => Located::with_loc(loc, val),
            None => Located::from(val),
        }
    }

    fn place(e: Expr) -> Result<Place, Error> {
        match e {
            Expr::VarRef(name) => Ok(Place::Var(name)),
            Expr::ArrayIndex(name, idx) => Ok(Place::Index(name, *idx)),
            Expr::Deref(addr) => Ok(Place::Deref(*addr)),
            _ => Err(Error::NotAssignable),
        }
    }

    fn declaration(&mut self, first: Located<Token>, byte: bool, out: &mut Block) -> PResult<()> {
        if byte && self.peek_sym(Symbol::LBracket) {
            self.next("'['")?;
            let size = self.next("an array size")?;
            let n = match size.get() {
                Token::Int(0) => return Err(size.transfer(Error::InvalidArraySize(0))),
                Token::Int(n) => *n,
                _ => return Parser::unexpected(size, "an array size"),
            };
            self.expect_sym(Symbol::RBracket, "']'")?;
            let name = self.expect_name("a variable name")?;
            self.expect_sym(Symbol::Semi, "';'")?;
            out.push(first.transfer(Stmt::VarDecl(name, Type::ByteArray(usize::from(n)))));
            return Ok(());
        }

        let ty = if byte { Type::Byte } else { Type::UInt16 };
        let name = self.expect_name("a variable name")?;
        let decl = first.locate(Stmt::VarDecl(name.clone(), ty));
        out.push(decl);

        if self.peek_sym(Symbol::Assign) {
            self.next("'='")?;
            let value = self.compare()?;
            out.push(first.transfer(Stmt::Assign(Place::Var(name), value)));
        }

        self.expect_sym(Symbol::Semi, "';'")?;
        Ok(())
    }

    fn if_chain(&mut self) -> PResult<Stmt> {
        const ARM_END: [Keyword; 3] = [Keyword::Elif, Keyword::Else, Keyword::EndIf];

        let cond = self.condition()?;
        let body = self.block(&ARM_END, "'elif', 'else' or 'endif'")?;
        let then = Arm { cond, body };

        let mut elifs = Vec::new();
        while self.peek_keyword(Keyword::Elif) {
            self.next("'elif'")?;
            let cond = self.condition()?;
            let body = self.block(&ARM_END, "'elif', 'else' or 'endif'")?;
            elifs.push(Arm { cond, body });
        }

        let otherwise = if self.peek_keyword(Keyword::Else) {
            self.next("'else'")?;
            Some(self.block(&[Keyword::EndIf], "'endif'")?)
        } else {
            None
        };

        self.next("'endif'")?;
        Ok(Stmt::If {
            then,
            elifs,
            otherwise,
        })
    }

    fn condition(&mut self) -> PResult<Located<Expr>> {
        let loc = self.tokens.peek().and_then(Located::loc);
        let e = self.compare()?;
        Ok(Parser::at(loc, e))
    }

    fn cmp_op(tk: &Token) -> Option<CmpOp> {
        match tk {
            Token::Sym(Symbol::EqEq) => Some(CmpOp::Eq),
            Token::Sym(Symbol::NotEq) => Some(CmpOp::Ne),
            Token::Sym(Symbol::Lt) => Some(CmpOp::Lt),
            Token::Sym(Symbol::Gt) => Some(CmpOp::Gt),
            Token::Sym(Symbol::Le) => Some(CmpOp::Le),
            Token::Sym(Symbol::Ge) => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn compare(&mut self) -> PResult<Expr> {
        let lhs = self.expression_from(None)?;
        match self.peek().and_then(Parser::cmp_op) {
            Some(op) => {
                self.next("a comparison")?;
                let rhs = self.expression_from(None)?;
                Ok(Expr::cmp(op, lhs, rhs))
            }
            None => Ok(lhs),
        }
    }

    /// `first`, when given, is an already consumed first token of the expression.
    fn expression_from(&mut self, first: Option<Located<Token>>) -> PResult<Expr> {
        let mut lhs = self.term(first)?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(Symbol::Amp)) => BinOp::And,
                Some(Token::Sym(Symbol::Caret)) => BinOp::Xor,
                _ => return Ok(lhs),
            };
            self.next("an operator")?;
            lhs = Expr::bin(op, lhs, self.term(None)?);
        }
    }

    fn term(&mut self, first: Option<Located<Token>>) -> PResult<Expr> {
        let mut lhs = self.unary(first)?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(Symbol::Plus)) => BinOp::Add,
                Some(Token::Sym(Symbol::Minus)) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.next("an operator")?;
            lhs = Expr::bin(op, lhs, self.unary(None)?);
        }
    }

    fn unary(&mut self, first: Option<Located<Token>>) -> PResult<Expr> {
        let tk = match first {
            Some(tk) => tk,
            None => self.next("an expression")?,
        };

        match tk.get() {
            Token::Sym(Symbol::Star) => Ok(Expr::Deref(Box::new(self.unary(None)?))),
            Token::Sym(Symbol::Tilde) => Ok(Expr::Not(Box::new(self.unary(None)?))),
            Token::Sym(Symbol::Amp) => Ok(Expr::AddrOf(self.expect_name("a variable name")?)),
            _ => self.primary(tk),
        }
    }

    fn primary(&mut self, tk: Located<Token>) -> PResult<Expr> {
        match tk.get() {
            Token::Int(v) => Ok(Expr::Literal(*v)),
            Token::Sym(Symbol::LParen) => {
                let e = self.compare()?;
                self.expect_sym(Symbol::RParen, "')'")?;
                Ok(e)
            }
            Token::Name(name) => {
                let name = name.clone();
                if self.peek_sym(Symbol::LBracket) {
                    self.next("'['")?;
                    let idx = self.expression_from(None)?;
                    self.expect_sym(Symbol::RBracket, "']'")?;
                    Ok(Expr::ArrayIndex(name, Box::new(idx)))
                } else {
                    Ok(Expr::VarRef(name))
                }
            }
            _ => Parser::unexpected(tk, "an expression"),
        }
    }
}

pub fn parse(tokens: Vec<Located<Token>>) -> Result<Program, Located<Error>> {
    Parser::new(tokens).program()
}
