use super::{generate, parse, preprocess, tokenize};
use crate::config;
use derive_more::Constructor;
use std::fmt::Display;

/*
    Phases:

        1.  Preprocessing: `#define` directives are collected and removed (leaving a blank
            line in their place, so that line numbers survive), and every whole-identifier
            occurrence of a macro name is replaced by its value.

        2.  Tokenization: comments are stripped, and each line is split into `Token`s,
            except for the body of `dasm ... endasm` blocks which is captured verbatim.

        3.  Parsing: the token stream is parsed by recursive descent into a list of
            `Stmt`s. Declarations with initializers become a `VarDecl` followed by an
            `Assign`.

        4.  Generation: statements are lowered one at a time into `Line`s (instructions,
            label definitions, raw assembly), threading a single `CompileSession` which owns
            the symbol table, the register cache and the label counters.

        5.  Emission: the lines are rendered as assembly text and the statistics are tallied.

    Every phase either finishes or fails with a `Located` error, and nothing downstream
    runs after a failure.
*/

#[derive(Debug, PartialEq, Clone, Copy, Eq, Constructor)]
pub struct Loc {
    line: usize,
    col: usize,
}

impl Loc {
    pub fn line(&self) -> usize {
        self.line
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Located<T: Sized> {
    loc: Option<Loc>,
    val: T,
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.col)
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.loc {
            None => write!(f, "@<unknown location>: {}", self.val),
            Some(loc) => write!(f, "@{}: {}", loc, self.val),
        }
    }
}

impl<T> Located<T> {
    fn new(loc: Option<Loc>, val: T) -> Self {
        Located { loc, val }
    }

    pub fn with_loc(loc: Loc, val: T) -> Self {
        Located::new(Some(loc), val)
    }

    pub fn loc(&self) -> Option<Loc> {
        self.loc
    }

    pub fn line(&self) -> Option<usize> {
        self.loc.map(|loc| loc.line)
    }

    pub fn value(self) -> T {
        self.val
    }

    pub fn get(&self) -> &T {
        &self.val
    }

    pub fn proximate_to_option_loc(self, loc: Option<Loc>) -> Self {
        match self.loc {
            None => Self { loc, ..self },
            Some(_) => self,
        }
    }

    /// Attach this value's location to another value.
    pub fn locate<S>(&self, s: S) -> Located<S> {
        Located::new(self.loc, s)
    }

    pub fn map<S, F>(self, f: F) -> Located<S>
    where
        F: FnOnce(T) -> S,
    {
        Located::new(self.loc, f(self.val))
    }

    pub fn transfer<S>(self, s: S) -> Located<S> {
        Located::new(self.loc, s)
    }
}

impl<T> From<T> for Located<T> {
    fn from(val: T) -> Self {
        Located { loc: None, val }
    }
}

impl<T> Located<Located<T>> {
    pub fn flatten(self) -> Located<T> {
        self.val.proximate_to_option_loc(self.loc)
    }
}

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The configuration was rejected before any source was read.
    Config(String),
    Preprocess(Located<preprocess::Error>),
    Tokenize(Located<tokenize::Error>),
    Parse(Located<parse::Error>),
    Generate(Located<generate::Error>),
}

impl Error {
    /// The source line the error was reported against, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Config(_) => None,
            Error::Preprocess(err) => err.line(),
            Error::Tokenize(err) => err.line(),
            Error::Parse(err) => err.line(),
            Error::Generate(err) => err.line(),
        }
    }

    /// `Internal` generator errors mean the compiler itself is broken, not
    /// the program being compiled.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Generate(err) if err.get().is_internal())
    }
}

impl From<config::Error> for Error {
    fn from(err: config::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<Located<preprocess::Error>> for Error {
    fn from(err: Located<preprocess::Error>) -> Self {
        Error::Preprocess(err)
    }
}

impl From<Located<tokenize::Error>> for Error {
    fn from(err: Located<tokenize::Error>) -> Self {
        Error::Tokenize(err)
    }
}

impl From<Located<parse::Error>> for Error {
    fn from(err: Located<parse::Error>) -> Self {
        Error::Parse(err)
    }
}

impl From<Located<generate::Error>> for Error {
    fn from(err: Located<generate::Error>) -> Self {
        Error::Generate(err)
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compile Error (in ")?;
        match self {
            Error::Config(_) => write!(f, "Configuration"),
            Error::Preprocess(_) => write!(f, "Preprocessor"),
            Error::Tokenize(_) => write!(f, "Lexer"),
            Error::Parse(_) => write!(f, "Parser"),
            Error::Generate(_) => write!(f, "Generator"),
        }?;
        write!(f, "): ")?;
        match self {
            Error::Config(msg) => write!(f, "{}", msg),
            Error::Preprocess(err) => write!(f, "{}", err),
            Error::Tokenize(err) => write!(f, "{}", err),
            Error::Parse(err) => write!(f, "{}", err),
            Error::Generate(err) => write!(f, "{}", err),
        }
    }
}
