use super::types::{Loc, Located};
use crate::common;
use crate::isa::types::{Word, WORD_MAX};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::Display;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    UnexpectedChar(char, String),
    MalformedToken(String, &'static str),
    UnterminatedAsmBlock,
    StrayEndAsm,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedChar(c, excerpt) => {
                write!(f, "Unexpected character '{}' in: {}", c, excerpt)
            }
            Error::MalformedToken(raw, msg) => write!(f, "Malformed token '{}': {}", raw, msg),
            Error::UnterminatedAsmBlock => write!(f, "'dasm' block has no matching 'endasm'"),
            Error::StrayEndAsm => write!(f, "'endasm' without an opening 'dasm'"),
        }
    }
}

const DASM: &str = "dasm";
const ENDASM: &str = "endasm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Keyword {
    Byte,
    UInt16,
    If,
    Elif,
    Else,
    EndIf,
    While,
    EndWhile,
}

impl Keyword {
    pub fn text(self) -> &'static str {
        match self {
            Keyword::Byte => "byte",
            Keyword::UInt16 => "uint16",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::EndIf => "endif",
            Keyword::While => "while",
            Keyword::EndWhile => "endwhile",
        }
    }
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> =
    Lazy::new(|| Keyword::iter().map(|kw| (kw.text(), kw)).collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Plus,
    Minus,
    Amp,
    Caret,
    Tilde,
    Star,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Semi,
}

impl Symbol {
    // Two-character symbols come first so that they win over their prefixes.
    const TABLE: [(&'static str, Symbol); 18] = [
        ("==", Symbol::EqEq),
        ("!=", Symbol::NotEq),
        ("<=", Symbol::Le),
        (">=", Symbol::Ge),
        ("+", Symbol::Plus),
        ("-", Symbol::Minus),
        ("&", Symbol::Amp),
        ("^", Symbol::Caret),
        ("~", Symbol::Tilde),
        ("*", Symbol::Star),
        ("=", Symbol::Assign),
        ("<", Symbol::Lt),
        (">", Symbol::Gt),
        ("[", Symbol::LBracket),
        ("]", Symbol::RBracket),
        ("(", Symbol::LParen),
        (")", Symbol::RParen),
        (";", Symbol::Semi),
    ];

    fn text(self) -> &'static str {
        Symbol::TABLE
            .iter()
            .find(|(_, sym)| *sym == self)
            .map(|(text, _)| *text)
            .unwrap_or("?")
    }

    fn match_prefix(s: &str) -> Option<(Symbol, usize)> {
        Symbol::TABLE
            .iter()
            .find(|(text, _)| s.starts_with(text))
            .map(|(text, sym)| (*sym, text.len()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Keyword(Keyword),
    Name(String),
    Int(Word),
    Sym(Symbol),
    RawAsm(String),
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "keyword '{}'", kw.text()),
            Token::Name(name) => write!(f, "identifier '{}'", name),
            Token::Int(v) => write!(f, "integer {}", v),
            Token::Sym(sym) => write!(f, "'{}'", sym.text()),
            Token::RawAsm(_) => write!(f, "raw assembly block"),
        }
    }
}

impl Token {
    fn parse_word(raw: &str) -> Token {
        match KEYWORDS.get(raw) {
            Some(kw) => Token::Keyword(*kw),
            None => Token::Name(raw.to_owned()),
        }
    }

    fn parse_numeric(raw: &str) -> Result<Token, Error> {
        let val = common::parse_numeric(raw)
            .map_err(|_| Error::MalformedToken(raw.to_owned(), "could not parse numeric"))?;

        if val > u64::from(WORD_MAX) {
            return Err(Error::MalformedToken(
                raw.to_owned(),
                "integer literal exceeds 16 bits",
            ));
        }

        Word::try_from(val)
            .map(Token::Int)
            .map_err(|_| Error::MalformedToken(raw.to_owned(), "integral value out of bounds"))
    }
}

/// Whether a comment marker would swallow text the lexer or the
/// preprocessor needs: identifiers, numbers, directives or any symbol.
pub fn marker_collides(marker: &str) -> bool {
    match marker.chars().next() {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || common::is_ident_char(c)
                || c == '#'
                || Symbol::TABLE.iter().any(|(text, _)| text.starts_with(c))
        }
    }
}

/// An in-progress `dasm` block: where it opened and the lines seen so far.
struct OpenAsm {
    loc: Loc,
    body: Vec<String>,
}

/// Find `word` in `line` as a whole identifier.
fn find_word(line: &str, word: &str) -> Option<usize> {
    line.match_indices(word).map(|(idx, _)| idx).find(|&idx| {
        let before = line[..idx].chars().next_back();
        let after = line[idx + word.len()..].chars().next();
        !before.map_or(false, common::is_ident_char) && !after.map_or(false, common::is_ident_char)
    })
}

struct Lexer<'a> {
    comment: &'a str,
    tokens: Vec<Located<Token>>,
    open: Option<OpenAsm>,
}

impl<'a> Lexer<'a> {
    fn new(comment: &'a str) -> Self {
        Lexer {
            comment,
            tokens: Vec::new(),
            open: None,
        }
    }

    fn push(&mut self, line_no: usize, idx: usize, tk: Token) {
        self.tokens
            .push(Located::with_loc(Loc::new(line_no, idx + 1), tk));
    }

    fn consume_line(&mut self, line_no: usize, line: &str) -> Result<(), Located<Error>> {
        let mut start = 0;

        if let Some(open) = self.open.as_mut() {
            match find_word(line, ENDASM) {
                None => {
                    open.body.push(line.to_owned());
                    return Ok(());
                }
                Some(end) => {
                    if !line[..end].trim().is_empty() {
                        open.body.push(line[..end].to_owned());
                    }
                    start = end + ENDASM.len();
                }
            }

            if let Some(open) = self.open.take() {
                self.tokens
                    .push(Located::with_loc(open.loc, Token::RawAsm(open.body.join("\n"))));
            }
        }

        self.consume_from(line_no, line, start)
    }

    fn consume_from(
        &mut self,
        line_no: usize,
        line: &str,
        start: usize,
    ) -> Result<(), Located<Error>> {
        let err_at = |idx: usize, err: Error| Located::with_loc(Loc::new(line_no, idx + 1), err);
        let mut chars = line[start..]
            .char_indices()
            .map(|(idx, c)| (idx + start, c))
            .peekable();

        while let Some((idx, c)) = chars.next() {
            if c.is_whitespace() {
                continue;
            }

            if line[idx..].starts_with(self.comment) {
                return Ok(());
            }

            if common::is_ident_start(c) || c.is_ascii_digit() {
                let mut end = idx + c.len_utf8();
                while let Some(&(next, c)) = chars.peek() {
                    if !common::is_ident_char(c) {
                        break;
                    }
                    end = next + c.len_utf8();
                    chars.next();
                }

                let raw = &line[idx..end];
                if c.is_ascii_digit() {
                    let tk = Token::parse_numeric(raw).map_err(|err| err_at(idx, err))?;
                    self.push(line_no, idx, tk);
                } else if raw == DASM {
                    self.open_asm(line_no, idx, &line[end..]);
                    return Ok(());
                } else if raw == ENDASM {
                    return Err(err_at(idx, Error::StrayEndAsm));
                } else {
                    self.push(line_no, idx, Token::parse_word(raw));
                }
                continue;
            }

            match Symbol::match_prefix(&line[idx..]) {
                Some((sym, len)) => {
                    for _ in 1..len {
                        chars.next();
                    }
                    self.push(line_no, idx, Token::Sym(sym));
                }
                None => {
                    return Err(err_at(
                        idx,
                        Error::UnexpectedChar(c, line.trim().to_owned()),
                    ))
                }
            }
        }

        Ok(())
    }

    fn open_asm(&mut self, line_no: usize, idx: usize, rest: &str) {
        let mut open = OpenAsm {
            loc: Loc::new(line_no, idx + 1),
            body: Vec::new(),
        };

        // `dasm ... endasm` may also sit on one line.
        match find_word(rest, ENDASM) {
            Some(end) => {
                let body = rest[..end].trim();
                self.tokens
                    .push(Located::with_loc(open.loc, Token::RawAsm(body.to_owned())));
                // Anything after the terminator on the same line is dropped
                // along with it, as for a trailing comment.
            }
            None => {
                if !rest.trim().is_empty() {
                    open.body.push(rest.trim().to_owned());
                }
                self.open = Some(open);
            }
        }
    }

    fn finish(self) -> Result<Vec<Located<Token>>, Located<Error>> {
        match self.open {
            Some(open) => Err(Located::with_loc(open.loc, Error::UnterminatedAsmBlock)),
            None => Ok(self.tokens),
        }
    }
}

pub fn tokenize(source: &str, comment: &str) -> Result<Vec<Located<Token>>, Located<Error>> {
    let mut lexer = Lexer::new(comment);
    for (line_no, line) in source.lines().enumerate() {
        lexer.consume_line(line_no + 1, line)?;
    }
    lexer.finish()
}
