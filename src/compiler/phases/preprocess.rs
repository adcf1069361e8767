use super::types::{Loc, Located};
use crate::common;
use log::debug;
use std::collections::HashMap;
use std::fmt::Display;

const DIRECTIVE_CHAR: char = '#';
const DIRECTIVES: [&str; 2] = ["define", "def"];

/// Bounds the expansion of macros which (indirectly) mention themselves.
pub const MAX_PASSES: usize = 5;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    MissingName(String),
    MissingValue(String),
    InvalidName(String),
    UnknownDirective(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingName(dir) => write!(f, "Directive '#{}' is missing a macro name", dir),
            Error::MissingValue(name) => write!(f, "Macro '{}' is missing a value", name),
            Error::InvalidName(name) => write!(f, "Invalid macro name '{}'", name),
            Error::UnknownDirective(dir) => write!(f, "Unknown directive '#{}'", dir),
        }
    }
}

fn strip_comment<'a>(line: &'a str, comment: &str) -> &'a str {
    match line.find(comment) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_directive(body: &str, comment: &str) -> Result<(String, String), Error> {
    let body = strip_comment(body, comment).trim();
    let (dir, rest) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim_start()),
        None => (body, ""),
    };

    if !DIRECTIVES.contains(&dir) {
        return Err(Error::UnknownDirective(dir.to_owned()));
    }

    let (name, value) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return Err(Error::MissingName(dir.to_owned()));
    }

    if !common::is_ident(name) {
        return Err(Error::InvalidName(name.to_owned()));
    }

    if value.is_empty() {
        return Err(Error::MissingValue(name.to_owned()));
    }

    Ok((name.to_owned(), value.to_owned()))
}

/// Replace every whole identifier in `line` which names a macro. Numeric
/// literals are skipped as a unit so that e.g. the `x1F` in `0x1F` is
/// never mistaken for an identifier.
fn substitute_once(line: &str, macros: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if common::is_ident_start(c) || c.is_ascii_digit() {
            let mut end = start + c.len_utf8();
            while let Some(&(idx, c)) = chars.peek() {
                if !common::is_ident_char(c) {
                    break;
                }
                end = idx + c.len_utf8();
                chars.next();
            }

            let word = &line[start..end];
            match macros.get(word) {
                Some(value) if common::is_ident_start(c) => out.push_str(value),
                _ => out.push_str(word),
            }
        } else {
            out.push(c);
        }
    }

    out
}

fn substitute(line: &str, macros: &HashMap<String, String>) -> String {
    let mut cur = line.to_owned();
    for _ in 0..MAX_PASSES {
        let next = substitute_once(&cur, macros);
        if next == cur {
            break;
        }
        cur = next;
    }
    cur
}

pub fn preprocess(source: &str, comment: &str) -> Result<String, Located<Error>> {
    let mut macros = HashMap::new();
    let mut body = Vec::new();

    for (line_no, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(DIRECTIVE_CHAR) {
            let col = line.len() - trimmed.len() + 1;
            let (name, value) = parse_directive(&trimmed[1..], comment)
                .map_err(|err| Located::with_loc(Loc::new(line_no + 1, col), err))?;
            macros.insert(name, value);
            body.push(None);
        } else {
            body.push(Some(line));
        }
    }

    debug!("preprocessor collected {} macro(s)", macros.len());

    let lines: Vec<String> = body
        .into_iter()
        .map(|line| match line {
            None => String::new(),
            Some(line) if macros.is_empty() => line.to_owned(),
            Some(line) => substitute(line, &macros),
        })
        .collect();

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::super::types::{Loc, Located};
    use super::{preprocess, Error};

    #[test]
    fn replaces_whole_identifiers() {
        let src = "#define LIMIT 10\nbyte x = LIMIT;\nbyte LIMITED = 1;";
        assert_eq!(
            preprocess(src, "//").unwrap(),
            "\nbyte x = 10;\nbyte LIMITED = 1;"
        );
    }

    #[test]
    fn short_form_and_comments() {
        let src = "#def A 3 // three\nx = A + A;";
        assert_eq!(preprocess(src, "//").unwrap(), "\nx = 3 + 3;");

        // Only directive lines lose their comments.
        let src = "#def A 3\nx = A; // A stays\n// A too";
        assert_eq!(
            preprocess(src, "//").unwrap(),
            "\nx = 3; // 3 stays\n// 3 too"
        );
    }

    #[test]
    fn partial_expressions_and_chains() {
        let src = "#define TWICE(x) x\n";
        assert_eq!(
            preprocess(src, "//"),
            Err(Located::with_loc(
                Loc::new(1, 1),
                Error::InvalidName(String::from("TWICE(x)"))
            ))
        );

        let src = "#define B A + 1\n#define A 2\ny = B;";
        assert_eq!(preprocess(src, "//").unwrap(), "\n\ny = 2 + 1;");
    }

    #[test]
    fn redefinition_overwrites() {
        let src = "#define N 1\n#define N 2\nz = N;";
        assert_eq!(preprocess(src, "//").unwrap(), "\n\nz = 2;");
    }

    #[test]
    fn hex_literals_untouched() {
        let src = "#define x1F 9\nw = 0x1F + x1F;";
        assert_eq!(preprocess(src, "//").unwrap(), "\nw = 0x1F + 9;");
    }

    #[test]
    fn self_reference_terminates() {
        let src = "#define L L\na = L;";
        assert_eq!(preprocess(src, "//").unwrap(), "\na = L;");
    }

    #[test]
    fn malformed_directives() {
        assert_eq!(
            preprocess("  #define", "//"),
            Err(Located::with_loc(
                Loc::new(1, 3),
                Error::MissingName(String::from("define"))
            ))
        );
        assert_eq!(
            preprocess("x;\n#define N", "//"),
            Err(Located::with_loc(
                Loc::new(2, 1),
                Error::MissingValue(String::from("N"))
            ))
        );
        assert_eq!(
            preprocess("#include foo", "//"),
            Err(Located::with_loc(
                Loc::new(1, 1),
                Error::UnknownDirective(String::from("include"))
            ))
        );
    }
}
