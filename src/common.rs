use std::num::ParseIntError;

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .map(std::primitive::char::to_lowercase)
        .flatten()
        .eq(b.chars().map(std::primitive::char::to_lowercase).flatten())
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_ident(s: &str) -> bool {
    let mut cs = s.chars();
    cs.next().map_or(false, is_ident_start) && cs.all(is_ident_char)
}

/// Parses a decimal, `0x`, `0o` or `0b` prefixed unsigned integer.
pub fn parse_numeric(raw: &str) -> Result<u64, ParseIntError> {
    if let Some(digits) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(digits, 16)
    } else if let Some(digits) = raw.strip_prefix("0o") {
        u64::from_str_radix(digits, 8)
    } else if let Some(digits) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        u64::from_str_radix(digits, 2)
    } else {
        raw.parse::<u64>()
    }
}

pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
