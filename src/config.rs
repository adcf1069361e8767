use crate::compiler::memory::{Layout, SCRATCH_BYTES};
use crate::compiler::phases::tokenize;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "arnc.config.json";

/// The largest address space the 16-bit address pair can reach.
pub const MAX_MEMORY_SIZE: u32 = 0x1_0000;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "Could not access configuration file: {}", err),
            Error::Json(err) => write!(f, "Invalid JSON in configuration file: {}", err),
            Error::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// How hard the register allocator tries to reuse values it already holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum OptLevel {
    /// Reload every operand.
    None = 0,
    /// Track register and address contents and skip redundant loads.
    Cache = 1,
    /// Also drop self-assignments and stores of values already in place.
    Aggressive = 2,
}

impl Default for OptLevel {
    fn default() -> Self {
        OptLevel::Cache
    }
}

impl TryFrom<u8> for OptLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        OptLevel::from_u8(v).ok_or_else(|| format!("optimization level {} is not in 0-2", v))
    }
}

impl From<OptLevel> for u8 {
    fn from(level: OptLevel) -> u8 {
        level as u8
    }
}

impl FromStr for OptLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = s
            .parse::<u8>()
            .map_err(|_| format!("'{}' is not an optimization level", s))?;
        OptLevel::try_from(v)
    }
}

impl Display for OptLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub comment_char: String,
    pub variable_start_addr: u32,
    pub variable_end_addr: u32,
    pub stack_start_addr: u32,
    pub stack_size: u32,
    pub memory_size: u32,
    pub optimization_level: OptLevel,
    pub debug_mode: bool,
    pub verbose: bool,
    pub show_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            comment_char: String::from("//"),
            variable_start_addr: 0x0000,
            variable_end_addr: 0x0200,
            stack_start_addr: 0x0100,
            stack_size: 256,
            memory_size: MAX_MEMORY_SIZE,
            optimization_level: OptLevel::default(),
            debug_mode: false,
            verbose: false,
            show_stats: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        Config::from_json(&std::fs::read_to_string(path)?)
    }

    /// Loads `path` if it exists, and the defaults otherwise.
    pub fn from_file_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Config::from_file(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout {
            variable_start: self.variable_start_addr,
            variable_end: self.variable_end_addr,
            stack_start: self.stack_start_addr,
            stack_size: self.stack_size,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::Invalid(msg));

        if self.comment_char.trim().is_empty() {
            return invalid(String::from("comment_char must not be empty"));
        }

        if tokenize::marker_collides(&self.comment_char) {
            return invalid(format!(
                "comment_char '{}' clashes with the language's own syntax",
                self.comment_char
            ));
        }

        if self.memory_size == 0 || self.memory_size > MAX_MEMORY_SIZE {
            return invalid(format!(
                "memory_size {} must be between 1 and {}",
                self.memory_size, MAX_MEMORY_SIZE
            ));
        }

        if self.variable_start_addr >= self.variable_end_addr {
            return invalid(format!(
                "variable range {:#06x}-{:#06x} is empty",
                self.variable_start_addr, self.variable_end_addr
            ));
        }

        if self.variable_end_addr > self.memory_size {
            return invalid(format!(
                "variable range ends at {:#06x}, past the end of memory",
                self.variable_end_addr
            ));
        }

        let layout = self.layout();
        if layout.stack_end() > self.memory_size {
            return invalid(format!(
                "stack {:#06x}+{} runs past the end of memory",
                self.stack_start_addr, self.stack_size
            ));
        }

        if layout.stack_covers_variables() {
            return invalid(format!(
                "stack {:#06x}-{:#06x} covers the start of the variable range",
                self.stack_start_addr,
                layout.stack_end()
            ));
        }

        let (start, end) = layout.variable_region();
        if ((end - start) as usize) <= SCRATCH_BYTES {
            return invalid(format!(
                "variable range {:#06x}-{:#06x} leaves no room beside the {} scratch bytes",
                start, end, SCRATCH_BYTES
            ));
        }

        Ok(())
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let on_off = |b: bool| if b { "enabled" } else { "disabled" };

        writeln!(f, "=== Compiler Configuration ===")?;
        writeln!(f, "  Comment string:           {}", self.comment_char)?;
        writeln!(
            f,
            "  Variable memory range:    0x{:04X} - 0x{:04X}",
            self.variable_start_addr, self.variable_end_addr
        )?;
        writeln!(
            f,
            "  Stack start address:      0x{:04X}",
            self.stack_start_addr
        )?;
        writeln!(f, "  Stack size:               {} bytes", self.stack_size)?;
        writeln!(f, "  Total memory size:        {} bytes", self.memory_size)?;
        writeln!(
            f,
            "  Optimization level:       {}",
            self.optimization_level
        )?;
        writeln!(f, "  Debug mode:               {}", on_off(self.debug_mode))?;
        writeln!(f, "  Verbose output:           {}", on_off(self.verbose))?;
        write!(f, "  Show statistics:          {}", on_off(self.show_stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = Config::from_json(r#"{ "variable_end_addr": 768, "optimization_level": 2 }"#)
            .unwrap();
        assert_eq!(cfg.variable_end_addr, 768);
        assert_eq!(cfg.optimization_level, OptLevel::Aggressive);
        assert_eq!(cfg.comment_char, "//");
    }

    #[test]
    fn json_round_trip() {
        let mut cfg = Config::default();
        cfg.stack_size = 512;
        cfg.optimization_level = OptLevel::None;
        assert_eq!(Config::from_json(&cfg.to_json().unwrap()).unwrap(), cfg);
    }

    #[test]
    fn bad_opt_level() {
        assert!(Config::from_json(r#"{ "optimization_level": 3 }"#).is_err());
        assert!("7".parse::<OptLevel>().is_err());
        assert_eq!("0".parse::<OptLevel>(), Ok(OptLevel::None));
    }

    #[test]
    fn rejects_bad_layouts() {
        let mut cfg = Config::default();
        cfg.stack_start_addr = 0x0000;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.variable_end_addr = 0x2_0000;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.comment_char = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.variable_start_addr = 0x00FC;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn comment_markers() {
        for ok in &["//", "%", "@", "%%"] {
            let mut cfg = Config::default();
            cfg.comment_char = String::from(*ok);
            assert!(cfg.validate().is_ok(), "{:?}", ok);
        }

        for bad in &[";", "=", "!", "-", "#", "x", "1", " //", "  "] {
            let mut cfg = Config::default();
            cfg.comment_char = String::from(*bad);
            assert!(cfg.validate().is_err(), "{:?}", bad);
        }
    }
}
