use crate::compiler::{self, Output};
use crate::config::Config;
use once_cell::sync::Lazy;
use std::path::PathBuf;

pub const DEFAULT_SOURCE_EXT: &str = "arn";
pub const DEFAULT_OUTPUT_EXT: &str = "asm";

pub fn default_suite_dir() -> PathBuf {
    ["arn", "test"].iter().collect()
}

pub static DEMO_SRC: &str = include_str!("assets/demo.arn");
static DEMO_OUTPUT: Lazy<Result<Output, compiler::Error>> =
    Lazy::new(|| compiler::compile(DEMO_SRC, &Config::default()));

/// The packaged demo program, compiled with the default configuration.
pub fn demo() -> Result<&'static Output, &'static compiler::Error> {
    Lazy::force(&DEMO_OUTPUT).as_ref()
}
