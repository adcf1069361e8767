pub mod assets;
pub(crate) mod common;
pub mod config;

pub mod isa;

pub mod compiler;

pub mod cli;
