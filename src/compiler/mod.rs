pub mod ast;
pub mod labels;
pub mod memory;
pub mod phases;
pub mod regalloc;
pub mod session;

pub use phases::emit::{Output, Stats};
pub use phases::types::Error;

use crate::config::Config;
use ast::Program;
use log::info;
use session::CompileSession;

/// Run the front half of the pipeline: preprocess, tokenize and parse.
pub fn check(source: &str, config: &Config) -> Result<Program, Error> {
    config.validate()?;

    let text = phases::preprocess(source, &config.comment_char)?;
    info!("preprocessed {} line(s)", text.lines().count());

    let tokens = phases::tokenize(&text, &config.comment_char)?;
    info!("read {} token(s)", tokens.len());

    let program = phases::parse(tokens)?;
    info!("parsed {} statement(s)", program.stmt_count());

    Ok(program)
}

pub fn compile(source: &str, config: &Config) -> Result<Output, Error> {
    let program = check(source, config)?;

    let mut session = CompileSession::new(config);
    phases::generate(&program, &mut session)?;

    let (lines, memory) = session.into_parts();
    Ok(phases::emit(lines, &memory, &config.comment_char))
}
