pub mod types;

pub mod emit;
pub mod generate;
pub mod parse;
pub mod preprocess;
pub mod tokenize;

pub use emit::emit;
pub use generate::generate;
pub use parse::parse;
pub use preprocess::preprocess;
pub use tokenize::tokenize;
