pub mod command;
pub mod report;
pub mod suite;
