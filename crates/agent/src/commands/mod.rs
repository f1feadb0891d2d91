//! Agent subcommands

pub mod enroll;
pub mod export;
pub mod run;
