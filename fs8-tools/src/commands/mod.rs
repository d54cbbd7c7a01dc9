//! Subcommand implementations for the `fs8` binary

pub mod extract;
pub mod pack;
