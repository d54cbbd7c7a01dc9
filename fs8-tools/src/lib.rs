//! Command-line collaborators for the FS8 pack runtime
//!
//! The heavy lifting (container format, caching readers, builder) lives in
//! `fs8-archive`; this crate is the thin adapter layer: argument handling,
//! list-file parsing, directory traversal, and recursive extraction.

pub mod commands;
pub mod listfile;
