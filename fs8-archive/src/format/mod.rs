//! On-disk FS8 container format
//!
//! A pack is a fixed 24-byte header, a concatenation of independently
//! zstd-compressed blobs, the serialized file-info table, and a trailing
//! signature record aligned to an 8-byte boundary. All multi-byte integers
//! are little-endian. The modules here are pure byte-level logic; file IO
//! stays with the partition, builder, and signature routines.

pub mod header;
pub mod signature;
pub mod table;

pub use header::{Header, HEADER_SIZE, MAGIC, VERSION_BYTES};
pub use signature::verify_signature;
pub use table::{normalize_name, FileInfo, FileInfoMap};
