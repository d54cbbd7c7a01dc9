//! FS8 compressed resource pack runtime
//!
//! An FS8 pack bundles many named byte blobs into one read-optimized
//! container; each blob is independently zstd-compressed so it can be
//! fetched on demand without touching the rest. The crate provides the
//! on-disk container codec, a process-wide registry that deduplicates
//! loaded packs and lazily manages their file handles, reader handles with
//! a per-pack small-blob cache, and the builder that produces signed packs.
//!
//! ## Reading
//!
//! ```no_run
//! use fs8_archive::Fs8Reader;
//!
//! # fn main() -> fs8_archive::Result<()> {
//! let reader = Fs8Reader::open_file("assets.fs8")?;
//! let config = reader.read("config/settings.blk")?;
//! assert_eq!(config.len() as u64, reader.size("Config/Settings.blk"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Building
//!
//! ```no_run
//! use fs8_archive::PackBuilder;
//!
//! # fn main() -> fs8_archive::Result<()> {
//! PackBuilder::new("assets")
//!     .entry("config/settings.blk", "")
//!     .entry("textures/stone.dds", "stone.dds")
//!     .compression_level(3)
//!     .build("assets.fs8")?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod codec;
pub mod error;
pub mod format;
mod keeper;
mod logging;
mod partition;
pub mod reader;
pub mod registry;

pub use builder::PackBuilder;
pub use error::{Fs8Error, Result};
pub use format::signature::verify_signature;
pub use logging::{set_error_log_callback, ErrorLogCallback};
pub use reader::Fs8Reader;
pub use registry::{PackRegistry, RegistryStats};

/// Sweep idle pack file handles on the global registry.
///
/// Intended to be called periodically from the host application's main
/// loop; sweeps are throttled internally.
pub fn tick() {
    PackRegistry::global().tick();
}
