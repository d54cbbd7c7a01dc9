//! Thread-local zstd codec contexts
//!
//! Context allocation is amortized by keeping one compression and one
//! decompression context per thread, created on first use and reused across
//! calls. The compressor is rebuilt only when a different compression level
//! is requested.

use std::cell::RefCell;

use zstd::bulk::{Compressor, Decompressor};

use crate::error::{Fs8Error, Result};

thread_local! {
    static COMPRESSOR: RefCell<Option<(i32, Compressor<'static>)>> = const { RefCell::new(None) };
    static DECOMPRESSOR: RefCell<Option<Decompressor<'static>>> = const { RefCell::new(None) };
}

/// Compress `src` at the given zstd level.
pub fn compress(src: &[u8], level: i32) -> Result<Vec<u8>> {
    COMPRESSOR.with(|slot| {
        let mut slot = slot.borrow_mut();
        if !matches!(&*slot, Some((cached_level, _)) if *cached_level == level) {
            *slot = Some((level, Compressor::new(level)?));
        }
        let Some((_, compressor)) = slot.as_mut() else {
            return Err(Fs8Error::InternalInvariant(
                "compression context missing after creation".to_string(),
            ));
        };
        compressor.compress(src).map_err(Fs8Error::Io)
    })
}

/// Decompress `src` into `dst`, which must be exactly the expected
/// decompressed length.
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<()> {
    DECOMPRESSOR.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(Decompressor::new()?);
        }
        let Some(decompressor) = slot.as_mut() else {
            return Err(Fs8Error::InternalInvariant(
                "decompression context missing after creation".to_string(),
            ));
        };

        let written = decompressor
            .decompress_to_buffer(src, dst)
            .map_err(|e| Fs8Error::CorruptArchive(format!("zstd decompression failed: {e}")))?;

        if written != dst.len() {
            return Err(Fs8Error::CorruptArchive(format!(
                "decompressed size mismatch: expected {} bytes, got {written}",
                dst.len()
            )));
        }
        Ok(())
    })
}
