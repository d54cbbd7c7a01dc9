//! Integrity signature: the trailing record and its rolling hash
//!
//! The signature record sits at the 8-aligned offset recorded in the header:
//! `u32 size`, `u32 type`, then the type-specific payload. Type 1 carries a
//! single `u32` rolling hash over every byte of the file before the record.
//!
//! The hash consumes the input as little-endian 32-bit words and drops any
//! trailing 1-3 bytes. That tail-insensitivity is part of the on-disk
//! contract and is reproduced here bit-for-bit.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::format::header::{Header, HEADER_SIZE};

/// Total size of a type-1 signature record
pub const SIGNATURE_RECORD_SIZE: u32 = 12;

/// Record type carrying a single rolling-sum hash
pub const SIGNATURE_TYPE_FHASH: u32 = 1;

const HASH_CHUNK_SIZE: usize = 128 * 1024;

/// Fold a block of bytes into the rolling hash.
///
/// Only whole 32-bit words are consumed; a trailing tail shorter than 4
/// bytes is dropped. Callers streaming multiple blocks must keep every block
/// but the last word-aligned.
pub fn fhash_update(hash: &mut u32, block: &[u8]) {
    let mut h = *hash;
    for word in block.chunks_exact(4) {
        let w = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        h = h.wrapping_add(
            w.wrapping_add(h.wrapping_mul(33))
                .wrapping_add(1)
                .wrapping_add(h >> 6),
        );
    }
    *hash = h;
}

/// Hash the file contents from the current position to EOF, then append a
/// type-1 signature record.
///
/// The builder calls this after the pack body has been padded so that EOF is
/// the 8-aligned signature offset recorded in the header.
pub fn sign_file(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    let mut hash = 0u32;
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = read_full(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        fhash_update(&mut hash, &buf[..n]);
    }

    file.write_u32::<LittleEndian>(SIGNATURE_RECORD_SIZE)?;
    file.write_u32::<LittleEndian>(SIGNATURE_TYPE_FHASH)?;
    file.write_u32::<LittleEndian>(hash)?;
    Ok(())
}

/// Verify the trailing signature of a pack on disk.
///
/// Returns `Ok(false)` for an unknown record type or a hash mismatch; parse
/// and IO failures surface as errors.
pub fn verify_signature(path: impl AsRef<Path>) -> Result<bool> {
    let mut file = File::open(path.as_ref())?;

    let mut header_buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut header_buf)?;
    let header = Header::parse(&header_buf)?;
    if header.signature_offset == 0 {
        return Ok(false);
    }

    file.seek(SeekFrom::Start(header.signature_offset))?;
    let _size = file.read_u32::<LittleEndian>()?;
    let record_type = file.read_u32::<LittleEndian>()?;
    if record_type != SIGNATURE_TYPE_FHASH {
        return Ok(false);
    }
    let stored = file.read_u32::<LittleEndian>()?;

    file.seek(SeekFrom::Start(0))?;
    let mut hash = 0u32;
    let mut remaining = header.signature_offset;
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = read_full(&mut file, &mut buf[..want])?;
        if n == 0 {
            break;
        }
        fhash_update(&mut hash, &buf[..n]);
        remaining -= n as u64;
    }

    Ok(hash == stored)
}

// Read::read may return short; fill the buffer fully so that every hashed
// block except the final one stays word-aligned.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
