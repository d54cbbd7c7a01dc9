//! Pack construction
//!
//! The builder writes the 24-byte header up front, streams each source file
//! through the zstd codec, appends the file-info table and the padded
//! signature record, then patches the two offsets back into the header.
//! With hex output enabled the finished pack is destructively transcribed
//! into an ASCII C-array for embedding in source code.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::codec;
use crate::error::{Fs8Error, Result};
use crate::format::header::{HEADER_SIZE, MAGIC, VERSION_BYTES};
use crate::format::signature::sign_file;
use crate::format::table::{normalize_name, serialize_table, FileInfo, FileInfoMap};
use crate::logging::log_error;

/// Words per line in hex output
const HEX_WORDS_PER_LINE: usize = 16;

/// Builds a pack from a list of source files.
///
/// Entries are `(source path relative to the base directory, archive name)`;
/// an empty archive name stores the entry under its source path. A later
/// entry with the same (normalized) archive name overwrites an earlier one.
pub struct PackBuilder {
    base_dir: PathBuf,
    entries: Vec<(String, String)>,
    compression_level: i32,
    write_as_hex: bool,
}

impl PackBuilder {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_owned(),
            entries: Vec::new(),
            compression_level: 1,
            write_as_hex: false,
        }
    }

    /// Add one source file. An empty `archive_name` means "use the source
    /// path as the archive name".
    pub fn entry(mut self, source: impl Into<String>, archive_name: impl Into<String>) -> Self {
        self.entries.push((source.into(), archive_name.into()));
        self
    }

    /// Add many `(source, archive_name)` pairs.
    pub fn entries<I, S, A>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<String>,
    {
        for (source, archive_name) in pairs {
            self.entries.push((source.into(), archive_name.into()));
        }
        self
    }

    /// zstd compression level (default 1).
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Emit the finished pack as an ASCII C-array instead of binary.
    pub fn write_as_hex(mut self, hex: bool) -> Self {
        self.write_as_hex = hex;
        self
    }

    /// Write the pack to `out_path`.
    pub fn build(&self, out_path: impl AsRef<Path>) -> Result<()> {
        let out_path = out_path.as_ref();
        self.build_binary(out_path)?;

        sign_file(out_path).map_err(|e| {
            log_error(&format!("cannot sign file {}", out_path.display()));
            e
        })?;

        if self.write_as_hex {
            convert_to_hex32(out_path).map_err(|e| {
                log_error(&format!(
                    "cannot convert file to hex32 {}",
                    out_path.display()
                ));
                e
            })?;
        }

        Ok(())
    }

    fn build_binary(&self, out_path: &Path) -> Result<()> {
        let file = File::create(out_path).map_err(|e| {
            log_error(&format!("cannot open file for write {}", out_path.display()));
            Fs8Error::Io(e)
        })?;
        let mut writer = BufWriter::new(file);

        // Full header with placeholder offsets; patched after the table and
        // padding are in place.
        let mut header_buf = [0u8; HEADER_SIZE];
        header_buf[0..4].copy_from_slice(&MAGIC);
        header_buf[4..8].copy_from_slice(&VERSION_BYTES);
        writer.write_all(&header_buf)?;
        let mut position = HEADER_SIZE as u64;

        let mut infos = FileInfoMap::new();
        for (source, archive_name) in &self.entries {
            let archive_name = if archive_name.is_empty() {
                source
            } else {
                archive_name
            };

            let source_path = self.base_dir.join(source);
            let data = std::fs::read(&source_path).map_err(|e| {
                log_error(&format!("cannot read file {}", source_path.display()));
                Fs8Error::Io(e)
            })?;

            let info = if data.is_empty() {
                // Zero-sized sources carry no payload; the entry alone is
                // enough for readers to hand back empty bytes.
                FileInfo {
                    offset: position as i64,
                    compressed_size: 0,
                    decompressed_size: 0,
                }
            } else {
                let compressed = codec::compress(&data, self.compression_level)?;
                writer.write_all(&compressed).map_err(|e| {
                    log_error(&format!("cannot write to file {}", out_path.display()));
                    Fs8Error::Io(e)
                })?;
                let info = FileInfo {
                    offset: position as i64,
                    compressed_size: compressed.len() as i64,
                    decompressed_size: data.len() as i64,
                };
                position += compressed.len() as u64;
                info
            };

            infos.insert(normalize_name(archive_name), info);
        }

        let table_offset = position;
        let table = serialize_table(&infos)?;
        writer.write_all(&table).map_err(|e| {
            log_error(&format!("cannot write to file {}", out_path.display()));
            Fs8Error::Io(e)
        })?;
        position += table.len() as u64;

        // The signature record starts on an 8-byte boundary.
        let mut signature_offset = position;
        if position % 8 != 0 {
            let padding = [0u8; 8];
            let pad = 8 - (position % 8) as usize;
            writer.write_all(&padding[..pad])?;
            signature_offset = position + pad as u64;
        }

        writer.flush()?;
        let mut file = writer.into_inner().map_err(|e| Fs8Error::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(8))?;
        file.write_u64::<LittleEndian>(table_offset)?;
        file.write_u64::<LittleEndian>(signature_offset)?;

        tracing::debug!(
            "built pack {:?}: {} entries, table at {table_offset}, signature at {signature_offset}",
            out_path,
            infos.len()
        );
        Ok(())
    }
}

/// Destructively rewrite `path` as an ASCII C-array of little-endian 32-bit
/// words (`0x%X,` each, a newline every 16 words and after any word whose
/// low byte is `.`). The result is no longer a readable pack.
fn convert_to_hex32(path: &Path) -> Result<()> {
    let data = std::fs::read(path)?;

    let mut out = String::with_capacity(data.len() * 3 + 16);
    for (index, chunk) in data.chunks(4).enumerate() {
        let mut word_bytes = [0u8; 4];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        let word = u32::from_le_bytes(word_bytes);

        out.push_str(&format!("0x{word:X},"));
        if index % HEX_WORDS_PER_LINE == HEX_WORDS_PER_LINE - 1 || (word & 0xFF) == u32::from(b'.')
        {
            out.push('\n');
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".hex.tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, out)?;
    std::fs::remove_file(path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
