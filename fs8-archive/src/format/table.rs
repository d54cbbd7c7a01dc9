//! File-info table serialization and parsing
//!
//! The table is a self-describing blob: a little-endian `u32` payload length
//! followed by a concatenation of entries, each `i16` name length, the
//! normalized name bytes, and three little-endian `i64` fields (offset,
//! compressed size, decompressed size).

use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Fs8Error, Result};

/// Parsed tables larger than this are rejected outright (~320k entries).
pub const MAX_TABLE_PAYLOAD: u32 = 64 << 20;

/// Maximum archive-name length in bytes
pub const MAX_NAME_LEN: usize = 512;

/// Location and sizes of one stored blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute byte offset of the compressed bytes within the pack
    pub offset: i64,
    pub compressed_size: i64,
    pub decompressed_size: i64,
}

/// Archive name (normalized) to blob metadata
pub type FileInfoMap = HashMap<String, FileInfo>;

/// Lowercase ASCII and rewrite `\` to `/`.
///
/// Applied on insertion at build time and to every lookup, so name matching
/// is case-insensitive and separator-agnostic.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '\\' => '/',
            ch => ch.to_ascii_lowercase(),
        })
        .collect()
}

/// Serialize the table, including its `u32` length prefix.
///
/// Names are normalized on the way out; a name longer than [`MAX_NAME_LEN`]
/// bytes is refused.
pub fn serialize_table(entries: &FileInfoMap) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; 4];

    for (name, info) in entries {
        let normalized = normalize_name(name);
        if normalized.len() > MAX_NAME_LEN {
            return Err(Fs8Error::InvalidArgument(format!(
                "archive name longer than {MAX_NAME_LEN} bytes: {normalized}"
            )));
        }

        bytes.write_i16::<LittleEndian>(normalized.len() as i16)?;
        bytes.extend_from_slice(normalized.as_bytes());
        bytes.write_i64::<LittleEndian>(info.offset)?;
        bytes.write_i64::<LittleEndian>(info.compressed_size)?;
        bytes.write_i64::<LittleEndian>(info.decompressed_size)?;
    }

    let payload_len = (bytes.len() - 4) as u32;
    LittleEndian::write_u32(&mut bytes[0..4], payload_len);
    Ok(bytes)
}

/// Parse a table buffer (length prefix included).
///
/// Rejects payloads over [`MAX_TABLE_PAYLOAD`], name lengths over
/// [`MAX_NAME_LEN`], and payloads that do not consume exactly the declared
/// length.
pub fn parse_table(bytes: &[u8]) -> Result<FileInfoMap> {
    if bytes.len() < 4 {
        return Err(Fs8Error::CorruptArchive(
            "truncated file-info table".to_string(),
        ));
    }

    let declared = LittleEndian::read_u32(&bytes[0..4]);
    if declared > MAX_TABLE_PAYLOAD {
        return Err(Fs8Error::CorruptArchive(format!(
            "file-info table payload of {declared} bytes over limit"
        )));
    }
    let declared = declared as usize;
    if bytes.len() - 4 != declared {
        return Err(Fs8Error::CorruptArchive(
            "file-info table length mismatch".to_string(),
        ));
    }

    let mut cursor = Cursor::new(&bytes[4..]);
    let mut entries = FileInfoMap::new();

    while (cursor.position() as usize) < declared {
        let name_len = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| truncated("name length"))?;
        if name_len as usize > MAX_NAME_LEN {
            return Err(Fs8Error::CorruptArchive(format!(
                "archive name length {name_len} over limit"
            )));
        }

        let mut name_buf = vec![0u8; name_len as usize];
        cursor
            .read_exact(&mut name_buf)
            .map_err(|_| truncated("name"))?;
        let name = String::from_utf8(name_buf)
            .map_err(|_| Fs8Error::CorruptArchive("archive name is not UTF-8".to_string()))?;

        let offset = cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| truncated("blob offset"))?;
        let compressed_size = cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| truncated("compressed size"))?;
        let decompressed_size = cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| truncated("decompressed size"))?;

        if offset < 0 || compressed_size < 0 || decompressed_size < 0 {
            return Err(Fs8Error::CorruptArchive(format!(
                "negative blob metadata for {name}"
            )));
        }

        entries.insert(
            name,
            FileInfo {
                offset,
                compressed_size,
                decompressed_size,
            },
        );
    }

    Ok(entries)
}

fn truncated(what: &str) -> Fs8Error {
    Fs8Error::CorruptArchive(format!("file-info table ends inside {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> FileInfoMap {
        let mut map = FileInfoMap::new();
        map.insert(
            "textures/Stone.DDS".to_string(),
            FileInfo {
                offset: 24,
                compressed_size: 100,
                decompressed_size: 400,
            },
        );
        map.insert(
            "config.blk".to_string(),
            FileInfo {
                offset: 124,
                compressed_size: 10,
                decompressed_size: 12,
            },
        );
        map
    }

    #[test]
    fn roundtrip_normalizes_names() {
        let bytes = serialize_table(&sample_map()).unwrap();
        let parsed = parse_table(&bytes).unwrap();

        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains_key("textures/stone.dds"));
        assert_eq!(
            parsed["config.blk"],
            FileInfo {
                offset: 124,
                compressed_size: 10,
                decompressed_size: 12,
            }
        );
    }

    #[test]
    fn empty_table_roundtrip() {
        let bytes = serialize_table(&FileInfoMap::new()).unwrap();
        assert_eq!(bytes.len(), 4);
        assert!(parse_table(&bytes).unwrap().is_empty());
    }

    #[test]
    fn backslashes_become_slashes() {
        let mut map = FileInfoMap::new();
        map.insert("Dir\\File.TXT".to_string(), FileInfo::default());
        let parsed = parse_table(&serialize_table(&map).unwrap()).unwrap();
        assert!(parsed.contains_key("dir/file.txt"));
    }

    #[test]
    fn rejects_overlong_name_on_serialize() {
        let mut map = FileInfoMap::new();
        map.insert("x".repeat(MAX_NAME_LEN + 1), FileInfo::default());
        assert!(matches!(
            serialize_table(&map),
            Err(Fs8Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_oversized_declared_payload() {
        let mut bytes = vec![0u8; 8];
        LittleEndian::write_u32(&mut bytes[0..4], 1 << 28);
        assert!(matches!(
            parse_table(&bytes),
            Err(Fs8Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = serialize_table(&sample_map()).unwrap();
        bytes.push(0);
        assert!(parse_table(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_entry() {
        let mut map = FileInfoMap::new();
        map.insert("a".to_string(), FileInfo::default());
        let mut bytes = serialize_table(&map).unwrap();

        // Drop the last metadata byte and fix up the declared length.
        bytes.pop();
        let payload_len = (bytes.len() - 4) as u32;
        LittleEndian::write_u32(&mut bytes[0..4], payload_len);
        assert!(parse_table(&bytes).is_err());
    }

    #[test]
    fn rejects_overlong_declared_name() {
        let mut bytes = vec![0u8; 4];
        bytes.write_u16::<LittleEndian>(600).unwrap();
        bytes.extend_from_slice(&[0u8; 600]);
        let payload_len = (bytes.len() - 4) as u32;
        LittleEndian::write_u32(&mut bytes[0..4], payload_len);
        assert!(matches!(
            parse_table(&bytes),
            Err(Fs8Error::CorruptArchive(_))
        ));
    }
}
