//! A single loaded pack: file-info map, backing storage, and blob cache
//!
//! Partitions are owned by the registry and shared between reader handles.
//! The per-partition state mutex (the decompression lock) serializes cache
//! installation, the handle seek/read pair, and metadata rebuilds; reader
//! fetch paths take it without ever re-entering the registry.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime};

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;

use crate::codec;
use crate::error::{Fs8Error, Result};
use crate::format::header::{Header, HEADER_SIZE};
use crate::format::table::{self, normalize_name, FileInfo};
use crate::keeper::{FileKeeper, HandleStatus};
use crate::logging::log_error;

/// Decompressed blobs under this size are retained in the partition cache.
pub(crate) const SMALL_BLOB_LIMIT: i64 = 64 << 10;

/// How a partition is identified in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PackIdentity {
    /// Canonicalized path of a file-backed pack
    File(PathBuf),
    /// Source address of a memory-backed pack
    Memory(usize),
}

enum Backing {
    File(FileKeeper),
    Memory(&'static [u8]),
}

struct BlobSlot {
    info: FileInfo,
    /// Owned decompressed bytes, installed on first successful fetch of a
    /// small blob and retained until rebuild or teardown.
    cached: Option<Box<[u8]>>,
}

struct PartitionState {
    entries: HashMap<String, BlobSlot>,
    backing: Backing,
}

enum FetchStep {
    Done(usize),
    StaleBacking,
}

pub(crate) struct Partition {
    identity: PackIdentity,
    use_count: AtomicI64,
    last_access: Mutex<Instant>,
    state: Mutex<PartitionState>,
}

impl Partition {
    /// Open and parse a file-backed pack. `path` must already be canonical.
    pub fn open_file(path: &Path) -> Result<Self> {
        let (file, mtime, entries) = load_file_metadata(path)?;
        tracing::debug!("loaded pack {:?} with {} entries", path, entries.len());
        Ok(Self {
            identity: PackIdentity::File(path.to_owned()),
            use_count: AtomicI64::new(0),
            last_access: Mutex::new(Instant::now()),
            state: Mutex::new(PartitionState {
                entries,
                backing: Backing::File(FileKeeper::new(path.to_owned(), file, mtime)),
            }),
        })
    }

    /// Parse a memory-backed pack from a caller-supplied buffer.
    pub fn open_memory(data: &'static [u8]) -> Result<Self> {
        let entries = load_memory_metadata(data)?;
        tracing::debug!("loaded in-memory pack with {} entries", entries.len());
        Ok(Self {
            identity: PackIdentity::Memory(data.as_ptr() as usize),
            use_count: AtomicI64::new(0),
            last_access: Mutex::new(Instant::now()),
            state: Mutex::new(PartitionState {
                entries,
                backing: Backing::Memory(data),
            }),
        })
    }

    pub fn identity(&self) -> &PackIdentity {
        &self.identity
    }

    pub fn use_count(&self) -> i64 {
        self.use_count.load(Ordering::Relaxed)
    }

    /// Increment the reference count. Only called under the registry lock.
    pub fn bump(&self) {
        self.use_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the reference count, returning the new value. Only called
    /// under the registry lock.
    pub fn unbump(&self) -> i64 {
        self.use_count.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    /// Re-validate an already-registered partition during acquire: reopen a
    /// closed handle while the mtime still matches, or rebuild the metadata
    /// in place when the file changed on disk.
    pub fn reacquire(&self) -> Result<()> {
        let mut state = self.state.lock();
        let status = match &mut state.backing {
            Backing::Memory(_) => return Ok(()),
            Backing::File(keeper) => {
                let path = keeper.path().to_owned();
                keeper.ensure_open().map_err(|e| {
                    log_error(&format!("cannot open file {}", path.display()));
                    e
                })?
            }
        };
        if matches!(status, HandleStatus::Stale) {
            rebuild_file_backing(&mut state)?;
        }
        Ok(())
    }

    /// Close the backing handle, keeping the metadata and cache.
    pub fn close_handle(&self) {
        if let Backing::File(keeper) = &mut self.state.lock().backing {
            keeper.close();
        }
    }

    /// Sweep hook: close the handle if idle and stale. Skips partitions
    /// whose state lock is contended, since a busy partition is not idle.
    pub fn close_if_idle(&self, now: Instant) {
        let last_access = *self.last_access.lock();
        if let Some(mut state) = self.state.try_lock() {
            if let Backing::File(keeper) = &mut state.backing {
                keeper.close_if_idle(now, last_access);
            }
        }
    }

    pub fn has_open_handle(&self) -> bool {
        match &self.state.lock().backing {
            Backing::File(keeper) => keeper.is_open(),
            Backing::Memory(_) => false,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.touch();
        let name = normalize_name(name);
        self.state.lock().entries.contains_key(&name)
    }

    /// Decompressed size of the named blob, 0 when absent.
    pub fn size(&self, name: &str) -> u64 {
        self.touch();
        let name = normalize_name(name);
        self.state
            .lock()
            .entries
            .get(&name)
            .map(|slot| slot.info.decompressed_size as u64)
            .unwrap_or(0)
    }

    /// All archive names, normalized. Order is unspecified.
    pub fn file_names(&self) -> Vec<String> {
        self.touch();
        self.state.lock().entries.keys().cloned().collect()
    }

    /// Fetch the named blob into `dst`, returning the number of bytes
    /// written (the blob's decompressed size).
    pub fn fetch(&self, name: &str, dst: &mut [u8]) -> Result<usize> {
        self.touch();
        let name = normalize_name(name);
        let mut state = self.state.lock();

        for _ in 0..2 {
            match Self::fetch_locked(&mut state, &name, dst)? {
                FetchStep::Done(n) => return Ok(n),
                FetchStep::StaleBacking => rebuild_file_backing(&mut state)?,
            }
        }

        Err(Fs8Error::InternalInvariant(format!(
            "pack metadata kept going stale while fetching {name}"
        )))
    }

    fn fetch_locked(state: &mut PartitionState, name: &str, dst: &mut [u8]) -> Result<FetchStep> {
        let info = {
            let Some(slot) = state.entries.get(name) else {
                return Err(Fs8Error::NotFound(name.to_string()));
            };

            if slot.info.decompressed_size as u64 > dst.len() as u64 {
                return Err(Fs8Error::BufferTooSmall {
                    need: slot.info.decompressed_size as u64,
                    have: dst.len() as u64,
                });
            }

            if let Some(cached) = &slot.cached {
                dst[..cached.len()].copy_from_slice(cached);
                return Ok(FetchStep::Done(cached.len()));
            }

            slot.info
        };

        let dsize = info.decompressed_size as usize;
        if dsize == 0 {
            return Ok(FetchStep::Done(0));
        }

        let offset = info.offset as u64;
        let csize = info.compressed_size as usize;

        match &mut state.backing {
            Backing::Memory(data) => {
                let start = info.offset as usize;
                let within_bounds = start
                    .checked_add(csize)
                    .is_some_and(|end| end <= data.len());
                if !within_bounds {
                    log_error("blob range out of in-memory pack bounds");
                    return Err(Fs8Error::CorruptArchive(format!(
                        "blob range out of in-memory pack bounds for {name}"
                    )));
                }
                let compressed = &data[start..start + csize];
                codec::decompress_into(compressed, &mut dst[..dsize]).map_err(|e| {
                    log_error("zstd decompression error (in-memory pack)");
                    e
                })?;
            }
            Backing::File(keeper) => {
                match keeper.ensure_open().map_err(|e| {
                    log_error(&format!("cannot open file {}", keeper.path().display()));
                    e
                })? {
                    HandleStatus::Open => {}
                    HandleStatus::Stale => return Ok(FetchStep::StaleBacking),
                }

                let Some(file) = keeper.file_mut() else {
                    log_error("pack file handle is closed");
                    return Err(Fs8Error::InternalInvariant(
                        "pack file handle closed after ensure_open".to_string(),
                    ));
                };

                file.seek(SeekFrom::Start(offset))?;
                let mut compressed = vec![0u8; csize];
                file.read_exact(&mut compressed).map_err(|e| {
                    log_error("cannot read from pack file");
                    Fs8Error::Io(e)
                })?;

                codec::decompress_into(&compressed, &mut dst[..dsize]).map_err(|e| {
                    log_error("zstd decompression error (pack file)");
                    e
                })?;
            }
        }

        if info.decompressed_size < SMALL_BLOB_LIMIT {
            if let Some(slot) = state.entries.get_mut(name) {
                slot.cached = Some(dst[..dsize].into());
            }
        }

        Ok(FetchStep::Done(dsize))
    }
}

/// Open a pack file and parse its header and file-info table.
///
/// Failures log through the error-log callback with the pack path for
/// context and leave nothing registered.
fn load_file_metadata(
    path: &Path,
) -> Result<(File, Option<SystemTime>, HashMap<String, BlobSlot>)> {
    let mut file = File::open(path).map_err(|e| {
        log_error(&format!("cannot open file {}", path.display()));
        Fs8Error::Io(e)
    })?;
    let mtime = file.metadata().and_then(|m| m.modified()).ok();

    let mut header_buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut header_buf).map_err(|e| {
        log_error(&format!("cannot read file {}", path.display()));
        Fs8Error::Io(e)
    })?;
    let header = Header::parse(&header_buf).map_err(|e| {
        log_error(&format!("not an FS8 file {}", path.display()));
        e
    })?;

    file.seek(SeekFrom::Start(header.table_offset)).map_err(|e| {
        log_error(&format!("corrupted file {}", path.display()));
        Fs8Error::Io(e)
    })?;

    // The declared length is validated before the table buffer is sized, so
    // a corrupt length can never trigger a huge allocation.
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(|e| {
        log_error(&format!("corrupted file {}", path.display()));
        Fs8Error::Io(e)
    })?;
    let payload_len = LittleEndian::read_u32(&len_buf);
    if payload_len > table::MAX_TABLE_PAYLOAD {
        log_error(&format!("corrupted file {}", path.display()));
        return Err(Fs8Error::CorruptArchive(format!(
            "file-info table payload of {payload_len} bytes over limit"
        )));
    }

    let mut table_buf = vec![0u8; payload_len as usize + 4];
    table_buf[0..4].copy_from_slice(&len_buf);
    file.read_exact(&mut table_buf[4..]).map_err(|e| {
        log_error(&format!("corrupted file {}", path.display()));
        Fs8Error::Io(e)
    })?;

    let entries = table::parse_table(&table_buf).map_err(|e| {
        log_error(&format!("corrupted file {}", path.display()));
        e
    })?;

    Ok((file, mtime, into_slots(entries)))
}

/// Parse the header and file-info table of a memory-backed pack, bounds
/// checking every declared range against the buffer.
fn load_memory_metadata(data: &'static [u8]) -> Result<HashMap<String, BlobSlot>> {
    if data.len() < HEADER_SIZE {
        log_error("not an FS8 pack (too small)");
        return Err(Fs8Error::CorruptArchive(
            "in-memory pack smaller than header".to_string(),
        ));
    }

    let mut header_buf = [0u8; HEADER_SIZE];
    header_buf.copy_from_slice(&data[..HEADER_SIZE]);
    let header = Header::parse(&header_buf).map_err(|e| {
        log_error("not an FS8 pack");
        e
    })?;

    let table_offset = header.table_offset as usize;
    if table_offset.checked_add(4).is_none() || table_offset + 4 > data.len() {
        log_error("invalid in-memory pack format");
        return Err(Fs8Error::CorruptArchive(
            "file-info table offset out of bounds".to_string(),
        ));
    }

    let payload_len = LittleEndian::read_u32(&data[table_offset..table_offset + 4]);
    if payload_len > table::MAX_TABLE_PAYLOAD {
        log_error("invalid in-memory pack format");
        return Err(Fs8Error::CorruptArchive(format!(
            "file-info table payload of {payload_len} bytes over limit"
        )));
    }
    let table_end = table_offset + 4 + payload_len as usize;
    if table_end > data.len() {
        log_error("invalid in-memory pack format");
        return Err(Fs8Error::CorruptArchive(
            "file-info table runs past the in-memory pack".to_string(),
        ));
    }

    let entries = table::parse_table(&data[table_offset..table_end]).map_err(|e| {
        log_error("invalid in-memory pack format");
        e
    })?;

    Ok(into_slots(entries))
}

fn into_slots(entries: table::FileInfoMap) -> HashMap<String, BlobSlot> {
    entries
        .into_iter()
        .map(|(name, info)| (name, BlobSlot { info, cached: None }))
        .collect()
}

/// Re-parse a mutated pack in place: fresh handle, fresh entry map, cache
/// dropped. On failure the previous (stale) state is left untouched.
fn rebuild_file_backing(state: &mut PartitionState) -> Result<()> {
    let path = match &state.backing {
        Backing::File(keeper) => keeper.path().to_owned(),
        Backing::Memory(_) => {
            return Err(Fs8Error::InternalInvariant(
                "rebuild requested for a memory-backed pack".to_string(),
            ))
        }
    };

    let (file, mtime, entries) = load_file_metadata(&path)?;
    tracing::debug!("rebuilt stale pack {:?} with {} entries", path, entries.len());
    state.entries = entries;
    state.backing = Backing::File(FileKeeper::new(path, file, mtime));
    Ok(())
}
