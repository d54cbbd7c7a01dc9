//! Caller-facing pack accessor
//!
//! A reader binds to exactly one partition in a registry. Dropping the
//! reader (or calling [`Fs8Reader::close`]) releases the reference; the
//! partition itself stays registered so a later open of the same pack is a
//! cache hit.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Fs8Error, Result};
use crate::partition::Partition;
use crate::registry::PackRegistry;

pub struct Fs8Reader {
    registry: PackRegistry,
    partition: Option<Arc<Partition>>,
}

impl Fs8Reader {
    /// Open a pack file via the global registry.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_file_in(PackRegistry::global().clone(), path)
    }

    /// Open an in-memory pack via the global registry.
    ///
    /// The buffer is typically produced by `include_bytes!`; packs loaded
    /// from the same address share one partition.
    pub fn open_memory(data: &'static [u8]) -> Result<Self> {
        Self::open_memory_in(PackRegistry::global().clone(), data)
    }

    /// Open a pack file via an explicitly constructed registry.
    pub fn open_file_in(registry: PackRegistry, path: impl AsRef<Path>) -> Result<Self> {
        let partition = registry.acquire_file(path.as_ref())?;
        Ok(Self {
            registry,
            partition: Some(partition),
        })
    }

    /// Open an in-memory pack via an explicitly constructed registry.
    pub fn open_memory_in(registry: PackRegistry, data: &'static [u8]) -> Result<Self> {
        let partition = registry.acquire_memory(data)?;
        Ok(Self {
            registry,
            partition: Some(partition),
        })
    }

    /// Whether the named entry exists. Names are matched case-insensitively
    /// with `\` treated as `/`.
    pub fn exists(&self, name: &str) -> bool {
        self.partition.as_ref().is_some_and(|p| p.exists(name))
    }

    /// Decompressed size of the named entry, 0 when absent.
    pub fn size(&self, name: &str) -> u64 {
        self.partition.as_ref().map_or(0, |p| p.size(name))
    }

    /// All archive names in the pack. Order is unspecified.
    pub fn file_names(&self) -> Vec<String> {
        self.partition
            .as_ref()
            .map(|p| p.file_names())
            .unwrap_or_default()
    }

    /// Fetch the named entry into `dst`, returning the number of bytes
    /// written. `dst` may be larger than the entry.
    pub fn read_into(&self, name: &str, dst: &mut [u8]) -> Result<usize> {
        self.partition()?.fetch(name, dst)
    }

    /// Fetch the named entry as an owned buffer.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let partition = self.partition()?;
        let size = partition.size(name) as usize;
        let mut out = vec![0u8; size];
        let n = partition.fetch(name, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Fetch the named entry with a trailing zero byte appended, for text
    /// consumers that want a C-string view.
    pub fn read_with_nul(&self, name: &str) -> Result<Vec<u8>> {
        let partition = self.partition()?;
        let size = partition.size(name) as usize;
        let mut out = vec![0u8; size + 1];
        let n = partition.fetch(name, &mut out)?;
        out.truncate(n + 1);
        out[n] = 0;
        Ok(out)
    }

    /// Release the binding. Further operations fail; `exists` and `size`
    /// report absent.
    pub fn close(&mut self) {
        if let Some(partition) = self.partition.take() {
            self.registry.release(&partition);
        }
    }

    fn partition(&self) -> Result<&Arc<Partition>> {
        self.partition
            .as_ref()
            .ok_or_else(|| Fs8Error::InvalidArgument("reader is closed".to_string()))
    }
}

impl Drop for Fs8Reader {
    fn drop(&mut self) {
        self.close();
    }
}
