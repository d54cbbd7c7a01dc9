//! Process-wide partition registry
//!
//! The registry deduplicates pack loads by identity, hands out partition
//! references to reader handles, and sweeps idle file handles when asked.
//! It is an explicitly constructed value; [`PackRegistry::global`] provides
//! the process-wide default for callers that want the historical
//! one-registry-per-process behavior.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Fs8Error, Result};
use crate::logging::log_error;
use crate::partition::{PackIdentity, Partition};
use crate::reader::Fs8Reader;

/// Minimum interval between two sweeps
pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Expected upper bound on concurrently loaded packs; lookups stay linear.
const EXPECTED_PARTITIONS: usize = 100;

struct RegistryInner {
    partitions: Mutex<Vec<Arc<Partition>>>,
    /// Monotonic reference for the sweep cadence, as millis since `epoch`.
    epoch: Instant,
    last_sweep_ms: AtomicI64,
}

/// Registry of live partitions. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PackRegistry {
    inner: Arc<RegistryInner>,
}

/// Counters describing the current registry contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live partitions (including ones with closed handles)
    pub partition_count: usize,
    /// Number of partitions holding an open file handle
    pub open_handle_count: usize,
}

impl PackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                partitions: Mutex::new(Vec::with_capacity(EXPECTED_PARTITIONS)),
                epoch: Instant::now(),
                last_sweep_ms: AtomicI64::new(-1),
            }),
        }
    }

    /// The process-wide default registry.
    pub fn global() -> &'static PackRegistry {
        static GLOBAL: OnceLock<PackRegistry> = OnceLock::new();
        GLOBAL.get_or_init(PackRegistry::new)
    }

    /// Open a reader over a file-backed pack registered here.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<Fs8Reader> {
        Fs8Reader::open_file_in(self.clone(), path)
    }

    /// Open a reader over a memory-backed pack registered here.
    pub fn open_memory(&self, data: &'static [u8]) -> Result<Fs8Reader> {
        Fs8Reader::open_memory_in(self.clone(), data)
    }

    /// Find or load the partition for `path`, bumping its reference count.
    pub(crate) fn acquire_file(&self, path: &Path) -> Result<Arc<Partition>> {
        if path.as_os_str().is_empty() {
            log_error("empty pack file name");
            return Err(Fs8Error::InvalidArgument("empty pack file name".to_string()));
        }

        let canonical = path.canonicalize().map_err(|e| {
            log_error(&format!("cannot open file {}", path.display()));
            Fs8Error::Io(e)
        })?;
        let identity = PackIdentity::File(canonical.clone());

        let mut partitions = self.inner.partitions.lock();

        if let Some(partition) = partitions.iter().find(|p| *p.identity() == identity) {
            // Reopen or rebuild happens before the caller sees the
            // partition, so an acquire never returns a stale view.
            partition.reacquire()?;
            partition.bump();
            partition.touch();
            return Ok(Arc::clone(partition));
        }

        let partition = Arc::new(Partition::open_file(&canonical)?);
        partition.bump();
        partitions.push(Arc::clone(&partition));
        Ok(partition)
    }

    /// Find or load the partition for an in-memory pack, keyed by the source
    /// address.
    pub(crate) fn acquire_memory(&self, data: &'static [u8]) -> Result<Arc<Partition>> {
        let identity = PackIdentity::Memory(data.as_ptr() as usize);

        let mut partitions = self.inner.partitions.lock();

        if let Some(partition) = partitions.iter().find(|p| *p.identity() == identity) {
            partition.bump();
            partition.touch();
            return Ok(Arc::clone(partition));
        }

        let partition = Arc::new(Partition::open_memory(data)?);
        partition.bump();
        partitions.push(Arc::clone(&partition));
        Ok(partition)
    }

    /// Drop one reference to `partition`. The last reference closes the file
    /// handle, but the partition stays registered for future reuse.
    pub(crate) fn release(&self, partition: &Arc<Partition>) {
        let _partitions = self.inner.partitions.lock();

        let remaining = partition.unbump();
        if remaining < 0 {
            log_error("internal error (partition use count below zero)");
        }
        if remaining <= 0 {
            partition.close_handle();
        }
    }

    /// Periodic sweep of idle handles.
    ///
    /// Callers invoke this from their own cadence (there is no background
    /// thread); calls within [`SWEEP_INTERVAL`] of the previous sweep return
    /// immediately.
    pub fn tick(&self) {
        let now = Instant::now();
        let now_ms = now.duration_since(self.inner.epoch).as_millis() as i64;

        let last = self.inner.last_sweep_ms.load(Ordering::Relaxed);
        if last >= 0 && now_ms - last <= SWEEP_INTERVAL.as_millis() as i64 {
            return;
        }
        if self
            .inner
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            // Another thread took this sweep.
            return;
        }

        let partitions = self.inner.partitions.lock();
        for partition in partitions.iter() {
            partition.close_if_idle(now);
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let partitions = self.inner.partitions.lock();
        RegistryStats {
            partition_count: partitions.len(),
            open_handle_count: partitions.iter().filter(|p| p.has_open_handle()).count(),
        }
    }
}

impl Default for PackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PackBuilder;
    use std::path::PathBuf;

    fn build_sample(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("greeting.txt"), b"hello").unwrap();
        let pack = dir.join("sample.fs8");
        PackBuilder::new(dir)
            .entry("greeting.txt", "")
            .build(&pack)
            .unwrap();
        pack
    }

    #[test]
    fn same_path_shares_one_partition() {
        let dir = tempfile::tempdir().unwrap();
        let pack = build_sample(dir.path());

        let registry = PackRegistry::new();
        let first = registry.open_file(&pack).unwrap();
        let second = registry.open_file(&pack).unwrap();

        {
            let partitions = registry.inner.partitions.lock();
            assert_eq!(partitions.len(), 1);
            assert_eq!(partitions[0].use_count(), 2);
        }

        assert_eq!(first.read("greeting.txt").unwrap(), b"hello");
        assert_eq!(second.read("greeting.txt").unwrap(), b"hello");

        drop(first);
        {
            let partitions = registry.inner.partitions.lock();
            assert_eq!(partitions[0].use_count(), 1);
            assert!(partitions[0].has_open_handle());
        }

        drop(second);
        {
            let partitions = registry.inner.partitions.lock();
            assert_eq!(partitions.len(), 1);
            assert_eq!(partitions[0].use_count(), 0);
            assert!(!partitions[0].has_open_handle());
        }
    }

    #[test]
    fn release_then_reacquire_reopens_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let pack = build_sample(dir.path());

        let registry = PackRegistry::new();
        let reader = registry.open_file(&pack).unwrap();
        drop(reader);
        assert_eq!(registry.stats().open_handle_count, 0);

        let reader = registry.open_file(&pack).unwrap();
        assert_eq!(registry.stats().open_handle_count, 1);
        assert_eq!(reader.read("greeting.txt").unwrap(), b"hello");
        assert_eq!(registry.stats().partition_count, 1);
    }

    #[test]
    fn acquire_failure_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-a-pack.fs8");
        std::fs::write(&bogus, b"garbage that is not an FS8 pack").unwrap();

        let registry = PackRegistry::new();
        assert!(registry.open_file(&bogus).is_err());
        assert!(registry.open_file(dir.path().join("missing.fs8")).is_err());
        assert_eq!(registry.stats().partition_count, 0);
    }

    #[test]
    fn empty_path_is_invalid() {
        let registry = PackRegistry::new();
        assert!(matches!(
            registry.open_file(""),
            Err(Fs8Error::InvalidArgument(_))
        ));
    }
}
