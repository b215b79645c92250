#![forbid(unsafe_code)]
//! Sector-level I/O for OpticFS.
//!
//! Provides the `ByteSource` trait (pread-style random access over an
//! image), file- and memory-backed implementations, and `SectorReader`,
//! which serves whole 2048-byte sectors with an optional bounded LRU cache.
//! All reads are exact: an image that cannot supply the requested sectors
//! yields `IsoError::ShortRead`.

use ofs_error::{IsoError, Result};
use ofs_types::{sectors_for_len, Lba, SECTOR_SIZE};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Default number of sectors retained by the reader cache.
pub const DEFAULT_CACHE_SECTORS: usize = 64;

/// Random-access byte supplier for an image.
///
/// Implementations must be safe to call from multiple threads; the reader
/// never mutates the source.
pub trait ByteSource: Send + Sync {
    /// Read into `buf` starting at absolute byte `offset`, returning the
    /// number of bytes read. A short count means the source ended.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length of the source in bytes.
    fn len_bytes(&self) -> u64;
}

/// A `ByteSource` over an opened file.
///
/// The handle is shared behind an `Arc` so clones can serve concurrent
/// readers via positional reads without seeking.
#[derive(Debug, Clone)]
pub struct FileByteSource {
    file: Arc<File>,
    len: u64,
}

impl FileByteSource {
    /// Open `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
        })
    }
}

impl ByteSource for FileByteSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    fn len_bytes(&self) -> u64 {
        self.len
    }
}

/// A `ByteSource` over an in-memory image, mainly for tests and small blobs.
#[derive(Debug, Clone)]
pub struct MemoryByteSource {
    data: Arc<Vec<u8>>,
}

impl MemoryByteSource {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl ByteSource for MemoryByteSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let available = &self.data[start..];
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn len_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Bounded LRU of recently read sectors.
///
/// Fills happen under the lock, so at most one fill per key occurs even
/// with concurrent readers.
struct SectorCache {
    capacity: usize,
    map: HashMap<u32, Arc<[u8]>>,
    order: VecDeque<u32>,
}

impl SectorCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&mut self, lba: u32) -> Option<Arc<[u8]>> {
        let sector = self.map.get(&lba)?.clone();
        if let Some(pos) = self.order.iter().position(|k| *k == lba) {
            self.order.remove(pos);
        }
        self.order.push_back(lba);
        Some(sector)
    }

    fn insert(&mut self, lba: u32, sector: Arc<[u8]>) {
        if self.map.insert(lba, sector).is_none() {
            self.order.push_back(lba);
        }
        while self.map.len() > self.capacity {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&evicted);
        }
    }
}

/// Serves whole 2048-byte sectors from a `ByteSource`.
pub struct SectorReader<S> {
    source: S,
    cache: Option<Mutex<SectorCache>>,
}

impl<S: ByteSource> SectorReader<S> {
    /// Create a reader with the default cache size.
    pub fn new(source: S) -> Self {
        Self::with_cache(source, DEFAULT_CACHE_SECTORS)
    }

    /// Create a reader caching up to `cache_sectors` sectors; `0` disables
    /// caching entirely.
    pub fn with_cache(source: S, cache_sectors: usize) -> Self {
        let cache = (cache_sectors > 0).then(|| Mutex::new(SectorCache::new(cache_sectors)));
        Self { source, cache }
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Release the reader, returning the source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Read exactly `count` sectors starting at `lba`.
    pub fn read(&self, lba: Lba, count: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count as usize * SECTOR_SIZE);
        for i in 0..count {
            let sector = lba
                .checked_add(i)
                .ok_or(IsoError::ShortRead {
                    lba: lba.0,
                    wanted: count as usize * SECTOR_SIZE,
                    got: out.len(),
                })?;
            out.extend_from_slice(&self.read_sector(sector)?);
        }
        Ok(out)
    }

    /// Read a single sector, consulting the cache.
    pub fn read_sector(&self, lba: Lba) -> Result<Arc<[u8]>> {
        match &self.cache {
            Some(cache) => {
                let mut cache = cache.lock();
                if let Some(sector) = cache.get(lba.0) {
                    trace!(target: "ofs::block", lba = lba.0, "sector cache hit");
                    return Ok(sector);
                }
                let sector = self.fill_sector(lba)?;
                cache.insert(lba.0, sector.clone());
                Ok(sector)
            }
            None => self.fill_sector(lba),
        }
    }

    /// Read the bytes of one extent: `len` bytes starting at the first byte
    /// of sector `lba`.
    pub fn read_extent(&self, lba: Lba, len: u64) -> Result<Vec<u8>> {
        let sectors = u32::try_from(sectors_for_len(len)).map_err(|_| IsoError::ShortRead {
            lba: lba.0,
            wanted: usize::MAX,
            got: 0,
        })?;
        let mut data = self.read(lba, sectors)?;
        data.truncate(usize::try_from(len).unwrap_or(data.len()));
        Ok(data)
    }

    /// Incremental reader over one extent.
    pub fn extent_reader(&self, lba: Lba, len: u64) -> ExtentReader<'_, S> {
        ExtentReader {
            reader: self,
            next_lba: lba,
            offset_in_sector: 0,
            remaining: len,
        }
    }

    fn fill_sector(&self, lba: Lba) -> Result<Arc<[u8]>> {
        let mut buf = vec![0_u8; SECTOR_SIZE];
        let base = lba.to_byte_offset();
        let mut filled = 0_usize;
        while filled < SECTOR_SIZE {
            let n = self
                .source
                .read_at(base + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(IsoError::ShortRead {
                    lba: lba.0,
                    wanted: SECTOR_SIZE,
                    got: filled,
                });
            }
            filled += n;
        }
        Ok(buf.into())
    }
}

/// A `std::io::Read` over a single extent, pulling sectors through the
/// reader (and its cache) on demand.
pub struct ExtentReader<'a, S> {
    reader: &'a SectorReader<S>,
    next_lba: Lba,
    offset_in_sector: usize,
    remaining: u64,
}

impl<S: ByteSource> io::Read for ExtentReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let sector = self
            .reader
            .read_sector(self.next_lba)
            .map_err(io::Error::other)?;
        let in_sector = SECTOR_SIZE - self.offset_in_sector;
        let wanted = buf
            .len()
            .min(usize::try_from(self.remaining).unwrap_or(buf.len()))
            .min(in_sector);
        buf[..wanted].copy_from_slice(&sector[self.offset_in_sector..self.offset_in_sector + wanted]);
        self.offset_in_sector += wanted;
        self.remaining -= wanted as u64;
        if self.offset_in_sector == SECTOR_SIZE {
            self.offset_in_sector = 0;
            self.next_lba = self.next_lba.checked_add(1).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "extent runs past the last sector")
            })?;
        }
        Ok(wanted)
    }
}
