//! Raw byte access to heap data files.
//!
//! [`ByteSource`] is the single capability the decoders need from storage:
//! a known length and positioned reads through a shared reference, so one
//! source can be scanned from several threads at once. [`DataFile`] layers
//! block addressing on top of any source.
//!
//! Implementations: [`FileSource`] (buffered file behind a mutex),
//! [`MemorySource`] (owned buffer), and `MmapSource` (memory-mapped file,
//! `cli` feature).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::heap::constants::{BLCKSZ, SIZE_PAGE_HEADER};
use crate::PduError;

/// Positioned, thread-safe read access to a byte sequence.
pub trait ByteSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails if the range extends past [`len`](Self::len) or the underlying
    /// read fails.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError>;
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
        (**self).read_at(offset, buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
        (**self).read_at(offset, buf)
    }
}

fn check_range(offset: u64, wanted: usize, len: u64) -> Result<(), PduError> {
    match offset.checked_add(wanted as u64) {
        Some(end) if end <= len => Ok(()),
        _ => Err(PduError::Io(format!(
            "read of {} bytes at offset {} exceeds source length {}",
            wanted, offset, len
        ))),
    }
}

/// A data file read through `Seek + Read`.
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PduError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PduError::Io(format!("Cannot open {}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .map_err(|e| PduError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();
        Ok(FileSource {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
        check_range(offset, buf.len(), self.len)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| PduError::Io("file reader lock poisoned".to_string()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| PduError::Io(format!("Cannot seek to offset {}: {}", offset, e)))?;
        file.read_exact(buf)
            .map_err(|e| PduError::Io(format!("Cannot read {} bytes at offset {}: {}", buf.len(), offset, e)))
    }
}

/// An in-memory byte buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
        check_range(offset, buf.len(), self.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

/// A memory-mapped data file.
///
/// Only the pages actually touched are faulted in, so large images can be
/// scanned in parallel without per-read syscalls.
#[cfg(feature = "cli")]
pub struct MmapSource {
    mmap: memmap2::Mmap,
}

#[cfg(feature = "cli")]
impl MmapSource {
    /// Map `path` read-only.
    ///
    /// # Safety
    ///
    /// `memmap2::Mmap::map` is `unsafe` because the file must not be
    /// truncated by another process while mapped. Recovery tooling reads
    /// files that the database server is not running against.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PduError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PduError::Io(format!("Cannot open {}: {}", path.display(), e)))?;
        let mmap = unsafe {
            memmap2::Mmap::map(&file)
                .map_err(|e| PduError::Io(format!("Cannot mmap {}: {}", path.display(), e)))?
        };
        Ok(MmapSource { mmap })
    }
}

#[cfg(feature = "cli")]
impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
        check_range(offset, buf.len(), self.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.mmap[start..start + buf.len()]);
        Ok(())
    }
}

/// Block-addressed view over a [`ByteSource`].
pub struct DataFile<S: ByteSource> {
    source: S,
    page_size: usize,
}

impl DataFile<FileSource> {
    /// Open a data file with the default 8 KiB block size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PduError> {
        DataFile::new(FileSource::open(path)?, BLCKSZ)
    }
}

#[cfg(feature = "cli")]
impl DataFile<MmapSource> {
    /// Open a data file through a memory map.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self, PduError> {
        DataFile::new(MmapSource::open(path)?, BLCKSZ)
    }
}

impl DataFile<MemorySource> {
    /// Wrap an in-memory image with the default block size.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, PduError> {
        DataFile::new(MemorySource::new(data), BLCKSZ)
    }
}

impl<S: ByteSource> DataFile<S> {
    /// Wrap `source` using blocks of `page_size` bytes.
    pub fn new(source: S, page_size: usize) -> Result<Self, PduError> {
        if page_size < SIZE_PAGE_HEADER || !page_size.is_power_of_two() || page_size > 32768 {
            return Err(PduError::Argument(format!(
                "page size {} must be a power of two between {} and 32768",
                page_size, SIZE_PAGE_HEADER
            )));
        }
        Ok(DataFile { source, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn file_size(&self) -> u64 {
        self.source.len()
    }

    /// Number of complete blocks in the file.
    pub fn page_count(&self) -> u64 {
        self.source.len() / self.page_size as u64
    }

    /// Bytes after the last complete block.
    pub fn trailing_bytes(&self) -> u64 {
        self.source.len() % self.page_size as u64
    }

    /// Read block `page_index` (0-based).
    pub fn read_block(&self, page_index: u64) -> Result<Vec<u8>, PduError> {
        if page_index >= self.page_count() {
            return Err(PduError::Argument(format!(
                "Page {} out of range (file has {} pages)",
                page_index,
                self.page_count()
            )));
        }
        self.read_range(page_index * self.page_size as u64, self.page_size)
    }

    /// Read `length` bytes starting at `offset`, independent of block boundaries.
    pub fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>, PduError> {
        let mut buf = vec![0u8; length];
        self.source.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Call `f` with every complete block in order.
    ///
    /// Stops at the first error returned by the read or by `f`.
    pub fn for_each_block<F>(&self, mut f: F) -> Result<(), PduError>
    where
        F: FnMut(u64, &[u8]) -> Result<(), PduError>,
    {
        let mut buf = vec![0u8; self.page_size];
        for page_index in 0..self.page_count() {
            self.source
                .read_at(page_index * self.page_size as u64, &mut buf)?;
            f(page_index, &buf)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn numbered_blocks(count: usize) -> Vec<u8> {
        let mut data = vec![0u8; count * BLCKSZ];
        for i in 0..count {
            data[i * BLCKSZ] = i as u8 + 1;
        }
        data
    }

    #[test]
    fn test_memory_block_reads() {
        let df = DataFile::from_bytes(numbered_blocks(3)).unwrap();
        assert_eq!(df.page_count(), 3);
        assert_eq!(df.trailing_bytes(), 0);
        assert_eq!(df.read_block(2).unwrap()[0], 3);
        assert!(matches!(df.read_block(3), Err(PduError::Argument(_))));
    }

    #[test]
    fn test_read_range_across_blocks() {
        let df = DataFile::from_bytes(numbered_blocks(2)).unwrap();
        let bytes = df.read_range(BLCKSZ as u64 - 1, 2).unwrap();
        assert_eq!(bytes, vec![0, 2]);
        assert!(matches!(df.read_range(BLCKSZ as u64 * 2 - 1, 2), Err(PduError::Io(_))));
    }

    #[test]
    fn test_trailing_partial_block() {
        let mut data = numbered_blocks(1);
        data.extend_from_slice(&[7u8; 100]);
        let df = DataFile::from_bytes(data).unwrap();
        assert_eq!(df.page_count(), 1);
        assert_eq!(df.trailing_bytes(), 100);
    }

    #[test]
    fn test_file_source_matches_memory() {
        let data = numbered_blocks(4);
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let df = DataFile::open(tmp.path()).unwrap();
        assert_eq!(df.page_count(), 4);
        let mut seen = Vec::new();
        df.for_each_block(|idx, block| {
            seen.push((idx, block[0]));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_mmap_source_matches_buffered() {
        let data = numbered_blocks(2);
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let buffered = DataFile::open(tmp.path()).unwrap();
        let mapped = DataFile::open_mmap(tmp.path()).unwrap();
        assert_eq!(buffered.read_block(1).unwrap(), mapped.read_block(1).unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            DataFile::open("/nonexistent/16384"),
            Err(PduError::Io(_))
        ));
    }

    #[test]
    fn test_bad_page_size_rejected() {
        assert!(DataFile::new(MemorySource::default(), 1000).is_err());
        assert!(DataFile::new(MemorySource::default(), 4096).is_ok());
    }
}
