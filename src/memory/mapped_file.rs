//! Memory-mapped file segment for persistent map state.
//!
//! This module provides a memory segment backed by a file on disk. The map
//! header and slots written through it are persisted, so the map survives
//! process restarts: any process that can open the file shares the state.
//!
//! # Example
//!
//! ```rust,ignore
//! use shmap::memory::MappedFileSegment;
//!
//! // Create a new mapped file sized for 256 slots
//! let segment = MappedFileSegment::create("/tmp/intmap.dat", 8 + 16 * 256)?;
//!
//! // ... use it, then force persistence
//! segment.sync()?;
//!
//! // Later, in the same or another process
//! let segment2 = MappedFileSegment::open("/tmp/intmap.dat")?;
//! ```

use super::{IpcHandle, MemorySegment, MemoryType};
use crate::error::{Error, Result};
use rustix::fd::OwnedFd;
use rustix::mm::{MapFlags, ProtFlags};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// A memory segment backed by a file on disk.
///
/// The file is memory-mapped, providing zero-copy access to its contents.
/// Changes are persisted to disk (call [`sync`](Self::sync) to force
/// immediate persistence). A freshly created file reads as zeros, so it is
/// ready to hold an empty map.
pub struct MappedFileSegment {
    /// File descriptor.
    fd: OwnedFd,
    /// Pointer to the mmap'd region.
    ptr: NonNull<u8>,
    /// Size of the segment.
    len: usize,
    /// Path to the file.
    path: PathBuf,
    /// Whether the mapping is read-only.
    read_only: bool,
}

impl MappedFileSegment {
    /// Create a new mapped file segment.
    ///
    /// Creates a new file (or truncates an existing one) and maps it.
    /// Truncation zero-fills the file, which leaves the segment in the
    /// all-slots-empty state.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to create.
    /// * `size` - Size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if file creation, truncation, or mapping fails.
    pub fn create<P: AsRef<Path>>(path: P, size: usize) -> Result<Self> {
        let path = path.as_ref();

        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        // Open/create the file
        use rustix::fs::{Mode, OFlags};
        let fd = rustix::fs::open(
            path,
            OFlags::RDWR | OFlags::CREATE | OFlags::TRUNC,
            Mode::from_raw_mode(0o644),
        )?;

        // Set the file size
        rustix::fs::ftruncate(&fd, size as u64)?;

        let ptr = map_file(&fd, size, false)?;

        Ok(Self {
            fd,
            ptr,
            len: size,
            path: path.to_path_buf(),
            read_only: false,
        })
    }

    /// Open an existing file as a mapped segment.
    ///
    /// The file is mapped read-write by default.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, is empty, or mapping
    /// fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_mode(path, false)
    }

    /// Open an existing file as a read-only mapped segment.
    ///
    /// Useful for processes that only ever call `get` on the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, is empty, or mapping
    /// fails.
    pub fn open_readonly<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_mode(path, true)
    }

    fn open_with_mode<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let path = path.as_ref();

        // Open the file
        use rustix::fs::OFlags;
        let flags = if read_only {
            OFlags::RDONLY
        } else {
            OFlags::RDWR
        };
        let fd = rustix::fs::open(path, flags, rustix::fs::Mode::empty())?;

        // Get file size
        let stat = rustix::fs::fstat(&fd)?;
        let size = stat.st_size as usize;

        if size == 0 {
            return Err(Error::AllocationFailed("file is empty".into()));
        }

        let ptr = map_file(&fd, size, read_only)?;

        Ok(Self {
            fd,
            ptr,
            len: size,
            path: path.to_path_buf(),
            read_only,
        })
    }

    /// Sync changes to disk.
    ///
    /// This calls `msync` to ensure all modifications are written to the
    /// file.
    pub fn sync(&self) -> Result<()> {
        unsafe {
            rustix::mm::msync(
                self.ptr.as_ptr().cast(),
                self.len,
                rustix::mm::MsyncFlags::SYNC,
            )?;
        }
        Ok(())
    }

    /// Get the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the segment is read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

fn map_file(fd: &OwnedFd, size: usize, read_only: bool) -> Result<NonNull<u8>> {
    let prot = if read_only {
        ProtFlags::READ
    } else {
        ProtFlags::READ | ProtFlags::WRITE
    };

    let ptr =
        unsafe { rustix::mm::mmap(std::ptr::null_mut(), size, prot, MapFlags::SHARED, fd, 0)? };

    NonNull::new(ptr.cast::<u8>())
        .ok_or_else(|| Error::AllocationFailed("mmap returned null".into()))
}

impl MemorySegment for MappedFileSegment {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let n = buf.len().min(self.len - offset);
        // SAFETY: offset + n stays within the mapping and buf cannot
        // overlap it.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), buf.as_mut_ptr(), n);
        }
        Ok(n)
    }

    fn write_at(&self, offset: usize, data: &[u8]) -> Result<usize> {
        if self.read_only {
            return Err(Error::InvalidSegment("segment is read-only".into()));
        }
        if offset >= self.len {
            return Ok(0);
        }
        let n = data.len().min(self.len - offset);
        // SAFETY: offset + n stays within the writable mapping; writers are
        // serialized by the caller per the MemorySegment contract.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), n);
        }
        Ok(n)
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::MappedFile
    }

    fn ipc_handle(&self) -> Option<IpcHandle> {
        // Return the file path for named sharing
        Some(IpcHandle::Named {
            name: self.path.to_string_lossy().into_owned(),
            size: self.len,
        })
    }
}

impl Drop for MappedFileSegment {
    fn drop(&mut self) {
        // Sync before unmapping to ensure data is persisted
        if !self.read_only {
            let _ = self.sync();
        }

        unsafe {
            let _ = rustix::mm::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

// SAFETY: the mapping is shared memory accessible from any thread; the fd
// is owned and the pointer stays valid until drop.
unsafe impl Send for MappedFileSegment {}
unsafe impl Sync for MappedFileSegment {}
