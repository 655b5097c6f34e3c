//! Shared memory segment using Linux memfd.
//!
//! This module provides a memory segment backed by anonymous shared memory
//! created via `memfd_create`. Other processes map the same physical pages
//! by receiving the file descriptor over a Unix socket.

use super::{IpcHandle, MemorySegment, MemoryType};
use crate::error::{Error, Result};
use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use rustix::mm::{MapFlags, ProtFlags};
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr::NonNull;

/// A memory segment backed by Linux memfd (anonymous shared memory).
///
/// This is the primary backend for maps shared between cooperating
/// processes. The segment is shared by passing the file descriptor via
/// `SCM_RIGHTS` over a Unix socket; the receiver reopens it with
/// [`from_fd`](Self::from_fd).
///
/// Fresh memfd pages are zeroed by the kernel, so a newly created segment
/// is ready to hold an empty map.
///
/// # Example
///
/// ```rust,ignore
/// use shmap::memory::{MemorySegment, SharedMemorySegment};
///
/// // Create a segment large enough for 1024 slots plus the header
/// let segment = SharedMemorySegment::new("intmap", 8 + 16 * 1024)?;
///
/// // Get IPC handle to share with another process
/// let handle = segment.ipc_handle().unwrap();
/// // Send handle.fd over a Unix socket...
/// ```
pub struct SharedMemorySegment {
    /// The memfd file descriptor.
    fd: OwnedFd,
    /// Pointer to the mmap'd region.
    ptr: NonNull<u8>,
    /// Size of the segment.
    len: usize,
    /// Optional name (for debugging).
    name: Option<String>,
}

impl SharedMemorySegment {
    /// Create a new shared memory segment.
    ///
    /// # Arguments
    ///
    /// * `name` - Debug name for the segment (visible in `/proc/self/fd/`).
    /// * `size` - Size in bytes. Must be greater than 0.
    ///
    /// # Errors
    ///
    /// Returns an error if `memfd_create`, `ftruncate`, or `mmap` fails.
    pub fn new(name: &str, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        // Create anonymous memfd
        let cname = CString::new(name).map_err(|e| Error::AllocationFailed(e.to_string()))?;
        let fd = rustix::fs::memfd_create(&cname, rustix::fs::MemfdFlags::CLOEXEC)?;

        // Set the size
        rustix::fs::ftruncate(&fd, size as u64)?;

        let ptr = map_shared(&fd, size)?;

        Ok(Self {
            fd,
            ptr,
            len: size,
            name: Some(name.to_string()),
        })
    }

    /// Open an existing shared memory segment from a file descriptor.
    ///
    /// This is used by the receiving process after getting the fd via
    /// `SCM_RIGHTS`.
    ///
    /// # Arguments
    ///
    /// * `fd` - File descriptor of the memfd.
    /// * `size` - Expected size of the segment.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `fd` is a valid memfd and that `size`
    /// matches the actual size of the memfd.
    pub unsafe fn from_fd(fd: OwnedFd, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        let ptr = map_shared(&fd, size)?;

        Ok(Self {
            fd,
            ptr,
            len: size,
            name: None,
        })
    }

    /// Open an existing shared memory segment from a raw file descriptor.
    ///
    /// This creates a new mapping from an existing fd without taking
    /// ownership. The original fd remains open and the segment maintains
    /// its own reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `fd` is a valid memfd and that `size`
    /// matches the actual size of the memfd.
    pub unsafe fn from_raw_fd(fd: RawFd, size: usize) -> Result<Self> {
        // Duplicate the fd so we have our own reference
        let dup_fd = rustix::io::fcntl_dupfd_cloexec(unsafe { BorrowedFd::borrow_raw(fd) }, 0)?;
        unsafe { Self::from_fd(dup_fd, size) }
    }

    /// Get the raw file descriptor.
    ///
    /// Use this to send the fd to another process via `SCM_RIGHTS`.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Get the debug name of this segment.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn map_shared(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
    let ptr = unsafe {
        rustix::mm::mmap(
            std::ptr::null_mut(),
            size,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            fd,
            0,
        )?
    };

    NonNull::new(ptr.cast::<u8>())
        .ok_or_else(|| Error::AllocationFailed("mmap returned null".into()))
}

impl MemorySegment for SharedMemorySegment {
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
        if offset >= self.len {
            return Ok(0);
        }
        let n = data.len().min(self.len - offset);
        // SAFETY: offset + n stays within the mapping; writers are
        // serialized by the caller per the MemorySegment contract.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), n);
        }
        Ok(n)
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::SharedMemory
    }

    fn ipc_handle(&self) -> Option<IpcHandle> {
        Some(IpcHandle::Fd {
            fd: self.fd.as_raw_fd(),
            size: self.len,
        })
    }
}

impl Drop for SharedMemorySegment {
    fn drop(&mut self) {
        // Unmap the memory region
        unsafe {
            let _ = rustix::mm::munmap(self.ptr.as_ptr().cast(), self.len);
        }
        // fd is automatically closed when OwnedFd is dropped
    }
}

// SAFETY: SharedMemorySegment is Send + Sync because:
// - The memory is shared and can be accessed from any thread
// - The fd is reference-counted by the kernel
// - We don't hold any thread-local state
unsafe impl Send for SharedMemorySegment {}
unsafe impl Sync for SharedMemorySegment {}

impl AsFd for SharedMemorySegment {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_memory_creation() {
        let segment = SharedMemorySegment::new("test-segment", 4096).unwrap();
        assert_eq!(segment.len(), 4096);
        assert_eq!(segment.memory_type(), MemoryType::SharedMemory);
        assert!(segment.memory_type().supports_ipc());
        assert!((&segment as &dyn MemorySegment).is_shareable());
        assert_eq!(segment.name(), Some("test-segment"));
    }

    #[test]
    fn test_shared_memory_zero_size_fails() {
        let result = SharedMemorySegment::new("test", 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_memory_is_zeroed() {
        let segment = SharedMemorySegment::new("test-zeroed", 4096).unwrap();
        let mut buf = [0xffu8; 4096];
        assert_eq!(segment.read_at(0, &mut buf).unwrap(), 4096);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shared_memory_read_write() {
        let segment = SharedMemorySegment::new("test-rw", 4096).unwrap();

        assert_eq!(segment.write_at(0, &[42, 43]).unwrap(), 2);
        assert_eq!(segment.write_at(4095, &[99]).unwrap(), 1);

        let mut buf = [0u8; 2];
        assert_eq!(segment.read_at(0, &mut buf).unwrap(), 2);
        assert_eq!(buf, [42, 43]);

        let mut one = [0u8; 1];
        assert_eq!(segment.read_at(4095, &mut one).unwrap(), 1);
        assert_eq!(one, [99]);
    }

    #[test]
    fn test_shared_memory_short_transfer_at_end() {
        let segment = SharedMemorySegment::new("test-short", 64).unwrap();

        assert_eq!(segment.write_at(60, &[1, 2, 3, 4, 5, 6]).unwrap(), 4);
        let mut buf = [0u8; 6];
        assert_eq!(segment.read_at(60, &mut buf).unwrap(), 4);
        assert_eq!(segment.read_at(64, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_shared_memory_modifications_visible_across_handles() {
        let segment1 = SharedMemorySegment::new("test-shared", 4096).unwrap();

        // Duplicate fd to simulate another process
        let segment2 =
            unsafe { SharedMemorySegment::from_raw_fd(segment1.as_raw_fd(), 4096).unwrap() };

        segment1.write_at(0, &[77]).unwrap();
        let mut buf = [0u8; 1];
        segment2.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [77]);

        segment2.write_at(100, &[88]).unwrap();
        segment1.read_at(100, &mut buf).unwrap();
        assert_eq!(buf, [88]);
    }
}
