//! Memory segment trait and types.

use crate::error::Result;

/// Type of memory backing a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryType {
    /// Regular heap memory (single-process only).
    Heap,
    /// POSIX shared memory (memfd_create + mmap).
    SharedMemory,
    /// Memory-mapped file.
    MappedFile,
}

impl MemoryType {
    /// Can this memory type be shared across processes on the same machine?
    #[inline]
    pub fn supports_ipc(&self) -> bool {
        match self {
            MemoryType::Heap => false,
            MemoryType::SharedMemory => true,
            MemoryType::MappedFile => true,
        }
    }
}

/// Handle for sharing memory across processes.
///
/// This can be serialized and sent to another process, which can then
/// open the same memory region.
#[derive(Debug, Clone)]
pub enum IpcHandle {
    /// File descriptor (for memfd).
    /// The fd should be sent via SCM_RIGHTS over a Unix socket.
    Fd {
        /// The raw file descriptor.
        fd: std::os::unix::io::RawFd,
        /// Size of the memory region.
        size: usize,
    },
    /// Named memory region, addressable through the filesystem.
    Named {
        /// Path or name of the region.
        name: String,
        /// Size of the memory region.
        size: usize,
    },
}

/// Trait for memory segment backends.
///
/// A memory segment represents a contiguous, fixed-size region of bytes.
/// The map core addresses it only through `read_at`/`write_at`, so it never
/// assumes a particular allocation mechanism — heap, memfd, or a mapped
/// file all work, as long as the region is zero-initialized before first
/// use.
///
/// # Consistency
///
/// Segments do not synchronize access. When a segment is shared between
/// processes, writers must be serialized externally (the map does this with
/// a [`ProcessLock`](crate::lock::ProcessLock)); readers may observe a
/// write in progress.
pub trait MemorySegment: Send + Sync {
    /// Total size of the segment in bytes.
    fn len(&self) -> usize;

    /// Returns true if the segment has zero length.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied, which is
    /// `min(buf.len(), len - offset)` — a short count at or past the end of
    /// the segment, never an error.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize>;

    /// Copy `data` into the segment starting at `offset`.
    ///
    /// Returns the number of bytes written, clamped at the end of the
    /// segment like [`read_at`](Self::read_at).
    fn write_at(&self, offset: usize, data: &[u8]) -> Result<usize>;

    /// The type of memory backing this segment.
    fn memory_type(&self) -> MemoryType;

    /// Get an IPC handle for sharing this segment with other processes.
    ///
    /// Returns `None` if this segment type doesn't support cross-process
    /// sharing.
    fn ipc_handle(&self) -> Option<IpcHandle>;
}

/// Extension methods for `dyn MemorySegment`.
impl dyn MemorySegment {
    /// Check if this segment can be shared with other processes.
    pub fn is_shareable(&self) -> bool {
        self.ipc_handle().is_some()
    }
}
