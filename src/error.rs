//! Error types for shmap.

use thiserror::Error;

/// Result type alias using shmap's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shmap operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The reserved minimum key was passed to `get` or `set`.
    ///
    /// `i64::MIN` cannot be stored because the slot encoding shifts
    /// non-positive keys down by one.
    #[error("key {0} cannot be used; the usable range is [{min}, {max}]", min = i64::MIN + 1, max = i64::MAX)]
    InvalidKey(i64),

    /// A new key was inserted while every slot was already occupied.
    #[error("cannot insert key {key}: all {capacity} slots are occupied")]
    CapacityExceeded {
        /// The key that could not be inserted.
        key: i64,
        /// The fixed capacity of the map.
        capacity: usize,
    },

    /// The probe circuit found no candidate slot even though the size
    /// header says there is room. Signals corrupted bookkeeping.
    #[error("no slot available for key {key} but size {size} is below capacity {capacity}")]
    Inconsistent {
        /// The key being inserted when the inconsistency was detected.
        key: i64,
        /// The occupied-slot count read from the header.
        size: usize,
        /// The fixed capacity of the map.
        capacity: usize,
    },

    /// The segment returned fewer bytes than the fixed record width.
    #[error("short read at offset {offset}: {got} of {expected} bytes")]
    ShortRead {
        /// Byte offset of the attempted read.
        offset: usize,
        /// Bytes actually transferred.
        got: usize,
        /// Bytes required.
        expected: usize,
    },

    /// The segment accepted fewer bytes than the fixed record width.
    #[error("short write at offset {offset}: {got} of {expected} bytes")]
    ShortWrite {
        /// Byte offset of the attempted write.
        offset: usize,
        /// Bytes actually transferred.
        got: usize,
        /// Bytes required.
        expected: usize,
    },

    /// The segment cannot hold the header plus at least one slot.
    #[error("memory segment of {len} bytes is too small; need at least {min} bytes")]
    SegmentTooSmall {
        /// Length of the provided segment.
        len: usize,
        /// Minimum usable length.
        min: usize,
    },

    /// This handle tried to acquire a lock it already holds.
    #[error("the lock has already been acquired by this handle")]
    LockAlreadyHeld,

    /// This handle tried to release a lock it does not hold.
    #[error("the lock is not held by this handle")]
    LockNotHeld,

    /// Memory allocation failed.
    #[error("memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid memory segment operation.
    #[error("invalid memory segment: {0}")]
    InvalidSegment(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}
