//! # shmap
//!
//! A fixed-capacity integer-to-integer hash map stored entirely inside one
//! raw, fixed-size memory buffer that multiple independent processes can
//! map and mutate — no server process required.
//!
//! ## Features
//!
//! - **One flat buffer**: header and slot array live in a single region;
//!   any process that maps the bytes sees the same map
//! - **Open addressing**: linear probing with wraparound, O(1) expected
//!   lookups at low load factors
//! - **Lock-free reads**: only writers take the cross-process lock
//! - **Pluggable backing**: heap memory, anonymous memfd, or a mapped file
//! - **Linux-optimized**: memfd_create + mmap for zero-copy sharing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shmap::prelude::*;
//!
//! // A buffer big enough for 1024 slots, shareable over fd passing
//! let segment = SharedMemorySegment::new("intmap", 8 + 16 * 1024)?;
//! let lock = Arc::new(FlockLock::open("/tmp/intmap.lock")?);
//!
//! let map = IntIntMap::new(segment, Some(lock))?;
//! map.set(42, 1000)?;
//! assert_eq!(map.get(42)?, Some(1000));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod lock;
pub mod map;
pub mod memory;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::lock::{FlockLock, ProcessLock};
    pub use crate::map::IntIntMap;
    pub use crate::memory::{HeapSegment, MappedFileSegment, MemorySegment, SharedMemorySegment};
}

pub use error::{Error, Result};
pub use map::IntIntMap;
