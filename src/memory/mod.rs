//! Memory backends for the shared map buffer.
//!
//! This module provides the abstraction layer between the map core and the
//! raw bytes it lives in. The core only sees [`MemorySegment`] — a
//! fixed-size region with `read_at`/`write_at` — so the same map works over
//! heap memory, an anonymous memfd shared between processes, or a file on
//! disk.
//!
//! # Architecture
//!
//! - [`MemorySegment`]: Trait for the different memory backends
//! - [`HeapSegment`]: Plain allocation, single-process only
//! - [`SharedMemorySegment`]: memfd-backed, shared via fd passing
//! - [`MappedFileSegment`]: file-backed, survives process restarts

mod heap;
mod mapped_file;
mod segment;
mod shared;

pub use heap::HeapSegment;
pub use mapped_file::MappedFileSegment;
pub use segment::{IpcHandle, MemorySegment, MemoryType};
pub use shared::SharedMemorySegment;
