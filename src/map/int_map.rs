//! The map core: capacity derivation, linear probing, size bookkeeping.

use std::sync::Arc;

use tracing::debug;

use super::slot::{HEADER_BYTES, SLOT_BYTES, Slot, slot_offset};
use crate::error::{Error, Result};
use crate::lock::{HeldLock, ProcessLock};
use crate::memory::MemorySegment;

/// Outcome of one probe circuit over the slot array.
enum Probe {
    /// The key is stored at `index` with the decoded value.
    Found { index: usize, value: i64 },
    /// The key is absent; `index` is the first empty slot on its probe
    /// path.
    Vacant { index: usize },
    /// Every slot was visited without finding the key or an empty slot.
    Exhausted,
}

/// A fixed-capacity map from `i64` keys to `i64` values, stored entirely
/// inside a [`MemorySegment`].
///
/// The segment holds an `i64` occupancy counter followed by a flat array
/// of 16-byte slots; capacity is whatever fits and never changes.
/// Collisions are resolved by linear probing from `|key| % capacity` with
/// wraparound. Keys are never deleted.
///
/// Several processes may open maps over the same physical buffer. Writers
/// are serialized through the optional [`ProcessLock`]; each `set` holds
/// it for the whole probe-write-count sequence, so occupancy bookkeeping
/// stays consistent across processes.
///
/// # Example
///
/// ```rust
/// use shmap::map::IntIntMap;
/// use shmap::memory::HeapSegment;
///
/// let segment = HeapSegment::new(8 + 16 * 64).unwrap();
/// let map = IntIntMap::new(segment, None).unwrap();
///
/// assert_eq!(map.set(7, 100).unwrap(), None);
/// assert_eq!(map.get(7).unwrap(), Some(100));
/// assert_eq!(map.set(7, 200).unwrap(), Some(100));
/// ```
pub struct IntIntMap {
    /// The buffer holding header and slots, possibly shared with other
    /// processes.
    segment: Arc<dyn MemorySegment>,
    /// Writer lock; `None` for single-writer setups.
    lock: Option<Arc<dyn ProcessLock>>,
    /// Number of slots, frozen at construction.
    capacity: usize,
}

impl IntIntMap {
    /// Open a map over `segment`, serializing writers through `lock`.
    ///
    /// The segment must be zero-initialized on first use (all provided
    /// backends guarantee this); a zeroed buffer is an empty map.
    ///
    /// # Arguments
    ///
    /// * `segment` - The buffer holding the map state.
    /// * `lock` - Cross-process writer lock, or `None` if the caller
    ///   guarantees a single writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SegmentTooSmall`] if the segment cannot hold the
    /// header plus at least one slot.
    pub fn new(
        segment: impl MemorySegment + 'static,
        lock: Option<Arc<dyn ProcessLock>>,
    ) -> Result<Self> {
        Self::new_arc(Arc::new(segment), lock)
    }

    /// Open a map over an already-shared segment.
    pub fn new_arc(
        segment: Arc<dyn MemorySegment>,
        lock: Option<Arc<dyn ProcessLock>>,
    ) -> Result<Self> {
        let len = segment.len();
        let min = HEADER_BYTES + SLOT_BYTES;
        if len < min {
            return Err(Error::SegmentTooSmall { len, min });
        }

        let capacity = (len - HEADER_BYTES) / SLOT_BYTES;
        debug!(capacity, segment_len = len, "opened int-int map");

        Ok(Self {
            segment,
            lock,
            capacity,
        })
    }

    /// Look up `key`.
    ///
    /// Probes from the key's natural index and stops at the first empty
    /// slot, so a miss in a lightly loaded map is O(1).
    ///
    /// Reads take no lock: a `get` racing a `set` in another process may
    /// observe the state mid-mutation. This is the documented trade-off
    /// for lock-free reads, not an oversight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] for `i64::MIN`, or a transfer error
    /// if the segment misbehaves.
    pub fn get(&self, key: i64) -> Result<Option<i64>> {
        check_key(key)?;

        match self.probe(key)? {
            Probe::Found { value, .. } => Ok(Some(value)),
            Probe::Vacant { .. } | Probe::Exhausted => Ok(None),
        }
    }

    /// Insert or update `key`, returning the previous value.
    ///
    /// Holds the writer lock (when one was provided) for the whole
    /// operation; the lock is released on every exit path, including
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] for `i64::MIN`,
    /// [`Error::CapacityExceeded`] when inserting a new key into a full
    /// map, or [`Error::Inconsistent`] if the occupancy counter disagrees
    /// with the slot array.
    pub fn set(&self, key: i64, value: i64) -> Result<Option<i64>> {
        let _guard = match self.lock.as_deref() {
            Some(lock) => Some(HeldLock::acquire(lock)?),
            None => None,
        };

        check_key(key)?;

        let (index, previous) = match self.probe(key)? {
            Probe::Found { index, value } => (index, Some(value)),
            Probe::Vacant { index } => (index, None),
            Probe::Exhausted => {
                let size = self.len()?;
                if size >= self.capacity {
                    return Err(Error::CapacityExceeded {
                        key,
                        capacity: self.capacity,
                    });
                }
                return Err(Error::Inconsistent {
                    key,
                    size,
                    capacity: self.capacity,
                });
            }
        };

        self.write_slot(index, key, value)?;

        if previous.is_none() {
            let size = self.read_size()?;
            self.write_size(size + 1)?;
        }

        Ok(previous)
    }

    /// The fixed number of slots in this map.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of occupied slots, read from the shared header.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the segment misbehaves.
    pub fn len(&self) -> Result<usize> {
        // A negative header can only come from a foreign writer; read it
        // as an empty map rather than a huge occupancy.
        Ok(self.read_size()?.max(0) as usize)
    }

    /// Returns true if no slot is occupied.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the segment misbehaves.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Walk the probe order for `key`: `[start, capacity)` then
    /// `[0, start)`, visiting every slot exactly once.
    fn probe(&self, key: i64) -> Result<Probe> {
        let start = self.start_index(key);

        for index in (start..self.capacity).chain(0..start) {
            match self.read_slot(index)? {
                Slot::Empty => return Ok(Probe::Vacant { index }),
                Slot::Occupied { key: stored, value } if stored == key => {
                    return Ok(Probe::Found { index, value });
                }
                Slot::Occupied { .. } => {}
            }
        }

        Ok(Probe::Exhausted)
    }

    fn start_index(&self, key: i64) -> usize {
        (key.unsigned_abs() % self.capacity as u64) as usize
    }

    fn read_slot(&self, index: usize) -> Result<Slot> {
        let offset = slot_offset(index);
        let mut buf = [0u8; SLOT_BYTES];
        let got = self.segment.read_at(offset, &mut buf)?;
        if got != SLOT_BYTES {
            return Err(Error::ShortRead {
                offset,
                got,
                expected: SLOT_BYTES,
            });
        }
        Ok(Slot::decode(buf))
    }

    fn write_slot(&self, index: usize, key: i64, value: i64) -> Result<()> {
        let offset = slot_offset(index);
        let bytes = Slot::encode(key, value);
        let got = self.segment.write_at(offset, &bytes)?;
        if got != SLOT_BYTES {
            return Err(Error::ShortWrite {
                offset,
                got,
                expected: SLOT_BYTES,
            });
        }
        Ok(())
    }

    fn read_size(&self) -> Result<i64> {
        let mut buf = [0u8; HEADER_BYTES];
        let got = self.segment.read_at(0, &mut buf)?;
        if got != HEADER_BYTES {
            return Err(Error::ShortRead {
                offset: 0,
                got,
                expected: HEADER_BYTES,
            });
        }
        Ok(i64::from_le_bytes(buf))
    }

    fn write_size(&self, size: i64) -> Result<()> {
        let got = self.segment.write_at(0, &size.to_le_bytes())?;
        if got != HEADER_BYTES {
            return Err(Error::ShortWrite {
                offset: 0,
                got,
                expected: HEADER_BYTES,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for IntIntMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntIntMap")
            .field("capacity", &self.capacity)
            .field("has_lock", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

fn check_key(key: i64) -> Result<()> {
    if key == i64::MIN {
        return Err(Error::InvalidKey(key));
    }
    Ok(())
}
