//! The int-int map core.
//!
//! All map state lives inside one fixed-size byte buffer:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ offset 0:  i64 size          (occupied-slot count)   │
//! ├──────────────────────────────────────────────────────┤
//! │ offset 8 + i*16:   i64 encoded_key   (0 = empty)     │
//! │ offset 8 + i*16+8: i64 value                         │
//! │                    ... i = 0 .. capacity-1 ...       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. `capacity` is derived once from the
//! buffer size and never changes; collisions are resolved by linear
//! probing with wraparound.

mod int_map;
mod slot;

pub use int_map::IntIntMap;
