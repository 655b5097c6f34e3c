//! Fixed-width slot encoding with a zero sentinel.
//!
//! Each slot is two little-endian `i64`s: the encoded key and the value.
//! A raw key of `0` marks an empty slot, so the literal key `0` (and every
//! other non-positive key) is shifted down by one on the wire:
//!
//! ```text
//! logical key   raw key
//!      5    →      5
//!      0    →     -1
//!     -1    →     -2
//! i64::MIN+1 →  i64::MIN
//! ```
//!
//! `i64::MIN` itself has no raw form and is rejected before encoding.

/// Width of the size header at offset 0.
pub(crate) const HEADER_BYTES: usize = 8;

/// Width of one (encoded key, value) slot.
pub(crate) const SLOT_BYTES: usize = 16;

/// Decoded view of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// No key stored here.
    Empty,
    /// A stored pair, with the key already shifted back to its logical
    /// value.
    Occupied {
        /// The logical key.
        key: i64,
        /// The stored value.
        value: i64,
    },
}

impl Slot {
    /// Decode a slot from its on-wire form.
    pub(crate) fn decode(bytes: [u8; SLOT_BYTES]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        let raw_key = i64::from_le_bytes(raw);

        if raw_key == 0 {
            return Slot::Empty;
        }

        raw.copy_from_slice(&bytes[8..]);
        let value = i64::from_le_bytes(raw);

        let key = if raw_key < 0 { raw_key + 1 } else { raw_key };
        Slot::Occupied { key, value }
    }

    /// Encode a pair into its on-wire form.
    ///
    /// `key` must not be `i64::MIN`; callers validate before reaching the
    /// codec.
    pub(crate) fn encode(key: i64, value: i64) -> [u8; SLOT_BYTES] {
        debug_assert!(key != i64::MIN, "reserved key reached the codec");

        let raw_key = if key <= 0 { key - 1 } else { key };

        let mut bytes = [0u8; SLOT_BYTES];
        bytes[..8].copy_from_slice(&raw_key.to_le_bytes());
        bytes[8..].copy_from_slice(&value.to_le_bytes());
        bytes
    }
}

/// Byte offset of slot `index`, immediately after the size header.
pub(crate) fn slot_offset(index: usize) -> usize {
    HEADER_BYTES + index * SLOT_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_bytes_decode_empty() {
        assert_eq!(Slot::decode([0u8; SLOT_BYTES]), Slot::Empty);
    }

    #[test]
    fn test_positive_keys_stored_unchanged() {
        let bytes = Slot::encode(5, 99);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        assert_eq!(i64::from_le_bytes(raw), 5);
        assert_eq!(Slot::decode(bytes), Slot::Occupied { key: 5, value: 99 });
    }

    #[test]
    fn test_zero_key_shifts_to_minus_one() {
        let bytes = Slot::encode(0, 7);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        assert_eq!(i64::from_le_bytes(raw), -1);
        assert_eq!(Slot::decode(bytes), Slot::Occupied { key: 0, value: 7 });
    }

    #[test]
    fn test_negative_keys_shift_down() {
        let bytes = Slot::encode(-1, -42);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        assert_eq!(i64::from_le_bytes(raw), -2);
        assert_eq!(
            Slot::decode(bytes),
            Slot::Occupied {
                key: -1,
                value: -42
            }
        );
    }

    #[test]
    fn test_boundary_keys_round_trip() {
        for key in [i64::MAX, i64::MIN + 1, 1, -1, 0] {
            let decoded = Slot::decode(Slot::encode(key, key ^ 0x5a5a));
            assert_eq!(
                decoded,
                Slot::Occupied {
                    key,
                    value: key ^ 0x5a5a
                }
            );
        }
    }

    #[test]
    fn test_lowest_usable_key_encodes_to_min() {
        let bytes = Slot::encode(i64::MIN + 1, 1);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        assert_eq!(i64::from_le_bytes(raw), i64::MIN);
    }

    #[test]
    fn test_slot_offsets() {
        assert_eq!(slot_offset(0), 8);
        assert_eq!(slot_offset(1), 24);
        assert_eq!(slot_offset(7), 8 + 7 * 16);
    }
}
