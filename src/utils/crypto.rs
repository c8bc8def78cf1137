use sha1::{Digest, Sha1};

use crate::utils::constants::RING_MASK;
use crate::utils::types::HashPos;

/// Hashes arbitrary bytes onto the ring: SHA-1 reduced mod 2^RING_BITS.
/// Node addresses and keys share one identifier space, so collisions are
/// possible at small ring sizes and must be treated as valid positions.
pub fn hash(bytes: &[u8]) -> HashPos {
    let digest = Sha1::digest(bytes);
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[12..]);
    HashPos::from_be_bytes(tail) & RING_MASK
}

/// True iff `x` lies in the arc walked clockwise from `start` to `end`,
/// excluding `start` and, unless `inclusive`, excluding `end`. With
/// `start == end` the arc is the whole ring minus `start`.
pub fn is_between(start: HashPos, x: HashPos, end: HashPos, inclusive: bool) -> bool {
    let offset = x.wrapping_sub(start) & RING_MASK;
    let span = end.wrapping_sub(start) & RING_MASK;
    if offset == 0 {
        return false;
    }
    if span == 0 {
        return true;
    }
    offset < span || (inclusive && offset == span)
}

/// Start position of finger `index`: (id + 2^index) mod 2^RING_BITS.
pub fn finger_start(id: HashPos, index: u32) -> HashPos {
    id.wrapping_add((1 as HashPos).wrapping_shl(index)) & RING_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{RING_BITS, RING_SIZE};

    #[test]
    fn hash_is_deterministic_and_stays_on_the_ring() {
        for input in ["127.0.0.1:4600", "127.0.0.1:4601", "some-file.txt", ""] {
            let pos = hash(input.as_bytes());
            assert!(pos < RING_SIZE);
            assert_eq!(pos, hash(input.as_bytes()));
        }
    }

    #[test]
    fn arc_wraps_across_zero() {
        assert!(is_between(900, 50, 100, false));
        assert!(!is_between(100, 50, 900, false));
    }

    #[test]
    fn arc_with_equal_bounds_covers_the_ring_minus_start() {
        assert!(is_between(100, 900, 100, false));
        assert!(is_between(7, 8, 7, false));
        assert!(is_between(7, 6, 7, true));
        assert!(!is_between(7, 7, 7, true));
    }

    #[test]
    fn inclusive_covers_the_end_only() {
        assert!(is_between(10, 20, 20, true));
        assert!(!is_between(10, 20, 20, false));
        assert!(!is_between(10, 10, 20, true));
        assert!(is_between(10, 11, 20, false));
    }

    #[test]
    fn finger_starts_are_geometric_and_wrap() {
        assert_eq!(finger_start(0, 0), 1);
        assert_eq!(finger_start(0, RING_BITS - 1), RING_SIZE / 2);
        assert_eq!(finger_start(1000, 5), (1000 + 32) % RING_SIZE);
        assert_eq!(finger_start(RING_SIZE - 1, 0), 0);
    }
}
