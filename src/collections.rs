//! Collection aliases tuned for index-heavy mesh work.
//!
//! Mesh editing spends most of its time in small integer-keyed maps and short
//! per-entity index lists. The aliases here pin down the implementations used
//! throughout the crate: `FxHash`-based maps and sets for non-adversarial
//! integer keys, and inline small-vector buffers for vertex loops and
//! adjacency lists that almost never spill to the heap.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Fast non-cryptographic `HashMap`.
///
/// Keys are internal integer labels, never attacker-controlled, so the
/// hardened default hasher buys nothing here.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Fast non-cryptographic `HashSet`. See [`FastHashMap`].
pub type FastHashSet<K> = FxHashSet<K>;

/// Small buffer with inline capacity `N`.
///
/// Used for per-face vertex loops (most faces are quads or triangles) and
/// per-edge face lists (almost always two entries).
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Create a [`FastHashMap`] with pre-allocated capacity.
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}

/// Create a [`FastHashSet`] with pre-allocated capacity.
#[must_use]
pub fn fast_hash_set_with_capacity<K>(capacity: usize) -> FastHashSet<K> {
    FastHashSet::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}

#[cfg(test)]
mod tests {
    use super::{fast_hash_map_with_capacity, fast_hash_set_with_capacity, SmallBuffer};

    #[test]
    fn test_capacity_helpers() {
        let map = fast_hash_map_with_capacity::<i32, usize>(64);
        assert!(map.capacity() >= 64);

        let set = fast_hash_set_with_capacity::<i32>(32);
        assert!(set.capacity() >= 32);
    }

    #[test]
    fn test_small_buffer_stays_inline() {
        let mut buffer: SmallBuffer<i32, 4> = SmallBuffer::new();
        for i in 0..4 {
            buffer.push(i);
        }
        assert!(!buffer.spilled());
        buffer.push(4);
        assert!(buffer.spilled());
    }
}
