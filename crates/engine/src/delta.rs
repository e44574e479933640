//! Key delta computation
//!
//! Given the set of keys already cached and the key sequence from the
//! latest master emission, compute exactly the keys that are new.
//! Master sets can be large and are recomputed on every debounced tick,
//! so membership goes through a hash set rather than repeated scans.

use rustc_hash::FxHashSet;
use trellis_core::MasterKey;

/// Keys of `current` absent from `previous`, in `current` order,
/// duplicates collapsed to first occurrence.
///
/// Pure; runs in O(|previous| + |current|).
pub fn key_delta(previous: &FxHashSet<MasterKey>, current: &[MasterKey]) -> Vec<MasterKey> {
    let mut seen: FxHashSet<&MasterKey> = FxHashSet::default();
    let mut delta = Vec::new();
    for key in current {
        if !previous.contains(key) && seen.insert(key) {
            delta.push(key.clone());
        }
    }
    delta
}
