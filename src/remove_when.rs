//! Predicate-driven bulk removal.
//!
//! Both table variants remove the same entries; they differ in how they
//! walk the table while it shrinks underneath them.

use crate::packed_hash_table::PackedHashTable;
use crate::reverse_index::{NoReverse, ReverseIndex};
use core::hash::{BuildHasher, Hash};

/// Containers that can drop every value matching a predicate.
pub trait RemoveWhen<V> {
    /// Removes every entry whose value satisfies `pred` and returns how
    /// many were removed.
    fn remove_when<F>(&mut self, pred: F) -> usize
    where
        F: FnMut(&V) -> bool;
}

/// Removes every entry of `container` whose value satisfies `pred`.
pub fn remove_when<C, V, F>(container: &mut C, pred: F) -> usize
where
    C: RemoveWhen<V> + ?Sized,
    F: FnMut(&V) -> bool,
{
    container.remove_when(pred)
}

// Without a reverse index a dense value cannot be traced back to its key,
// so the scan walks the key index instead and looks each value up through
// its handle. `remove_at` moves the last entry into the scanned slot, which
// is then examined again.
impl<K, V, Tag, S> RemoveWhen<V> for PackedHashTable<K, V, Tag, S, NoReverse>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn remove_when<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let mut removed = 0;
        let mut at = self.handle_begin();
        while at != self.handle_end() {
            if at.value(self).map_or(false, &mut pred) {
                at = self.remove_at(at);
                removed += 1;
            } else {
                at = at.next();
            }
        }
        log::trace!("remove_when by handle removed {removed} entries");
        removed
    }
}

// With a reverse index the dense values are scanned directly. A removal
// swaps the last dense value into the current position, so the position is
// examined again rather than skipped.
impl<K, V, Tag, S> RemoveWhen<V> for PackedHashTable<K, V, Tag, S, ReverseIndex<K, Tag>>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn remove_when<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let mut removed = 0;
        let mut pos = 0;
        while let Some(value) = self.as_slice().get(pos) {
            if !pred(value) {
                pos += 1;
                continue;
            }
            let handle = self
                .handle_from_index(pos)
                .expect("dense position must have a handle");
            self.remove_handle(handle).expect("dense handle must be linked to a key");
            removed += 1;
        }
        log::trace!("remove_when by value removed {removed} entries");
        removed
    }
}
