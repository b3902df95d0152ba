//! Optional handle → key index.
//!
//! A table carries either [`NoReverse`], which stores nothing, or a
//! [`ReverseIndex`], which keeps a copy of every key next to its handle so
//! that a value found by dense position can be traced back to its key.

use crate::handle_vec::Handle;
use hashbrown::HashMap;

mod sealed {
    pub trait Sealed {}
}

/// Storage strategy for the reverse index of a packed hashtable.
///
/// Only the table mutates this, always together with its key index. The
/// key copy is taken with [`ReverseLookup::stash`] before the table touches
/// any of its structures, so a panicking `K::clone` leaves nothing behind.
pub trait ReverseLookup<K, Tag>: sealed::Sealed + Default {
    /// What gets stored per handle.
    #[doc(hidden)]
    type Stored;
    #[doc(hidden)]
    fn stash(key: &K) -> Self::Stored;
    #[doc(hidden)]
    fn reserve(&mut self, additional: usize);
    #[doc(hidden)]
    fn link(&mut self, handle: Handle<Tag>, stored: Self::Stored);
    #[doc(hidden)]
    fn unlink(&mut self, handle: Handle<Tag>);
    #[doc(hidden)]
    fn clear(&mut self);
    /// Number of linked handles, if this strategy tracks any.
    #[doc(hidden)]
    fn linked(&self) -> Option<usize>;
}

/// Reverse index of the plain variant: nothing is stored.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoReverse;

impl sealed::Sealed for NoReverse {}

impl<K, Tag> ReverseLookup<K, Tag> for NoReverse {
    type Stored = ();
    #[inline]
    fn stash(_key: &K) {}
    #[inline]
    fn reserve(&mut self, _additional: usize) {}
    #[inline]
    fn link(&mut self, _handle: Handle<Tag>, _stored: ()) {}
    #[inline]
    fn unlink(&mut self, _handle: Handle<Tag>) {}
    #[inline]
    fn clear(&mut self) {}
    #[inline]
    fn linked(&self) -> Option<usize> {
        None
    }
}

/// Handle → key map used by the reverse-lookup variant.
pub struct ReverseIndex<K, Tag> {
    keys: HashMap<Handle<Tag>, K>,
}

impl<K, Tag> ReverseIndex<K, Tag> {
    pub(crate) fn get(&self, handle: Handle<Tag>) -> Option<&K> {
        self.keys.get(&handle)
    }
}

impl<K, Tag> Default for ReverseIndex<K, Tag> {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }
}

impl<K, Tag> sealed::Sealed for ReverseIndex<K, Tag> {}

impl<K: Clone, Tag> ReverseLookup<K, Tag> for ReverseIndex<K, Tag> {
    type Stored = K;

    fn stash(key: &K) -> K {
        key.clone()
    }

    fn reserve(&mut self, additional: usize) {
        self.keys.reserve(additional);
    }

    fn link(&mut self, handle: Handle<Tag>, key: K) {
        let prev = self.keys.insert(handle, key);
        debug_assert!(prev.is_none(), "handle linked twice");
    }

    fn unlink(&mut self, handle: Handle<Tag>) {
        let prev = self.keys.remove(&handle);
        debug_assert!(prev.is_some(), "unlinking unknown handle");
    }

    fn clear(&mut self) {
        self.keys.clear();
    }

    fn linked(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle_vec::{DefaultTag, HandleVec};

    /// Invariant: link/unlink keep exactly one key per live handle.
    #[test]
    fn link_unlink_roundtrip() {
        let mut store: HandleVec<u8> = HandleVec::new();
        let a = store.add(1);
        let b = store.add(2);
        let mut rev: ReverseIndex<String, DefaultTag> = ReverseIndex::default();
        rev.reserve(2);
        rev.link(a, "a".to_string());
        rev.link(b, "b".to_string());
        assert_eq!(rev.get(a).map(String::as_str), Some("a"));
        assert_eq!(rev.linked(), Some(2));

        rev.unlink(a);
        assert_eq!(rev.get(a), None);
        assert_eq!(rev.get(b).map(String::as_str), Some("b"));

        rev.clear();
        assert_eq!(rev.linked(), Some(0));
    }

    #[test]
    fn no_reverse_tracks_nothing() {
        let mut store: HandleVec<u8> = HandleVec::new();
        let a = store.add(1);
        let mut rev = NoReverse;
        <NoReverse as ReverseLookup<u32, DefaultTag>>::stash(&7);
        ReverseLookup::<u32, DefaultTag>::link(&mut rev, a, ());
        assert_eq!(ReverseLookup::<u32, DefaultTag>::linked(&rev), None);
    }
}
