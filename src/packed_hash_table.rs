//! PackedHashTable: keyed and handle-addressed access over densely packed
//! values.
//!
//! Three coordinate spaces are kept in step:
//! - key → entry position (`Locator`) in the key index,
//! - entry → `Handle` into the value store,
//! - `Handle` ↔ dense position inside the value store.
//!
//! Sorting and partitioning only move values inside the store, which
//! repoints its own handle slots; keys keep their handles throughout.

use crate::handle_vec::{DefaultTag, Handle, HandleVec};
use crate::key_index::{Handles, KeyIndex};
use crate::reverse_index::{NoReverse, ReverseIndex, ReverseLookup};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::{Bound, Range, RangeBounds};
use std::collections::hash_map::RandomState;

/// Position of an entry in a table's key index.
///
/// Locators come from `add`, `find` and the handle scan
/// ([`PackedHashTable::handle_begin`]). Any removal or insertion other than
/// through [`PackedHashTable::remove_at`] at the scanned position may move
/// entries; a locator is then only bounds-checked, not tracked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Locator(usize);

impl Locator {
    pub fn index(self) -> usize {
        self.0
    }

    /// The locator following this one in a handle scan.
    #[must_use]
    pub fn next(self) -> Self {
        Locator(self.0 + 1)
    }

    pub fn key<'a, K, V, Tag, S, Rev>(
        &self,
        table: &'a PackedHashTable<K, V, Tag, S, Rev>,
    ) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
        Rev: ReverseLookup<K, Tag>,
    {
        table.keys.get(self.0).map(|(k, _)| k)
    }

    pub fn handle<K, V, Tag, S, Rev>(
        &self,
        table: &PackedHashTable<K, V, Tag, S, Rev>,
    ) -> Option<Handle<Tag>>
    where
        K: Eq + Hash,
        S: BuildHasher,
        Rev: ReverseLookup<K, Tag>,
    {
        table.keys.handle(self.0)
    }

    pub fn value<'a, K, V, Tag, S, Rev>(
        &self,
        table: &'a PackedHashTable<K, V, Tag, S, Rev>,
    ) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
        Rev: ReverseLookup<K, Tag>,
    {
        table.entry_at(*self).map(|(_, v)| v)
    }

    pub fn value_mut<'a, K, V, Tag, S, Rev>(
        &self,
        table: &'a mut PackedHashTable<K, V, Tag, S, Rev>,
    ) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
        Rev: ReverseLookup<K, Tag>,
    {
        let handle = table.keys.handle(self.0)?;
        table.values.get_mut(handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    DuplicateKey,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::DuplicateKey => f.write_str("key already present"),
        }
    }
}

impl std::error::Error for InsertError {}

/// Hashtable whose values are stored contiguously.
///
/// `Tag` makes handles of different tables distinct types, `S` hashes keys
/// and `Rev` selects whether a handle → key index is kept (see
/// [`PackedHashTableRl`]).
pub struct PackedHashTable<K, V, Tag = DefaultTag, S = RandomState, Rev = NoReverse> {
    values: HandleVec<V, Tag>,
    keys: KeyIndex<K, Tag, S>,
    reverse: Rev,
}

/// Reverse-lookup variant: also maps every handle back to its key.
pub type PackedHashTableRl<K, V, Tag = DefaultTag, S = RandomState> =
    PackedHashTable<K, V, Tag, S, ReverseIndex<K, Tag>>;

impl<K, V, Tag, S, Rev> PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    Rev: ReverseLookup<K, Tag>,
{
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, Tag, S, Rev> Default for PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    Rev: ReverseLookup<K, Tag>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, Tag, S, Rev> PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash,
    S: BuildHasher,
    Rev: ReverseLookup<K, Tag>,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let mut reverse = Rev::default();
        reverse.reserve(capacity);
        Self {
            values: HandleVec::with_capacity(capacity),
            keys: KeyIndex::with_capacity_and_hasher(capacity, hasher),
            reverse,
        }
    }

    pub fn hasher(&self) -> &S {
        self.keys.hasher()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Capacity of the dense value storage.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Reserves room for `additional` more entries in every index.
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
        self.keys.reserve(additional);
        self.reverse.reserve(additional);
    }

    /// Removes all entries; every handle goes stale. Capacity is kept.
    pub fn clear(&mut self) {
        log::trace!("clear {} entries", self.len());
        self.values.clear();
        self.keys.clear();
        self.reverse.clear();
    }

    /// Adds `key` → `value` unless `key` is present.
    ///
    /// Returns the locator of the entry holding `key` and whether a new
    /// entry was created. An existing entry is left untouched.
    pub fn add(&mut self, key: K, value: V) -> (Locator, bool) {
        let hash = self.keys.make_hash(&key);
        if let Some(pos) = self.keys.find_hashed(hash, &key) {
            return (Locator(pos), false);
        }
        (self.push_new(hash, key, value), true)
    }

    /// Like [`add`](Self::add), but overwrites the value of an existing
    /// entry in place. Its handle stays the same.
    pub fn add_or_update(&mut self, key: K, value: V) -> (Locator, bool) {
        let hash = self.keys.make_hash(&key);
        if let Some(pos) = self.keys.find_hashed(hash, &key) {
            if let Some(slot) = self.keys.handle(pos).and_then(|h| self.values.get_mut(h)) {
                *slot = value;
            }
            return (Locator(pos), false);
        }
        (self.push_new(hash, key, value), true)
    }

    /// Adds `key` → `value`, failing if `key` is present.
    pub fn insert(&mut self, key: K, value: V) -> Result<Locator, InsertError> {
        match self.add(key, value) {
            (at, true) => Ok(at),
            (_, false) => Err(InsertError::DuplicateKey),
        }
    }

    fn push_new(&mut self, hash: u64, key: K, value: V) -> Locator {
        let stored = Rev::stash(&key);
        // All three structures get their room up front; past this point
        // nothing allocates or calls user code.
        self.values.reserve(1);
        self.keys.reserve(1);
        self.reverse.reserve(1);

        let handle = self.values.add(value);
        self.reverse.link(handle, stored);
        Locator(self.keys.insert_unique(hash, key, handle))
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Locator>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.keys.find(q).map(Locator)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.keys.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.keys.handle(self.keys.find(q)?)?;
        self.values.get(handle)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.keys.handle(self.keys.find(q)?)?;
        self.values.get_mut(handle)
    }

    pub fn get_by_handle(&self, handle: Handle<Tag>) -> Option<&V> {
        self.values.get(handle)
    }

    pub fn get_by_handle_mut(&mut self, handle: Handle<Tag>) -> Option<&mut V> {
        self.values.get_mut(handle)
    }

    /// Runs `f` on the value stored under `q`; does nothing if absent.
    pub fn call<Q, F>(&self, q: &Q, f: F)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V),
    {
        if let Some(v) = self.get(q) {
            f(v);
        }
    }

    pub fn call_mut<Q, F>(&mut self, q: &Q, f: F)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&mut V),
    {
        if let Some(v) = self.get_mut(q) {
            f(v);
        }
    }

    /// Runs `f` on the value behind `handle`; does nothing if stale.
    pub fn call_handle<F>(&self, handle: Handle<Tag>, f: F)
    where
        F: FnOnce(&V),
    {
        if let Some(v) = self.values.get(handle) {
            f(v);
        }
    }

    pub fn call_handle_mut<F>(&mut self, handle: Handle<Tag>, f: F)
    where
        F: FnOnce(&mut V),
    {
        if let Some(v) = self.values.get_mut(handle) {
            f(v);
        }
    }

    /// Runs `f` on the value stored under `q` and returns its result, or
    /// `None` if `q` is absent.
    pub fn call_return<Q, F, R>(&self, q: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        self.get(q).map(f)
    }

    pub fn call_return_mut<Q, F, R>(&mut self, q: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&mut V) -> R,
    {
        self.get_mut(q).map(f)
    }

    pub fn call_return_handle<F, R>(&self, handle: Handle<Tag>, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.values.get(handle).map(f)
    }

    pub fn call_return_handle_mut<F, R>(&mut self, handle: Handle<Tag>, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.values.get_mut(handle).map(f)
    }

    /// Removes the entry stored under `q`.
    ///
    /// Returns `None` if `q` is absent, otherwise the locator at which a
    /// handle scan continues (possibly [`handle_end`](Self::handle_end)).
    pub fn remove<Q>(&mut self, q: &Q) -> Option<Locator>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.keys.find(q)?;
        Some(self.remove_at(Locator(pos)))
    }

    /// Removes the entry at `at` and returns the locator of the next entry
    /// to visit.
    ///
    /// The last entry of the key index moves into `at`, so the returned
    /// locator is `at` itself.
    ///
    /// # Panics
    ///
    /// Panics if `at` does not designate an entry.
    pub fn remove_at(&mut self, at: Locator) -> Locator {
        let _ = self.take_at(at);
        at
    }

    /// Removes the entry stored under `q` and returns it.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.keys.find(q)?;
        Some(self.take_at(Locator(pos)))
    }

    fn take_at(&mut self, at: Locator) -> (K, V) {
        assert!(
            at.0 < self.keys.len(),
            "locator {} is not dereferenceable (len {})",
            at.0,
            self.keys.len()
        );
        let (key, handle) = self.keys.swap_remove(at.0);
        self.reverse.unlink(handle);
        let value = self
            .values
            .remove(handle)
            .expect("key index handle must resolve to a value");
        (key, value)
    }

    pub fn entry_at(&self, at: Locator) -> Option<(&K, &V)> {
        let (key, handle) = self.keys.get(at.0)?;
        self.values.get(handle).map(|v| (key, v))
    }

    /// First locator of a handle scan.
    pub fn handle_begin(&self) -> Locator {
        Locator(0)
    }

    /// One past the last locator of a handle scan.
    pub fn handle_end(&self) -> Locator {
        Locator(self.keys.len())
    }

    /// `(key, handle)` pairs in key-index order.
    pub fn handles(&self) -> Handles<'_, K, Tag> {
        self.keys.iter()
    }

    /// `(key, value)` pairs in key-index order.
    pub fn iter(&self) -> Iter<'_, K, V, Tag> {
        Iter {
            keys: self.keys.iter(),
            values: &self.values,
        }
    }

    /// Values in dense order.
    pub fn values(&self) -> core::slice::Iter<'_, V> {
        self.values.iter()
    }

    pub fn values_mut(&mut self) -> core::slice::IterMut<'_, V> {
        self.values.iter_mut()
    }

    /// The dense value storage.
    pub fn as_slice(&self) -> &[V] {
        self.values.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [V] {
        self.values.as_mut_slice()
    }

    pub fn handle_from_index(&self, pos: usize) -> Option<Handle<Tag>> {
        self.values.handle_from_index(pos)
    }

    pub fn index_from_handle(&self, handle: Handle<Tag>) -> Option<usize> {
        self.values.index_from_handle(handle)
    }

    /// Sorts all values. See [`sort_range_by`](Self::sort_range_by).
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(usize, usize) -> Ordering,
    {
        self.sort_range_by(.., compare);
    }

    /// Sorts the values at the dense positions in `range`; values outside
    /// it keep their positions.
    ///
    /// `compare` receives two dense positions as they were when the call
    /// started, so it can index a snapshot taken beforehand. Every key
    /// still finds its value afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn sort_range_by<R, F>(&mut self, range: R, mut compare: F)
    where
        R: RangeBounds<usize>,
        F: FnMut(usize, usize) -> Ordering,
    {
        let range = dense_range(range, self.len());
        let mut order: Vec<usize> = range.clone().collect();
        order.sort_by(|&a, &b| compare(a, b));
        self.values.permute(range.start, &order);
        log::trace!("sorted dense positions {range:?}");
    }

    /// Moves the values whose position satisfies `pred` in front of the
    /// others and returns the position of the first value that does not.
    ///
    /// `pred` is called once per position, with positions as they were
    /// before the call. Order inside each group is not part of the contract.
    pub fn partition<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(usize) -> bool,
    {
        let (mut order, rest): (Vec<usize>, Vec<usize>) =
            (0..self.len()).partition(|&pos| pred(pos));
        let boundary = order.len();
        order.extend(rest);
        self.values.permute(0, &order);
        log::trace!("partitioned {} values at {boundary}", order.len());
        boundary
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.keys.len(), self.values.len());
        if let Some(linked) = self.reverse.linked() {
            assert_eq!(linked, self.keys.len());
        }
        for (pos, (key, handle)) in self.keys.iter().enumerate() {
            assert!(self.values.contains(handle), "stale handle in key index");
            assert_eq!(self.keys.find(key), Some(pos));
        }
        for pos in 0..self.values.len() {
            let handle = self.values.handle_from_index(pos).unwrap();
            assert_eq!(self.values.index_from_handle(handle), Some(pos));
        }
    }
}

impl<K, V, Tag, S> PackedHashTable<K, V, Tag, S, ReverseIndex<K, Tag>>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn key_from_handle(&self, handle: Handle<Tag>) -> Option<&K> {
        self.reverse.get(handle)
    }

    /// Key of the value at dense position `pos`.
    pub fn key_from_index(&self, pos: usize) -> Option<&K> {
        self.reverse.get(self.values.handle_from_index(pos)?)
    }

    /// Removes the entry whose value `handle` refers to.
    pub fn remove_handle(&mut self, handle: Handle<Tag>) -> Option<(K, V)> {
        let pos = {
            let key = self.reverse.get(handle)?;
            self.keys.find(key)?
        };
        Some(self.take_at(Locator(pos)))
    }
}

fn dense_range<R: RangeBounds<usize>>(range: R, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&s) => Some(s),
        Bound::Excluded(&s) => s.checked_add(1),
        Bound::Unbounded => Some(0),
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.checked_add(1),
        Bound::Excluded(&e) => Some(e),
        Bound::Unbounded => Some(len),
    };
    match (start, end) {
        (Some(start), Some(end)) if start <= end && end <= len => start..end,
        _ => panic!(
            "range {:?}..{:?} out of bounds for {len} values",
            range.start_bound(),
            range.end_bound()
        ),
    }
}

/// Iterator over `(key, value)` pairs in key-index order.
pub struct Iter<'a, K, V, Tag> {
    keys: Handles<'a, K, Tag>,
    values: &'a HandleVec<V, Tag>,
}

impl<'a, K, V, Tag> Iterator for Iter<'a, K, V, Tag> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.keys.next().map(|(k, h)| (k, &self.values[h]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K, V, Tag> ExactSizeIterator for Iter<'_, K, V, Tag> {}

impl<K, V, Tag, S, Rev> fmt::Debug for PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
    Rev: ReverseLookup<K, Tag>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, Tag, S, Rev> Extend<(K, V)> for PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash,
    S: BuildHasher,
    Rev: ReverseLookup<K, Tag>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K, V, Tag, S, Rev> FromIterator<(K, V)> for PackedHashTable<K, V, Tag, S, Rev>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    Rev: ReverseLookup<K, Tag>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}
