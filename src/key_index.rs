//! KeyIndex: unique keys mapped to handles, addressed by position.
//!
//! Entries live in a dense vector; a `HashTable<usize>` indexes that vector
//! by the stored hash of each key. `K: Hash` runs once per insert or query
//! and never during growth, since rehashing reads the stored hash.

use crate::handle_vec::Handle;
use crate::reentrancy::ProbeGuard;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;

struct Bucket<K, Tag> {
    hash: u64,
    key: K,
    handle: Handle<Tag>,
}

pub(crate) struct KeyIndex<K, Tag, S> {
    hasher: S,
    table: HashTable<usize>,
    entries: Vec<Bucket<K, Tag>>,
    probing: ProbeGuard,
}

impl<K, Tag, S> KeyIndex<K, Tag, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            table: HashTable::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            probing: ProbeGuard::new(),
        }
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        let _g = self.probing.enter();
        self.hasher.hash_one(q)
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_hashed(hash, q)
    }

    pub(crate) fn find_hashed<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let _g = self.probing.enter();
        self.table
            .find(hash, |&pos| {
                let e = &self.entries[pos];
                e.hash == hash && e.key.borrow() == q
            })
            .copied()
    }

    /// Appends an entry for a key known to be absent; returns its position.
    pub(crate) fn insert_unique(&mut self, hash: u64, key: K, handle: Handle<Tag>) -> usize {
        let pos = self.entries.len();
        self.entries.push(Bucket { hash, key, handle });
        let entries = &self.entries;
        self.table.insert_unique(hash, pos, |&p| entries[p].hash);
        pos
    }

    /// Removes the entry at `pos`; the last entry moves into `pos`.
    pub(crate) fn swap_remove(&mut self, pos: usize) -> (K, Handle<Tag>) {
        let hash = self.entries[pos].hash;
        let _ = self
            .table
            .find_entry(hash, |&p| p == pos)
            .map(|slot| slot.remove());

        let last = self.entries.len() - 1;
        if pos != last {
            let moved_hash = self.entries[last].hash;
            if let Some(p) = self.table.find_mut(moved_hash, |&p| p == last) {
                *p = pos;
            }
        }

        let bucket = self.entries.swap_remove(pos);
        debug_assert_eq!(self.table.len(), self.entries.len());
        (bucket.key, bucket.handle)
    }

    pub(crate) fn get(&self, pos: usize) -> Option<(&K, Handle<Tag>)> {
        self.entries.get(pos).map(|e| (&e.key, e.handle))
    }

    pub(crate) fn handle(&self, pos: usize) -> Option<Handle<Tag>> {
        self.entries.get(pos).map(|e| e.handle)
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        let entries = &self.entries;
        self.table.reserve(additional, |&p| entries[p].hash);
        self.entries.reserve(additional);
    }

    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.entries.clear();
    }

    pub(crate) fn iter(&self) -> Handles<'_, K, Tag> {
        Handles {
            it: self.entries.iter(),
        }
    }
}

/// Iterator over `(key, handle)` pairs in key-index order.
pub struct Handles<'a, K, Tag> {
    it: core::slice::Iter<'a, Bucket<K, Tag>>,
}

impl<'a, K, Tag> Iterator for Handles<'a, K, Tag> {
    type Item = (&'a K, Handle<Tag>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|e| (&e.key, e.handle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, Tag> ExactSizeIterator for Handles<'_, K, Tag> {}
