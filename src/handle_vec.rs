//! HandleVec: densely packed values addressed through generational handles.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use slotmap::{DefaultKey, Key, SlotMap};

/// Tag used by containers that do not name their own.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DefaultTag;

/// Generational reference to a value in a [`HandleVec`].
///
/// The `Tag` parameter only exists at the type level: handles minted by
/// stores with different tags cannot be mixed up, even though they share
/// a representation. A handle goes stale once its value is removed, and a
/// stale handle never resolves again, even if the slot is reused.
pub struct Handle<Tag = DefaultTag> {
    key: DefaultKey,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> Handle<Tag> {
    pub(crate) fn new(key: DefaultKey) -> Self {
        Handle {
            key,
            _tag: PhantomData,
        }
    }

    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.key
    }

    /// Slot index of the handle.
    pub fn id(&self) -> u32 {
        self.key.data().as_ffi() as u32
    }

    /// Generation the slot had when this handle was minted.
    pub fn generation(&self) -> u32 {
        (self.key.data().as_ffi() >> 32) as u32
    }
}

impl<Tag> Clone for Handle<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Handle<Tag> {}

impl<Tag> PartialEq for Handle<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<Tag> Eq for Handle<Tag> {}

impl<Tag> Hash for Handle<Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<Tag> fmt::Debug for Handle<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Growable array of values kept contiguous under removal.
///
/// `slots` maps each live handle to its dense position and `handles` is the
/// inverse mapping, position to handle. Removal swaps the last value into
/// the hole and repoints the moved value's slot.
pub struct HandleVec<T, Tag = DefaultTag> {
    slots: SlotMap<DefaultKey, usize>,
    handles: Vec<DefaultKey>,
    values: Vec<T>,
    _tag: PhantomData<fn() -> Tag>,
}

impl<T, Tag> HandleVec<T, Tag> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            _tag: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values the dense storage holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.handles.reserve(additional);
        self.values.reserve(additional);
    }

    /// Appends `value` at the end of the dense storage.
    pub fn add(&mut self, value: T) -> Handle<Tag> {
        let pos = self.values.len();
        let k = self.slots.insert(pos);
        self.handles.push(k);
        self.values.push(value);
        Handle::new(k)
    }

    pub fn add_default(&mut self) -> Handle<Tag>
    where
        T: Default,
    {
        self.add(T::default())
    }

    pub fn contains(&self, handle: Handle<Tag>) -> bool {
        self.slots.contains_key(handle.raw_handle())
    }

    pub fn get(&self, handle: Handle<Tag>) -> Option<&T> {
        let &pos = self.slots.get(handle.raw_handle())?;
        self.values.get(pos)
    }

    pub fn get_mut(&mut self, handle: Handle<Tag>) -> Option<&mut T> {
        let &pos = self.slots.get(handle.raw_handle())?;
        self.values.get_mut(pos)
    }

    /// Removes the value behind `handle`, invalidating the handle.
    ///
    /// The last value in dense order takes the vacated position.
    pub fn remove(&mut self, handle: Handle<Tag>) -> Option<T> {
        let pos = self.slots.remove(handle.raw_handle())?;
        let value = self.values.swap_remove(pos);
        let _ = self.handles.swap_remove(pos);

        // Something took our place: repoint its slot.
        if let Some(&moved) = self.handles.get(pos) {
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = pos;
            }
        }
        Some(value)
    }

    /// Removes all values. Every handle handed out so far goes stale.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.values.clear();
    }

    pub fn handle_from_index(&self, pos: usize) -> Option<Handle<Tag>> {
        self.handles.get(pos).map(|&k| Handle::new(k))
    }

    pub fn index_from_handle(&self, handle: Handle<Tag>) -> Option<usize> {
        self.slots.get(handle.raw_handle()).copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.values.iter_mut()
    }

    /// Reorders `start..start + order.len()` so that position `start + i`
    /// holds the value previously at position `order[i]`.
    ///
    /// Handles follow their values. Panics unless `order` is a permutation
    /// of the range.
    pub fn permute(&mut self, start: usize, order: &[usize]) {
        let n = order.len();
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.values.len())
            .expect("permutation range out of bounds");

        let mut seen = vec![false; n];
        for &from in order {
            assert!(
                (start..end).contains(&from) && !core::mem::replace(&mut seen[from - start], true),
                "order is not a permutation of {start}..{end}"
            );
        }

        // Follow each cycle once, swapping the wanted value into place.
        let mut done = vec![false; n];
        for first in 0..n {
            let mut at = first;
            while !done[at] {
                done[at] = true;
                let from = order[at] - start;
                if from == first {
                    break;
                }
                self.values.swap(start + at, start + from);
                self.handles.swap(start + at, start + from);
                at = from;
            }
        }

        for pos in start..end {
            if let Some(slot) = self.slots.get_mut(self.handles[pos]) {
                *slot = pos;
            }
        }
    }
}

impl<T, Tag> Default for HandleVec<T, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Tag> Index<Handle<Tag>> for HandleVec<T, Tag> {
    type Output = T;

    fn index(&self, handle: Handle<Tag>) -> &T {
        self.get(handle).expect("stale handle")
    }
}

impl<T, Tag> IndexMut<Handle<Tag>> for HandleVec<T, Tag> {
    fn index_mut(&mut self, handle: Handle<Tag>) -> &mut T {
        self.get_mut(handle).expect("stale handle")
    }
}

impl<T: fmt::Debug, Tag> fmt::Debug for HandleVec<T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}
