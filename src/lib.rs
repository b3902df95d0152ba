//! packed-hashtable: a single-threaded hashtable whose values live in one
//! densely packed array, addressable by key or by generational handle.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: iterate values as a plain slice while keeping O(1) average
//!   keyed lookup, insertion and removal.
//! - Layers:
//!   - HandleVec<T, Tag>: dense value array with generational handles;
//!     removal swap-compacts, `permute` reorders a range and repoints the
//!     handle slots of moved values.
//!   - KeyIndex<K, Tag, S>: unique keys → handles, entries addressed by
//!     position (`Locator`) so that scans can remove as they go.
//!   - ReverseIndex<K, Tag>: optional handle → key map, mutated only
//!     together with the key index.
//!   - PackedHashTable<K, V, Tag, S, Rev>: public API composing the above;
//!     `PackedHashTableRl` selects the reverse index.
//!
//! Constraints
//! - Single-threaded: no locking, no interior sharing across threads.
//! - Keys are unique; `add` keeps the existing value, `add_or_update`
//!   overwrites it, `insert` reports `InsertError::DuplicateKey`.
//! - Dense order is neither insertion nor key order. It only changes on
//!   removal (swap-remove), `sort_*` and `partition`.
//! - Handles survive `sort_*` and `partition`: values move, handle slots
//!   follow them, and neither index needs rewriting.
//!
//! Failure model
//! - Absent keys, stale handles and out-of-range positions surface as
//!   `None`/`false`.
//! - Dereferencing a locator that designates no entry, or an out-of-range
//!   sort range, panics.
//! - Every insertion reserves room in all structures before touching any
//!   of them, so a mutation is applied to all indices or to none.
//!
//! Hashing
//! - Each key-index entry stores its `u64` hash; growth never calls
//!   `K: Hash`. A debug-only guard panics if `K: Eq`/`K: Hash` reenters the
//!   key index during a probe.
//!
//! Bulk removal
//! - `remove_when` scans dense values and maps hits back to keys through
//!   the reverse index when there is one; otherwise it scans the key index
//!   and looks up each value through its handle.

pub mod handle_vec;
mod key_index;
mod packed_hash_table;
mod packed_hash_table_proptest;
mod reentrancy;
pub mod remove_when;
pub mod reverse_index;

// Public surface
pub use handle_vec::{DefaultTag, Handle, HandleVec};
pub use key_index::Handles;
pub use packed_hash_table::{InsertError, Iter, Locator, PackedHashTable, PackedHashTableRl};
pub use remove_when::{remove_when, RemoveWhen};
pub use reverse_index::{NoReverse, ReverseIndex, ReverseLookup};
