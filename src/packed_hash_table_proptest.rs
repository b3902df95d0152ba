#![cfg(test)]

// Property tests for PackedHashTable kept inside the crate so every step
// can also check the internal cross-index consistency.

use crate::handle_vec::{DefaultTag, Handle};
use crate::packed_hash_table::{PackedHashTable, PackedHashTableRl};
use crate::remove_when::RemoveWhen;
use crate::reverse_index::ReverseLookup;
use proptest::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    AddOrUpdate(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Sort,
    SortRange(usize, usize),
    Partition(i32),
    RemoveWhen(i32),
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let value = -50i32..50;
        let op = prop_oneof![
            4 => (idx.clone(), value.clone()).prop_map(|(i, v)| OpI::Add(i, v)),
            2 => (idx.clone(), value.clone()).prop_map(|(i, v)| OpI::AddOrUpdate(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => (idx.clone(), -10i32..10).prop_map(|(i, d)| OpI::Mutate(i, d)),
            2 => prop_oneof![
                Just(OpI::Sort),
                (0usize..16, 0usize..16).prop_map(|(a, b)| OpI::SortRange(a, b)),
            ],
            1 => value.clone().prop_map(OpI::Partition),
            1 => value.prop_map(OpI::RemoveWhen),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

type Table<S, Rev> = PackedHashTable<Key, i32, DefaultTag, S, Rev>;

// State-machine equivalence against std::collections::HashMap. After every
// op: indices agree with each other, stale handles stay stale, every model
// key resolves by key and by its tracked handle, and the dense values are
// the model's values as a multiset.
fn run<S, Rev, C>(
    sut: &mut Table<S, Rev>,
    pool: &[String],
    ops: Vec<OpI>,
    check: C,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    Rev: ReverseLookup<Key, DefaultTag>,
    Table<S, Rev>: RemoveWhen<i32>,
    C: Fn(&Table<S, Rev>) -> Result<(), TestCaseError>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Add(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let before = sut.len();
                let (at, inserted) = sut.add(k.clone(), v);
                prop_assert_eq!(inserted, !already, "add inserts only new keys");
                prop_assert_eq!(at.key(sut), Some(&k));
                if inserted {
                    prop_assert_eq!(sut.len(), before + 1);
                    live.insert(k.clone(), at.handle(sut).unwrap());
                    model.insert(k.clone(), v);
                }
                prop_assert_eq!(at.value(sut), model.get(&k), "first value wins");
            }
            OpI::AddOrUpdate(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let tracked = live.get(&k).copied();
                let (at, inserted) = sut.add_or_update(k.clone(), v);
                prop_assert_eq!(inserted, !already);
                if inserted {
                    live.insert(k.clone(), at.handle(sut).unwrap());
                } else {
                    prop_assert_eq!(at.handle(sut), tracked, "update keeps the handle");
                }
                model.insert(k, v);
                prop_assert_eq!(at.value(sut), Some(&v));
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                match sut.remove_entry(&k) {
                    Some((kk, vv)) => {
                        prop_assert!(kk == k);
                        let mv = model.remove(&k).expect("present in model");
                        prop_assert_eq!(vv, mv);
                        stale.push(live.remove(&k).expect("tracked live handle"));
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                }
            }
            OpI::Find(i) => {
                let k = key_from(pool, i);
                let found = sut.find(&k);
                prop_assert_eq!(found.is_some(), model.contains_key(&k));
                if let Some(at) = found {
                    prop_assert_eq!(at.handle(sut), live.get(&k).copied());
                    prop_assert_eq!(at.value(sut), model.get(&k));
                }
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(&h) = live.get(&k) {
                    sut.call_handle_mut(h, |v| *v = v.wrapping_add(d));
                    if let Some(mv) = model.get_mut(&k) {
                        *mv = mv.wrapping_add(d);
                    }
                } else {
                    let mut called = false;
                    sut.call_mut(&k, |_| called = true);
                    prop_assert!(!called, "absent key must not call");
                }
            }
            OpI::Sort => {
                let snapshot: Vec<i32> = sut.values().copied().collect();
                sut.sort_by(|l, r| snapshot[l].cmp(&snapshot[r]));
                let dense: Vec<i32> = sut.values().copied().collect();
                let mut want = snapshot;
                want.sort();
                prop_assert_eq!(dense, want);
            }
            OpI::SortRange(a, b) => {
                let len = sut.len();
                let (a, b) = (a % (len + 1), b % (len + 1));
                let (lo, hi) = (a.min(b), a.max(b));
                let snapshot: Vec<i32> = sut.values().copied().collect();
                sut.sort_range_by(lo..hi, |l, r| snapshot[l].cmp(&snapshot[r]));
                let dense: Vec<i32> = sut.values().copied().collect();
                let mut mid = snapshot[lo..hi].to_vec();
                mid.sort();
                prop_assert_eq!(&dense[..lo], &snapshot[..lo]);
                prop_assert_eq!(&dense[lo..hi], &mid[..]);
                prop_assert_eq!(&dense[hi..], &snapshot[hi..]);
            }
            OpI::Partition(m) => {
                let snapshot: Vec<i32> = sut.values().copied().collect();
                let boundary = sut.partition(|pos| snapshot[pos] < m);
                let want = snapshot.iter().filter(|&&v| v < m).count();
                prop_assert_eq!(boundary, want);
                for (pos, v) in sut.values().enumerate() {
                    prop_assert_eq!(*v < m, pos < boundary);
                }
            }
            OpI::RemoveWhen(m) => {
                let want = model.values().filter(|&&v| v < m).count();
                let removed = sut.remove_when(|&v| v < m);
                prop_assert_eq!(removed, want);
                model.retain(|k, v| {
                    if *v < m {
                        stale.extend(live.remove(k));
                        false
                    } else {
                        true
                    }
                });
            }
            OpI::Clear => {
                sut.clear();
                stale.extend(live.drain().map(|(_, h)| h));
                model.clear();
            }
        }

        sut.assert_consistent();
        for &h in &stale {
            prop_assert!(sut.get_by_handle(h).is_none(), "stale handle resolved");
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
            prop_assert_eq!(sut.get_by_handle(live[k]), Some(v));
        }
        let mut dense: Vec<i32> = sut.values().copied().collect();
        let mut values: Vec<i32> = model.values().copied().collect();
        dense.sort();
        values.sort();
        prop_assert_eq!(dense, values);
        check(sut)?;
    }
    Ok(())
}

// The reverse index maps every dense position back to the key whose value
// sits there.
fn check_reverse<S: BuildHasher>(
    sut: &PackedHashTableRl<Key, i32, DefaultTag, S>,
) -> Result<(), TestCaseError> {
    for (pos, v) in sut.values().enumerate() {
        let key = sut.key_from_index(pos);
        prop_assert!(key.is_some(), "dense position without key");
        let key = key.unwrap();
        prop_assert_eq!(sut.get(key), Some(v));
        let h = sut.handle_from_index(pos).unwrap();
        prop_assert_eq!(sut.key_from_handle(h), Some(key));
    }
    Ok(())
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine_plain((pool, ops) in arb_scenario()) {
        let mut sut: PackedHashTable<Key, i32> = PackedHashTable::new();
        run(&mut sut, &pool, ops, |_| Ok(()))?;
    }

    #[test]
    fn prop_state_machine_reverse_lookup((pool, ops) in arb_scenario()) {
        let mut sut: PackedHashTableRl<Key, i32> = PackedHashTable::new();
        run(&mut sut, &pool, ops, check_reverse)?;
    }

    // Same invariants under worst-case collisions.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let mut plain: PackedHashTable<Key, i32, DefaultTag, ConstBuildHasher> =
            PackedHashTable::with_hasher(ConstBuildHasher);
        run(&mut plain, &pool, ops.clone(), |_| Ok(()))?;

        let mut rl: PackedHashTableRl<Key, i32, DefaultTag, ConstBuildHasher> =
            PackedHashTable::with_hasher(ConstBuildHasher);
        run(&mut rl, &pool, ops, check_reverse)?;
    }
}
