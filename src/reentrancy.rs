//! Debug-only probe guard.
//!
//! The key index calls user code (`K: Eq`, `K: Hash`) while it probes its
//! table. A probe that reaches back into the same index would observe it
//! mid-operation, so in debug builds the guard panics on nested entry. In
//! release builds it is a zero-sized no-op.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct ProbeGuard {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // Cell already makes this !Sync; keep release builds in line.
    _unsync: PhantomData<Cell<()>>,
}

impl ProbeGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _unsync: PhantomData,
        }
    }

    /// Marks the index busy until the returned token is dropped.
    #[inline]
    pub(crate) fn enter(&self) -> Probing<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "key index re-entered from Eq/Hash while probing"
            );
            Probing { guard: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Probing { _guard: PhantomData }
        }
    }
}

pub(crate) struct Probing<'a> {
    #[cfg(debug_assertions)]
    guard: &'a ProbeGuard,
    #[cfg(not(debug_assertions))]
    _guard: PhantomData<&'a ProbeGuard>,
}

impl Drop for Probing<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.guard.busy.set(false);
    }
}
