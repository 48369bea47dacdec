//! Reusable visited-set for graph traversal.
//!
//! Epoch-stamped marks make clearing O(1): `acquire` bumps the epoch instead
//! of zeroing the array, and a thread-local slot recycles the allocation
//! between searches.

use std::cell::RefCell;

thread_local! {
    static SCRATCH: RefCell<Option<Epochs>> = const { RefCell::new(None) };
}

struct Epochs {
    marks: Vec<u32>,
    epoch: u32,
}

impl Epochs {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            marks: vec![0; capacity.max(64)],
            epoch: 1,
        }
    }

    #[inline]
    fn grow_for(&mut self, slot: usize) {
        if slot >= self.marks.len() {
            let len = slot
                .saturating_add(1)
                .checked_next_power_of_two()
                .unwrap_or(slot.saturating_add(1))
                .max(64);
            self.marks.resize(len, 0);
        }
    }

    #[inline]
    fn advance(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // u32 wrap: stale marks could alias the new epoch, so start over.
            self.marks.fill(0);
            self.epoch = 1;
        }
    }
}

/// A cleared visited-set borrowed from the thread-local slot; returned to it
/// on drop.
pub struct VisitedSet {
    inner: Epochs,
}

impl VisitedSet {
    pub fn acquire(capacity: usize) -> Self {
        let mut inner = SCRATCH
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| Epochs::with_capacity(capacity));
        inner.advance();
        inner.grow_for(capacity.saturating_sub(1));
        Self { inner }
    }

    #[inline]
    pub fn visit(&mut self, id: u64) {
        let slot = id as usize;
        self.inner.grow_for(slot);
        self.inner.marks[slot] = self.inner.epoch;
    }

    #[inline]
    pub fn is_visited(&self, id: u64) -> bool {
        let slot = id as usize;
        slot < self.inner.marks.len() && self.inner.marks[slot] == self.inner.epoch
    }
}

impl Drop for VisitedSet {
    fn drop(&mut self) {
        let inner = std::mem::replace(
            &mut self.inner,
            Epochs {
                marks: Vec::new(),
                epoch: 1,
            },
        );
        SCRATCH.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                *slot = Some(inner);
            }
        });
    }
}
