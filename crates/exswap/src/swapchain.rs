//! Three-slot hand-off between one producer and one consumer.
//!
//! Each side holds at most one slot at a time, and at most one completed frame
//! waits between them. With exactly three slots that leaves the producer a
//! `Free` slot on every acquisition, so neither side ever waits for the other.
//! A commit that lands while an older frame is still `Ready` drops the older
//! frame: the consumer only ever sees the newest one.
//!
//! All slot transitions happen under one mutex guarding a small state table.
//! The handle of the slot being read is moved out to the consumer, so import
//! work runs without holding the lock.

use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::handle::ExHandle;

pub const SLOT_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Available to the producer.
    Free,
    /// Owned by the producer, frame in progress.
    Writing,
    /// Holds the newest completed frame.
    Ready,
    /// Owned by the consumer.
    Reading,
}

/// Producer's claim on a slot, returned by [`TripleSwapchain::acquire_write`].
#[derive(Debug)]
#[must_use = "a write slot must be committed or abandoned"]
pub struct WriteSlot {
    index: usize,
}

impl WriteSlot {
    /// Index of the producer-side buffer to render into.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Consumer's claim on the newest frame, returned by
/// [`TripleSwapchain::acquire_read`].
#[derive(Debug)]
#[must_use = "a read slot must be released"]
pub struct ReadSlot {
    index: usize,
    handle: ExHandle,
}

impl ReadSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handle(&self) -> &ExHandle {
        &self.handle
    }

    /// Mutable access for the importer, which consumes the descriptor.
    pub fn handle_mut(&mut self) -> &mut ExHandle {
        &mut self.handle
    }
}

/// Frame counters since the swapchain was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainStats {
    pub committed: u64,
    /// Frames replaced by a newer commit before the consumer read them.
    pub superseded: u64,
    pub consumed: u64,
    pub abandoned: u64,
}

struct SlotTable {
    states: [SlotState; SLOT_COUNT],
    handles: [ExHandle; SLOT_COUNT],
    stats: SwapchainStats,
}

impl SlotTable {
    fn find(&self, state: SlotState) -> Option<usize> {
        self.states.iter().position(|&current| current == state)
    }
}

pub struct TripleSwapchain {
    table: Mutex<SlotTable>,
}

impl TripleSwapchain {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(SlotTable {
                states: [SlotState::Free; SLOT_COUNT],
                handles: std::array::from_fn(|index| ExHandle::empty(index as i32)),
                stats: SwapchainStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotTable> {
        // Slot transitions never leave the table half-updated, so a poisoned
        // lock still guards a consistent table.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims a `Free` slot for the producer. Never blocks.
    ///
    /// # Panics
    /// If the producer already holds a slot in `Writing`.
    pub fn acquire_write(&self) -> WriteSlot {
        let mut table = self.lock();
        assert!(
            table.find(SlotState::Writing).is_none(),
            "swapchain producer already holds a slot"
        );
        let Some(index) = table.find(SlotState::Free) else {
            unreachable!("one Ready and one Reading slot always leave a third slot free");
        };
        table.states[index] = SlotState::Writing;
        WriteSlot { index }
    }

    /// Publishes `handle` as the newest frame.
    ///
    /// A frame still waiting in `Ready` is dropped and its slot returns to
    /// `Free`; its descriptor is closed if it was never imported.
    pub fn commit_write(&self, slot: WriteSlot, handle: ExHandle) {
        let (replaced, superseded) = {
            let mut table = self.lock();
            assert_eq!(
                table.states[slot.index],
                SlotState::Writing,
                "committed slot {} is not being written",
                slot.index
            );
            let superseded = table.find(SlotState::Ready).map(|stale| {
                table.states[stale] = SlotState::Free;
                table.stats.superseded += 1;
                mem::take(&mut table.handles[stale])
            });
            let replaced = mem::replace(&mut table.handles[slot.index], handle);
            table.states[slot.index] = SlotState::Ready;
            table.stats.committed += 1;
            (replaced, superseded)
        };

        if let Some(stale) = &superseded {
            tracing::trace!(frame = stale.id(), "dropping superseded frame");
        }
        // Descriptors are closed outside the lock.
        drop(replaced);
        drop(superseded);
    }

    /// Returns a write slot without publishing anything.
    pub fn abandon_write(&self, slot: WriteSlot) {
        let mut table = self.lock();
        assert_eq!(
            table.states[slot.index],
            SlotState::Writing,
            "abandoned slot {} is not being written",
            slot.index
        );
        table.states[slot.index] = SlotState::Free;
        table.stats.abandoned += 1;
    }

    /// Claims the newest completed frame, or `None` when nothing new was
    /// committed since the previous read. Never blocks.
    ///
    /// # Panics
    /// If the consumer already holds a slot in `Reading`.
    pub fn acquire_read(&self) -> Option<ReadSlot> {
        let mut table = self.lock();
        assert!(
            table.find(SlotState::Reading).is_none(),
            "swapchain consumer already holds a slot"
        );
        let index = table.find(SlotState::Ready)?;
        table.states[index] = SlotState::Reading;
        let handle = mem::take(&mut table.handles[index]);
        Some(ReadSlot { index, handle })
    }

    /// Hands a read slot back to the producer.
    pub fn release_read(&self, slot: ReadSlot) {
        let ReadSlot { index, handle } = slot;
        {
            let mut table = self.lock();
            assert_eq!(
                table.states[index],
                SlotState::Reading,
                "released slot {index} is not being read"
            );
            table.states[index] = SlotState::Free;
            table.stats.consumed += 1;
        }
        drop(handle);
    }

    pub fn states(&self) -> [SlotState; SLOT_COUNT] {
        self.lock().states
    }

    pub fn stats(&self) -> SwapchainStats {
        self.lock().stats
    }
}

impl Default for TripleSwapchain {
    fn default() -> Self {
        Self::new()
    }
}
