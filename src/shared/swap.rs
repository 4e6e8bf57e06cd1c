// This is free and unencumbered software released into the public domain.

//! Double-buffered preview handoff.
//!
//! The producer borrows one buffer at a time as a [`WriteTarget`], fills it
//! outside any lock, and hands it back through
//! [`PreviewBufferSwap::on_frame_written`], receiving the other buffer in
//! exchange. A consumer reads the most recently completed buffer through a
//! [`PreviewFrame`] guard, which keeps the producer from handing back a frame
//! until the guard is dropped.

use super::CameraError;
use crate::{log_debug, log_trace};
use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use derive_more::Display;
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Slot {
    #[display("A")]
    A,
    #[display("B")]
    B,
}

impl Slot {
    #[inline]
    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    fn encode(slot: Option<Slot>) -> u8 {
        match slot {
            None => 0,
            Some(Slot::A) => 1,
            Some(Slot::B) => 2,
        }
    }

    fn decode(value: u8) -> Option<Slot> {
        match value {
            1 => Some(Slot::A),
            2 => Some(Slot::B),
            _ => None,
        }
    }

    #[inline]
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// A buffer lent to the producer for exactly one fill.
///
/// Dropping it instead of handing it back leaves its slot empty until the
/// next reallocation or [`PreviewBufferSwap::reset`].
pub struct WriteTarget {
    slot: Slot,
    generation: u64,
    buf: Vec<u8>,
}

impl WriteTarget {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTarget")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .field("len", &self.buf.len())
            .finish()
    }
}

impl Deref for WriteTarget {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for WriteTarget {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

#[derive(Default)]
struct Buffers {
    /// `None` while lent to the producer, or before the first allocation.
    slots: [Option<Vec<u8>>; 2],
    capacity: usize,
    /// Bumped on every allocation; zero means nothing was allocated yet.
    generation: u64,
    active: Option<Slot>,
}

impl Buffers {
    fn write_slot(&self) -> Slot {
        self.active.map_or(Slot::A, Slot::other)
    }

    fn lend(&mut self, slot: Slot) -> Option<WriteTarget> {
        let buf = self.slots[slot.index()].take()?;
        Some(WriteTarget {
            slot,
            generation: self.generation,
            buf,
        })
    }
}

#[derive(Default)]
pub struct PreviewBufferSwap {
    buffers: Mutex<Buffers>,
    /// Mirror of `Buffers::active`, written under the lock, read without it.
    ready: AtomicU8,
    fetch_each_frame: AtomicBool,
}

impl fmt::Debug for PreviewBufferSwap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PreviewBufferSwap");
        match self.buffers.try_lock() {
            Ok(state) => s
                .field("capacity", &state.capacity)
                .field("generation", &state.generation)
                .field("active", &state.active),
            Err(_) => s.field("buffers", &"<locked>"),
        };
        s.field("fetch_each_frame", &self.is_fetching_each_frame())
            .finish()
    }
}

impl PreviewBufferSwap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_active(&self, state: &mut Buffers, active: Option<Slot>) {
        state.active = active;
        self.ready.store(Slot::encode(active), Ordering::Release);
    }

    /// Makes sure both buffers hold at least `required_capacity` bytes.
    ///
    /// Returns `true` if the pair was reallocated. Reallocation invalidates
    /// every [`WriteTarget`] lent out earlier and forgets the ready frame.
    pub fn prepare(&self, required_capacity: usize) -> Result<bool, CameraError> {
        if required_capacity == 0 {
            return Err(CameraError::invalid_config("preview buffer capacity is zero"));
        }

        let mut state = self.lock();
        if state.generation > 0 && state.capacity >= required_capacity {
            return Ok(false);
        }

        state.slots = [
            Some(vec![0; required_capacity]),
            Some(vec![0; required_capacity]),
        ];
        state.capacity = required_capacity;
        state.generation += 1;
        self.mark_active(&mut state, None);

        log_debug!(
            target: "asimov_camera_bridge",
            capacity = required_capacity,
            generation = state.generation,
            "allocated preview buffers"
        );
        Ok(true)
    }

    /// Replaces both buffers at the current capacity, reclaiming any
    /// [`WriteTarget`] still out with the producer.
    pub fn reset(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        if state.generation == 0 {
            return Err(CameraError::NotPrepared);
        }

        let capacity = state.capacity;
        state.slots = [Some(vec![0; capacity]), Some(vec![0; capacity])];
        state.generation += 1;
        self.mark_active(&mut state, None);

        log_debug!(
            target: "asimov_camera_bridge",
            capacity,
            generation = state.generation,
            "reset preview buffers"
        );
        Ok(())
    }

    /// Not synchronized with frame delivery; a toggle may take effect one
    /// frame late.
    pub fn set_fetch_each_frame(&self, enabled: bool) {
        self.fetch_each_frame.store(enabled, Ordering::Relaxed);
    }

    pub fn is_fetching_each_frame(&self) -> bool {
        self.fetch_each_frame.load(Ordering::Relaxed)
    }

    /// Lends the buffer that is not holding the ready frame.
    ///
    /// Returns `None` before [`prepare`](Self::prepare) or while that buffer
    /// is already lent.
    pub fn next_write_target(&self) -> Option<WriteTarget> {
        let mut state = self.lock();
        let slot = state.write_slot();
        state.lend(slot)
    }

    /// Takes back a filled buffer, marks it ready, and lends the other one.
    ///
    /// With fetch-each-frame enabled, `forward` sees the written bytes
    /// before the ready marker moves. Blocks while a [`PreviewFrame`] is
    /// held.
    pub fn on_frame_written<F>(&self, target: WriteTarget, forward: F) -> Option<WriteTarget>
    where
        F: FnOnce(&[u8]),
    {
        let mut state = self.lock();

        if self.is_fetching_each_frame() {
            forward(&target.buf);
        }

        let slot = target.slot;
        if target.generation == state.generation && state.slots[slot.index()].is_none() {
            state.slots[slot.index()] = Some(target.buf);
            self.mark_active(&mut state, Some(slot));
            log_trace!(target: "asimov_camera_bridge", %slot, "preview frame ready");
        } else {
            log_debug!(
                target: "asimov_camera_bridge",
                %slot,
                stale_generation = target.generation,
                generation = state.generation,
                "discarding stale preview buffer"
            );
            self.mark_active(&mut state, None);
        }

        let next = state.write_slot();
        state.lend(next)
    }

    /// Locks the buffers and returns the ready frame, marking it consumed.
    ///
    /// Returns `None` (and releases the lock) if no frame arrived since the
    /// last take.
    pub fn lock_and_take(&self) -> Option<PreviewFrame<'_>> {
        let mut state = self.lock();
        let slot = state.active?;
        self.mark_active(&mut state, None);
        if state.slots[slot.index()].is_none() {
            return None;
        }
        Some(PreviewFrame { state, slot })
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// The slot holding an unconsumed frame. Does not take the lock, so it
    /// is safe to call from inside the fetch-each-frame callback.
    pub fn active_slot(&self) -> Option<Slot> {
        Slot::decode(self.ready.load(Ordering::Acquire))
    }
}

/// The most recent preview frame, readable while the buffers stay locked.
pub struct PreviewFrame<'a> {
    state: MutexGuard<'a, Buffers>,
    slot: Slot,
}

impl PreviewFrame<'_> {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Releases the lock. Same as dropping the guard.
    pub fn unlock(self) {}
}

impl Deref for PreviewFrame<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.state.slots[self.slot.index()].as_deref().unwrap_or(&[])
    }
}

impl fmt::Debug for PreviewFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewFrame")
            .field("slot", &self.slot)
            .field("len", &self.len())
            .finish()
    }
}
