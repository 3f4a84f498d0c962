//! A growable buffer handing out contiguous element ranges.
//!
//! [`ContinuousBuffer`] keeps all of its data in one `Vec<T>`, so the whole
//! buffer can be uploaded in a single call. Ranges ("slots") are handed out
//! first-fit and identified by a [`Handle`]; released ranges are merged with
//! free neighbours so the buffer does not fragment into unusable pieces.
//!
//! The slot records tile the buffer: every element belongs to exactly one
//! free or occupied slot, and no two free slots are adjacent. Slot records
//! that disappear in a merge are retired onto a recycling stack and reused
//! for the next slot that has to be created.

use std::fmt;

use tracing::{debug, trace};

use crate::error::{BufferError, BufferResult};

/// Opaque reference to one allocation of a [`ContinuousBuffer`].
///
/// Stable from `allocate` until `deallocate`. After that the value may be
/// handed out again for an unrelated allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Rebuild a handle from its raw value (see [`raw`](Handle::raw)).
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw value, for packing into larger identifiers.
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Occupied,
    /// Merged into a neighbour; waiting on the recycling stack.
    Retired,
}

#[derive(Clone, Copy, Debug)]
struct SlotRecord {
    state: SlotState,
    offset: usize,
    size: usize,
}

impl SlotRecord {
    fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Growable array of `T` with first-fit range allocation.
///
/// Not synchronised. Callers sharing a buffer between threads must lock
/// around it. Offsets stay valid across growth; references into
/// [`data`](ContinuousBuffer::data) obviously do not.
#[derive(Debug)]
pub struct ContinuousBuffer<T> {
    buffer: Vec<T>,
    slots: Vec<SlotRecord>,
    recycled: Vec<u32>,
}

impl<T: Clone + Default> ContinuousBuffer<T> {
    /// Initial element count used by [`Default`].
    pub const DEFAULT_INITIAL_SIZE: usize = 65536;

    /// Smallest initial element count.
    const MIN_INITIAL_SIZE: usize = 16;

    /// Create a buffer holding `initial_size` default elements in one free
    /// slot. Zero is bumped to a small minimum.
    pub fn new(initial_size: usize) -> Self {
        let capacity = if initial_size == 0 {
            Self::MIN_INITIAL_SIZE
        } else {
            initial_size
        };

        Self {
            buffer: vec![T::default(); capacity],
            slots: vec![SlotRecord {
                state: SlotState::Free,
                offset: 0,
                size: capacity,
            }],
            recycled: Vec::new(),
        }
    }

    /// Reserve `size` contiguous elements.
    ///
    /// Takes the first free slot (in slot order) that is large enough and
    /// splits off the unused rest. If no slot fits, the buffer grows by its
    /// current capacity or by `size`, whichever is larger.
    pub fn allocate(&mut self, size: usize) -> BufferResult<Handle> {
        if size == 0 {
            return Err(BufferError::ZeroSize);
        }

        let index = match self
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Free && slot.size >= size)
        {
            Some(index) => index,
            None => self.grow(size)?,
        };

        self.occupy(index, size)?;
        Ok(Handle(index as u32))
    }

    /// Element count of an allocation.
    pub fn size(&self, handle: Handle) -> BufferResult<usize> {
        Ok(self.occupied(handle)?.size)
    }

    /// Index of the first element of an allocation.
    pub fn offset(&self, handle: Handle) -> BufferResult<usize> {
        Ok(self.occupied(handle)?.offset)
    }

    /// Overwrite an allocation. `elements` must match its size exactly.
    pub fn set_data(&mut self, handle: Handle, elements: &[T]) -> BufferResult<()> {
        let slot = *self.occupied(handle)?;
        if elements.len() != slot.size {
            return Err(BufferError::SizeMismatch {
                expected: slot.size,
                actual: elements.len(),
            });
        }
        self.buffer[slot.offset..slot.end()].clone_from_slice(elements);
        Ok(())
    }

    /// The elements of an allocation.
    pub fn slice(&self, handle: Handle) -> BufferResult<&[T]> {
        let slot = self.occupied(handle)?;
        Ok(&self.buffer[slot.offset..slot.end()])
    }

    /// Release an allocation and merge it with free neighbours.
    pub fn deallocate(&mut self, handle: Handle) -> BufferResult<()> {
        let index = handle.index();
        match self.slots.get(index).map(|slot| slot.state) {
            Some(SlotState::Occupied) => {}
            Some(SlotState::Free) => return Err(BufferError::DoubleFree(handle)),
            Some(SlotState::Retired) | None => return Err(BufferError::InvalidHandle(handle)),
        }
        self.slots[index].state = SlotState::Free;

        if let Some(left) = self.free_neighbour(index, |candidate, released| {
            candidate.end() == released.offset
        }) {
            let merged = self.slots[left];
            let released = &mut self.slots[index];
            released.offset = merged.offset;
            released.size += merged.size;
            self.retire(left);
        }

        if let Some(right) = self.free_neighbour(index, |candidate, released| {
            candidate.offset == released.end()
        }) {
            let merged = self.slots[right].size;
            self.slots[index].size += merged;
            self.retire(right);
        }

        trace!(handle = %handle, free = self.slots[index].size, "released buffer slot");
        Ok(())
    }

    /// The whole backing array, including unallocated elements.
    pub fn data(&self) -> &[T] {
        &self.buffer
    }

    /// Current element count of the backing array.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn occupied(&self, handle: Handle) -> BufferResult<&SlotRecord> {
        match self.slots.get(handle.index()) {
            Some(slot) if slot.state == SlotState::Occupied => Ok(slot),
            _ => Err(BufferError::InvalidHandle(handle)),
        }
    }

    /// Extend the buffer so that a free slot of at least `size` exists at
    /// its end, and return that slot.
    fn grow(&mut self, size: usize) -> BufferResult<usize> {
        let old_capacity = self.buffer.len();
        let additional = old_capacity.max(size);

        let tail = self
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Free && slot.end() == old_capacity);
        let index = match tail {
            Some(index) => {
                self.slots[index].size += additional;
                index
            }
            None => self.create_slot(old_capacity, additional)?,
        };

        self.buffer.resize(old_capacity + additional, T::default());

        debug!(
            from = old_capacity,
            to = self.buffer.len(),
            requested = size,
            "grew continuous buffer"
        );
        Ok(index)
    }

    /// Mark the first `size` elements of free slot `index` occupied and
    /// split the rest off into a new free slot.
    fn occupy(&mut self, index: usize, size: usize) -> BufferResult<()> {
        let slot = self.slots[index];
        let remaining = slot.size - size;
        if remaining > 0 {
            self.create_slot(slot.offset + size, remaining)?;
        }

        let slot = &mut self.slots[index];
        slot.size = size;
        slot.state = SlotState::Occupied;
        Ok(())
    }

    /// A free slot record, taken from the recycling stack when possible.
    fn create_slot(&mut self, offset: usize, size: usize) -> BufferResult<usize> {
        let record = SlotRecord {
            state: SlotState::Free,
            offset,
            size,
        };

        if let Some(index) = self.recycled.pop() {
            let index = index as usize;
            self.slots[index] = record;
            return Ok(index);
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| BufferError::SlotLimit)?;
        self.slots.push(record);
        Ok(index as usize)
    }

    /// The live slot touching slot `index` as described by `touches`, if
    /// that slot is free. Retired records are ignored.
    fn free_neighbour(
        &self,
        index: usize,
        touches: impl Fn(&SlotRecord, &SlotRecord) -> bool,
    ) -> Option<usize> {
        let released = &self.slots[index];
        self.slots
            .iter()
            .enumerate()
            .find(|&(i, candidate)| {
                i != index && candidate.state != SlotState::Retired && touches(candidate, released)
            })
            .filter(|(_, candidate)| candidate.state == SlotState::Free)
            .map(|(i, _)| i)
    }

    fn retire(&mut self, index: usize) {
        self.slots[index] = SlotRecord {
            state: SlotState::Retired,
            offset: 0,
            size: 0,
        };
        self.recycled.push(index as u32);
    }
}

impl<T: Clone + Default> Default for ContinuousBuffer<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL_SIZE)
    }
}
