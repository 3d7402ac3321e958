//! Backward-addressed table of fixed-width fields.
//!
//! Kernel files end with a component index: a run of big-endian `u32`
//! fields whose last slot is the container length. Summary fields are
//! located by counting slots backward from the end, so they can be read
//! without parsing anything that precedes them.
//!
//! ```text
//!   ... | source | names | payloads | mappings | strings | consts | main | lib[0..=n] | n | size |
//!                                                                                             ^ end
//! ```

use crate::format::TAIL_FIELD_WIDTH;

/// A table of fixed-width slots ending at an absolute offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailIndex {
    end: usize,
    stride: usize,
}

impl TailIndex {
    /// Creates a table of `u32` slots ending at `end`
    pub fn new(end: usize) -> Self {
        Self::with_stride(end, TAIL_FIELD_WIDTH)
    }

    /// Creates a table with a custom slot width
    pub fn with_stride(end: usize, stride: usize) -> Self {
        Self { end, stride }
    }

    /// Absolute offset one past the last slot
    pub fn end(&self) -> usize {
        self.end
    }

    /// Width of every slot in bytes
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Absolute offset of a slot.
    ///
    /// `fields_before` counts the single-slot fields between the wanted
    /// entry and `end`; the entry itself is element `list_index` of a list
    /// of `list_size` slots. A plain field is `list_size = 1, list_index = 0`.
    ///
    /// Returns `None` if the slot would start before offset 0 or the
    /// arithmetic overflows.
    pub fn slot_offset(
        &self,
        fields_before: usize,
        list_size: usize,
        list_index: usize,
    ) -> Option<usize> {
        let slots = fields_before
            .checked_add(list_size)?
            .checked_sub(list_index)?;
        self.end.checked_sub(slots.checked_mul(self.stride)?)
    }
}
