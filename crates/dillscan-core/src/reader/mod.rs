//! Cursor over an immutable byte range.
//!
//! [`Reader`] decodes big-endian fixed-width integers either sequentially,
//! advancing its offset, or from a slot of a [`TailIndex`] at the end of the
//! range. Every access is bounds-checked: a position outside the range is a
//! [`ReadError`], never a clamp or a panic.

mod tail;

use crate::error::ReadError;
use tracing::trace;

pub use tail::TailIndex;

/// Sequential and backward-indexed reader for kernel binaries
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Total length of the underlying byte range
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current sequential position
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left between the cursor and the end of the range
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Moves the cursor to an absolute position.
    ///
    /// Positions up to and including `size()` are valid.
    pub fn set_offset(&mut self, offset: usize) -> Result<(), ReadError> {
        if offset > self.data.len() {
            return Err(ReadError {
                offset,
                width: 0,
                size: self.data.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Reads a big-endian `u32` at the cursor and advances past it
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let bytes = self.take::<4>()?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads a slot of a backward-addressed table.
    ///
    /// The cursor is left immediately after the slot, so following
    /// sequential reads walk forward through the table from there. The
    /// previous position is not restored.
    pub fn read_from_index_no_reset(
        &mut self,
        index: &TailIndex,
        fields_before: usize,
        list_size: usize,
        list_index: usize,
    ) -> Result<u32, ReadError> {
        let offset = index
            .slot_offset(fields_before, list_size, list_index)
            .ok_or(ReadError {
                offset: 0,
                width: index.stride(),
                size: self.data.len(),
            })?;
        trace!(
            "Reading tail slot {}+{}-{} at offset {}",
            fields_before,
            list_size,
            list_index,
            offset
        );
        self.set_offset(offset)?;
        self.read_u32()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let err = ReadError {
            offset: self.offset,
            width: N,
            size: self.data.len(),
        };
        let end = self.offset.checked_add(N).ok_or(err)?;
        let bytes: [u8; N] = self
            .data
            .get(self.offset..end)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(err)?;
        self.offset = end;
        Ok(bytes)
    }
}
