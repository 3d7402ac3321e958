//! Fixed constants of the kernel binary format.

/// Magic number at offset 0 of every kernel file
pub const KERNEL_MAGIC: u32 = 0x90AB_CDEF;

/// Oldest binary format version this decoder accepts (inclusive)
pub const MIN_SUPPORTED_VERSION: u32 = 18;

/// Newest binary format version this decoder accepts (inclusive)
pub const MAX_SUPPORTED_VERSION: u32 = 18;

/// Smallest byte length a kernel file can have.
///
/// A file holds at least the magic (4), version (4), an empty problem
/// list (1), source map length (4), canonical name table length (1),
/// metadata length (4), string table length (1), constant table length (1)
/// and a component index of ten `u32` fields (40).
pub const MIN_KERNEL_FILE_SIZE: usize = 60;

/// Width of every field in the component index
pub const TAIL_FIELD_WIDTH: usize = 4;

/// Component index fields stored after the library count
pub const LIBRARY_COUNT_FIELD_COUNT_FROM_END: usize = 1;

/// Component index fields between the source table offset and the first
/// library offset
pub const SOURCE_TABLE_FIELD_COUNT_FROM_FIRST_LIBRARY_OFFSET: usize = 6;

/// Returns true if `version` lies in the supported range
pub fn is_supported_version(version: u32) -> bool {
    (MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version)
}
