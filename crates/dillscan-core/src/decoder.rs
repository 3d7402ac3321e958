//! Kernel container header decoding.
//!
//! ## Algorithm Overview
//!
//! 1. Reject ranges below [`MIN_KERNEL_FILE_SIZE`]
//! 2. Check the magic and the format version at the front
//! 3. Chase container-length trailers backward from the end to find out
//!    whether several containers were concatenated into one file
//! 4. Read the summary fields from the component index at the tail
//!
//! Nothing is published until every step succeeded.

use crate::error::DecodeError;
use crate::format::{
    is_supported_version, KERNEL_MAGIC, LIBRARY_COUNT_FIELD_COUNT_FROM_END,
    MIN_KERNEL_FILE_SIZE, SOURCE_TABLE_FIELD_COUNT_FROM_FIRST_LIBRARY_OFFSET, TAIL_FIELD_WIDTH,
};
use crate::program::{NameIndex, Program};
use crate::reader::{Reader, TailIndex};
use bytes::Bytes;
use tracing::{debug, trace};

/// Decodes the header of the kernel container held in `data`
pub fn decode(data: impl Into<Bytes>) -> Result<Program, DecodeError> {
    let data = data.into();
    let mut reader = Reader::new(&data);
    read_program(&mut reader, data.clone())
}

/// Decodes using a caller-supplied reader positioned over `backing`.
///
/// `backing` must be the buffer `reader` was created over; the resulting
/// [`Program`] keeps a shared reference to it.
pub fn read_program(reader: &mut Reader<'_>, backing: Bytes) -> Result<Program, DecodeError> {
    let size = reader.size();
    debug!("Decoding kernel binary of {} bytes", size);

    if size < MIN_KERNEL_FILE_SIZE {
        return Err(DecodeError::FileTooSmall { size });
    }

    reader.set_offset(0)?;
    let magic = reader.read_u32()?;
    if magic != KERNEL_MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }

    let binary_version = reader.read_u32()?;
    if !is_supported_version(binary_version) {
        return Err(DecodeError::InvalidVersion {
            found: binary_version,
        });
    }

    let is_single_program = is_single_program(reader)?;

    let index = TailIndex::new(size);
    let library_count =
        reader.read_from_index_no_reset(&index, LIBRARY_COUNT_FIELD_COUNT_FROM_END, 1, 0)?;

    // The count slot, library_count + 1 library offsets, then the fields up
    // to the source table offset.
    let source_table_offset = usize::try_from(library_count)
        .ok()
        .and_then(|count| {
            count.checked_add(
                LIBRARY_COUNT_FIELD_COUNT_FROM_END
                    + 1
                    + 1
                    + SOURCE_TABLE_FIELD_COUNT_FROM_FIRST_LIBRARY_OFFSET,
            )
        })
        .and_then(|fields_before| {
            reader
                .read_from_index_no_reset(&index, fields_before, 1, 0)
                .ok()
        })
        .ok_or(DecodeError::InvalidSizeIndicated {
            offset: size - 2 * TAIL_FIELD_WIDTH,
        })?;

    let name_table_offset = reader.read_u32()?;
    let metadata_payloads_offset = reader.read_u32()?;
    let metadata_mappings_offset = reader.read_u32()?;
    let string_table_offset = reader.read_u32()?;
    let constant_table_offset = reader.read_u32()?;
    let main_method_reference = NameIndex::from_biased(reader.read_u32()?);

    debug!(
        "Decoded kernel binary: version {}, {} libraries, single program: {}",
        binary_version, library_count, is_single_program
    );

    Ok(Program {
        binary_version,
        is_single_program,
        kernel_data: backing,
        library_count,
        source_table_offset,
        name_table_offset,
        metadata_payloads_offset,
        metadata_mappings_offset,
        string_table_offset,
        constant_table_offset,
        main_method_reference,
    })
}

/// Walks the container-length trailers backward from the end of the range.
///
/// Each container ends with its own total length, so stepping back by that
/// length lands on the end of the previous container. Only the single/many
/// distinction is needed, so the walk stops at the second container.
fn is_single_program(reader: &mut Reader<'_>) -> Result<bool, DecodeError> {
    let mut subprogram_count = 0usize;
    let mut cursor = reader.size() - 4;

    loop {
        reader.set_offset(cursor)?;
        let entry_size = reader.read_u32()? as usize;
        let container_end = reader.offset();

        let Some(start) = container_end.checked_sub(entry_size) else {
            return Err(DecodeError::InvalidSizeIndicated { offset: cursor });
        };
        trace!(
            "Container of {} bytes spans {}..{}",
            entry_size,
            start,
            container_end
        );

        subprogram_count += 1;
        if subprogram_count > 1 {
            break;
        }

        // The previous container's trailer sits right before this start;
        // at or before offset 0 there is nothing left to chase.
        match start.checked_sub(4) {
            Some(previous) if previous > 0 => cursor = previous,
            _ => break,
        }
    }

    Ok(subprogram_count == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::KernelFixture;
    use crate::format::{MAX_SUPPORTED_VERSION, MIN_SUPPORTED_VERSION};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_too_small() {
        for len in [0, 1, 8, 59] {
            let data = vec![0u8; len];
            assert_eq!(
                decode(data).unwrap_err(),
                DecodeError::FileTooSmall { size: len }
            );
        }
    }

    #[test]
    fn test_truncated_valid_file_is_too_small() {
        let data = KernelFixture::new().build();
        assert_eq!(data.len(), 64);
        assert!(matches!(
            decode(data[..59].to_vec()),
            Err(DecodeError::FileTooSmall { size: 59 })
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = KernelFixture::new().build();
        data[0] = 0x00;
        assert_eq!(
            decode(data).unwrap_err(),
            DecodeError::InvalidMagic { found: 0x00AB_CDEF }
        );

        let data = vec![0xFFu8; 128];
        assert!(matches!(
            decode(data),
            Err(DecodeError::InvalidMagic { found: 0xFFFF_FFFF })
        ));
    }

    #[test]
    fn test_invalid_version() {
        for version in [MIN_SUPPORTED_VERSION - 1, MAX_SUPPORTED_VERSION + 1, 0, u32::MAX] {
            let data = KernelFixture {
                version,
                ..KernelFixture::default()
            }
            .build();
            let err = decode(data).unwrap_err();
            assert_eq!(err, DecodeError::InvalidVersion { found: version });
            assert!(err.is_unsupported_version());
        }
    }

    #[test]
    fn test_header_fields() {
        let fixture = KernelFixture {
            library_count: 3,
            source_table_offset: 1000,
            name_table_offset: 2000,
            metadata_payloads_offset: 3000,
            metadata_mappings_offset: 4000,
            string_table_offset: 5000,
            constant_table_offset: 6000,
            main_method_raw: 43,
            ..KernelFixture::default()
        };
        let data = Bytes::from(fixture.build());
        let program = decode(data.clone()).unwrap();

        assert_eq!(program.binary_version(), MAX_SUPPORTED_VERSION);
        assert!(program.is_single_program());
        assert_eq!(program.library_count(), 3);
        assert_eq!(program.source_table_offset(), 1000);
        assert_eq!(program.name_table_offset(), 2000);
        assert_eq!(program.metadata_payloads_offset(), 3000);
        assert_eq!(program.metadata_mappings_offset(), 4000);
        assert_eq!(program.string_table_offset(), 5000);
        assert_eq!(program.constant_table_offset(), 6000);
        assert_eq!(program.main_method_reference(), Some(NameIndex::new(42)));
        assert_eq!(program.kernel_data(), &data);
    }

    #[test]
    fn test_main_method_absent_vs_index_zero() {
        let absent = decode(KernelFixture::new().main_method_raw(0).build()).unwrap();
        assert_eq!(absent.main_method_reference(), None);

        let first = decode(KernelFixture::new().main_method_raw(1).build()).unwrap();
        assert_eq!(first.main_method_reference(), Some(NameIndex::new(0)));
    }

    #[test]
    fn test_concatenated_programs() {
        let a = KernelFixture::new().library_count(2).build();
        let b = KernelFixture::new().library_count(5).body_len(40).build();

        assert!(decode(a.clone()).unwrap().is_single_program());
        assert!(decode(b.clone()).unwrap().is_single_program());

        let mut joined = a.clone();
        joined.extend_from_slice(&b);
        let program = decode(joined.clone()).unwrap();
        assert!(!program.is_single_program());
        // Summary fields come from the index at the very end
        assert_eq!(program.library_count(), 5);

        let mut three = joined;
        three.extend_from_slice(&a);
        assert!(!decode(three).unwrap().is_single_program());
    }

    #[test]
    fn test_corrupt_trailer() {
        let data = KernelFixture {
            trailer_override: Some(10_000),
            ..KernelFixture::default()
        }
        .build();
        let size = data.len();
        assert_eq!(
            decode(data).unwrap_err(),
            DecodeError::InvalidSizeIndicated { offset: size - 4 }
        );
    }

    #[test]
    fn test_corrupt_inner_trailer() {
        let inner_len = KernelFixture::new().build().len() as u32;
        let a = KernelFixture {
            trailer_override: Some(inner_len + 1),
            ..KernelFixture::default()
        }
        .build();

        let mut joined = a.clone();
        joined.extend_from_slice(&KernelFixture::new().build());
        assert!(matches!(
            decode(joined),
            Err(DecodeError::InvalidSizeIndicated { offset }) if offset == a.len() - 4
        ));
    }

    #[test]
    fn test_zero_length_trailer() {
        // Points at itself, so the walk sees it twice
        let data = KernelFixture {
            trailer_override: Some(0),
            ..KernelFixture::default()
        }
        .build();
        assert!(!decode(data).unwrap().is_single_program());
    }

    #[test]
    fn test_trailer_shorter_than_file() {
        // Claims only the last 12 bytes; the previous trailer then lands on
        // the zero main method slot, which reads as a second container.
        let data = KernelFixture {
            trailer_override: Some(12),
            ..KernelFixture::default()
        }
        .build();
        assert!(!decode(data).unwrap().is_single_program());
    }

    #[test]
    fn test_library_count_beyond_file() {
        let mut data = KernelFixture::new().build();
        let size = data.len();
        data[size - 8..size - 4].copy_from_slice(&1_000_000u32.to_be_bytes());
        assert_eq!(
            decode(data).unwrap_err(),
            DecodeError::InvalidSizeIndicated { offset: size - 8 }
        );

        let mut data = KernelFixture::new().build();
        data[size - 8..size - 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode(data),
            Err(DecodeError::InvalidSizeIndicated { .. })
        ));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let data = Bytes::from(KernelFixture::new().library_count(4).build());
        let first = decode(data.clone()).unwrap();
        let second = decode(data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_program_rewinds_reader() {
        let data = Bytes::from(KernelFixture::new().build());
        let mut reader = Reader::new(&data);
        reader.set_offset(20).unwrap();
        let program = read_program(&mut reader, data.clone()).unwrap();
        assert!(program.is_single_program());
    }
}
