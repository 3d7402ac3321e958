//! The decoded program descriptor.
//!
//! A [`Program`] records where the sections of a kernel container live. It
//! does not copy the container: it keeps a shared reference to the buffer
//! it was decoded from, so consumers can read the sections lazily.

use crate::decoder;
use crate::error::{DecodeError, Result};
use crate::loader::{FileLoader, Loader};
use crate::reader::Reader;
use bytes::Bytes;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Index into the canonical name table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameIndex(u32);

impl NameIndex {
    /// Wraps a raw table index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Decodes a reference stored biased by one, where `0` means none
    pub fn from_biased(raw: u32) -> Option<Self> {
        raw.checked_sub(1).map(Self)
    }

    /// The table index
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Header summary of a kernel container
#[derive(Clone, PartialEq, Eq)]
pub struct Program {
    pub(crate) binary_version: u32,
    pub(crate) is_single_program: bool,
    pub(crate) kernel_data: Bytes,
    pub(crate) library_count: u32,
    pub(crate) source_table_offset: u32,
    pub(crate) name_table_offset: u32,
    pub(crate) metadata_payloads_offset: u32,
    pub(crate) metadata_mappings_offset: u32,
    pub(crate) string_table_offset: u32,
    pub(crate) constant_table_offset: u32,
    pub(crate) main_method_reference: Option<NameIndex>,
}

impl Program {
    /// Decodes a program from an in-memory buffer
    pub fn read_from_bytes(data: impl Into<Bytes>) -> std::result::Result<Self, DecodeError> {
        decoder::decode(data)
    }

    /// Decodes a program with an existing reader over `backing`
    pub fn read_from(
        reader: &mut Reader<'_>,
        backing: Bytes,
    ) -> std::result::Result<Self, DecodeError> {
        decoder::read_program(reader, backing)
    }

    /// Resolves `uri` with `loader` and decodes the result.
    ///
    /// Loader failures are returned as the loader reported them.
    pub fn read_from_uri(loader: &dyn Loader, uri: &str) -> Result<Self> {
        let data = loader.load(uri)?;
        debug!("Loaded {} bytes for {}", data.len(), uri);
        Ok(decoder::decode(data)?)
    }

    /// Reads and decodes a file with the default [`FileLoader`]
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = FileLoader::new().load_path(path.as_ref())?;
        Ok(decoder::decode(data)?)
    }

    /// Binary format version of the container
    pub fn binary_version(&self) -> u32 {
        self.binary_version
    }

    /// False if the buffer holds two or more concatenated containers
    pub fn is_single_program(&self) -> bool {
        self.is_single_program
    }

    /// The buffer this program was decoded from
    pub fn kernel_data(&self) -> &Bytes {
        &self.kernel_data
    }

    /// Number of libraries in the component index
    pub fn library_count(&self) -> u32 {
        self.library_count
    }

    /// Offset of the source table
    pub fn source_table_offset(&self) -> u32 {
        self.source_table_offset
    }

    /// Offset of the canonical name table
    pub fn name_table_offset(&self) -> u32 {
        self.name_table_offset
    }

    /// Offset of the metadata payloads
    pub fn metadata_payloads_offset(&self) -> u32 {
        self.metadata_payloads_offset
    }

    /// Offset of the metadata mappings
    pub fn metadata_mappings_offset(&self) -> u32 {
        self.metadata_mappings_offset
    }

    /// Offset of the string table
    pub fn string_table_offset(&self) -> u32 {
        self.string_table_offset
    }

    /// Offset of the constant table
    pub fn constant_table_offset(&self) -> u32 {
        self.constant_table_offset
    }

    /// Canonical name of the main method, if the program has one
    pub fn main_method_reference(&self) -> Option<NameIndex> {
        self.main_method_reference
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("binary_version", &self.binary_version)
            .field("is_single_program", &self.is_single_program)
            .field("kernel_data_len", &self.kernel_data.len())
            .field("library_count", &self.library_count)
            .field("source_table_offset", &self.source_table_offset)
            .field("name_table_offset", &self.name_table_offset)
            .field("metadata_payloads_offset", &self.metadata_payloads_offset)
            .field("metadata_mappings_offset", &self.metadata_mappings_offset)
            .field("string_table_offset", &self.string_table_offset)
            .field("constant_table_offset", &self.constant_table_offset)
            .field("main_method_reference", &self.main_method_reference)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fixtures::KernelFixture;
    use crate::loader::MemoryLoader;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_name_index_bias() {
        assert_eq!(NameIndex::from_biased(0), None);
        assert_eq!(NameIndex::from_biased(1), Some(NameIndex::new(0)));
        assert_eq!(NameIndex::from_biased(u32::MAX).map(NameIndex::value), Some(u32::MAX - 1));
        assert_eq!(NameIndex::new(7).to_string(), "#7");
    }

    #[test]
    fn test_shares_backing_buffer() {
        let data = Bytes::from(KernelFixture::new().build());
        let program = Program::read_from_bytes(data.clone()).unwrap();
        assert_eq!(program.kernel_data().as_ptr(), data.as_ptr());
    }

    #[test]
    fn test_debug_omits_buffer_contents() {
        let program = Program::read_from_bytes(KernelFixture::new().build()).unwrap();
        let debug = format!("{:?}", program);
        assert!(debug.contains("kernel_data_len: 64"));
        assert!(debug.contains("main_method_reference: None"));
    }

    #[test]
    fn test_read_from_uri() {
        let loader = MemoryLoader::new()
            .with_program("main.dill", KernelFixture::new().library_count(2).build())
            .with_program("empty.dill", Vec::new());

        let program = Program::read_from_uri(&loader, "main.dill").unwrap();
        assert_eq!(program.library_count(), 2);

        let err = Program::read_from_uri(&loader, "empty.dill").unwrap_err();
        assert!(matches!(
            err.as_decode(),
            Some(DecodeError::FileTooSmall { size: 0 })
        ));

        let err = Program::read_from_uri(&loader, "missing.dill").unwrap_err();
        assert!(matches!(err, Error::NotFound { ref uri } if uri == "missing.dill"));
    }

    #[test]
    fn test_read_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.dill");
        fs::write(&path, KernelFixture::new().main_method_raw(5).build()).unwrap();

        let program = Program::read_from_file(&path).unwrap();
        assert_eq!(program.main_method_reference(), Some(NameIndex::new(4)));

        let err = Program::read_from_file(temp_dir.path().join("nope.dill")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
