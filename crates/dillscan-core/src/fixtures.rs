//! Synthetic kernel files for tests.
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for dependents that need well-formed containers.

use crate::format::{KERNEL_MAGIC, MAX_SUPPORTED_VERSION};

/// Builder for a minimal, structurally valid kernel container
#[derive(Debug, Clone)]
pub struct KernelFixture {
    /// Value written at offset 0
    pub magic: u32,
    /// Value written at offset 4
    pub version: u32,
    /// Zero bytes between the header and the component index
    pub body_len: usize,
    /// Number of libraries; the index holds one more library offset
    pub library_count: u32,
    /// Component index: source table offset
    pub source_table_offset: u32,
    /// Component index: canonical name table offset
    pub name_table_offset: u32,
    /// Component index: metadata payloads offset
    pub metadata_payloads_offset: u32,
    /// Component index: metadata mappings offset
    pub metadata_mappings_offset: u32,
    /// Component index: string table offset
    pub string_table_offset: u32,
    /// Component index: constant table offset
    pub constant_table_offset: u32,
    /// Main method reference as stored, biased by one (0 = none)
    pub main_method_raw: u32,
    /// Overrides the trailing container length when set
    pub trailer_override: Option<u32>,
}

impl Default for KernelFixture {
    fn default() -> Self {
        Self {
            magic: KERNEL_MAGIC,
            version: MAX_SUPPORTED_VERSION,
            body_len: 16,
            library_count: 0,
            source_table_offset: 8,
            name_table_offset: 12,
            metadata_payloads_offset: 14,
            metadata_mappings_offset: 16,
            string_table_offset: 18,
            constant_table_offset: 20,
            main_method_raw: 0,
            trailer_override: None,
        }
    }
}

impl KernelFixture {
    /// Creates a fixture with default field values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the library count
    pub fn library_count(mut self, count: u32) -> Self {
        self.library_count = count;
        self
    }

    /// Sets the raw (biased) main method reference
    pub fn main_method_raw(mut self, raw: u32) -> Self {
        self.main_method_raw = raw;
        self
    }

    /// Sets the body length
    pub fn body_len(mut self, len: usize) -> Self {
        self.body_len = len;
        self
    }

    /// Encodes the container
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.resize(out.len() + self.body_len, 0);

        for field in [
            self.source_table_offset,
            self.name_table_offset,
            self.metadata_payloads_offset,
            self.metadata_mappings_offset,
            self.string_table_offset,
            self.constant_table_offset,
            self.main_method_raw,
        ] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        for i in 0..=self.library_count {
            out.extend_from_slice(&(100 + i * 10).to_be_bytes());
        }
        out.extend_from_slice(&self.library_count.to_be_bytes());

        let total = (out.len() + 4) as u32;
        let trailer = self.trailer_override.unwrap_or(total);
        out.extend_from_slice(&trailer.to_be_bytes());
        out
    }
}
