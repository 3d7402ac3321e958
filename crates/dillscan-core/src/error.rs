//! Error types for the dillscan-core library.
//!
//! Decoding a container can fail in exactly four structural ways, modelled by
//! [`DecodeError`]. Everything around the decode (resolving a URI, reading a
//! file) is covered by the crate-level [`Error`], which wraps a
//! [`DecodeError`] when the bytes were obtained but turned out to be invalid.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dillscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures detected while decoding a container header
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte range is below the structural floor of a kernel file
    #[error("File size is too small to be a valid kernel file ({size} bytes)")]
    FileTooSmall {
        /// Length of the rejected byte range
        size: usize,
    },

    /// The first four bytes are not the kernel magic
    #[error("Invalid magic identifier (found {found:#010x})")]
    InvalidMagic {
        /// The value read from offset 0
        found: u32,
    },

    /// The declared format version is outside the supported range
    #[error("Invalid kernel binary format version (found {found})")]
    InvalidVersion {
        /// The value read from offset 4
        found: u32,
    },

    /// A size or count stored in the file points outside the byte range
    #[error("Invalid kernel binary: Indicated size is invalid (at offset {offset})")]
    InvalidSizeIndicated {
        /// Offset of the field holding the bad indication
        offset: usize,
    },
}

impl DecodeError {
    /// Returns true if the file is a kernel container built for another
    /// format version, i.e. recompiling the source would fix it
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::InvalidVersion { .. })
    }
}

/// A cursor access outside the underlying byte range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read of {width} bytes at offset {offset} exceeds buffer of {size} bytes")]
pub struct ReadError {
    /// Requested absolute position
    pub offset: usize,
    /// Number of bytes requested
    pub width: usize,
    /// Length of the underlying byte range
    pub size: usize,
}

impl From<ReadError> for DecodeError {
    fn from(err: ReadError) -> Self {
        DecodeError::InvalidSizeIndicated { offset: err.offset }
    }
}

/// Error type for loading and decoding programs
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The bytes were loaded but are not a valid container
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Input file exceeds the configured size cap
    #[error("file '{path}' is {size} bytes, larger than the {max} byte limit")]
    FileTooLarge {
        /// Path to the rejected file
        path: PathBuf,
        /// Actual file size
        size: u64,
        /// Configured maximum
        max: u64,
    },

    /// The loader has no program registered under this identifier
    #[error("no program found for '{uri}'")]
    NotFound {
        /// The identifier that failed to resolve
        uri: String,
    },

    /// The identifier cannot be handled by this loader
    #[error("unsupported program identifier '{uri}'")]
    InvalidUri {
        /// The rejected identifier
        uri: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new not-found error
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    /// Creates a new invalid identifier error
    pub fn invalid_uri(uri: impl Into<String>) -> Self {
        Self::InvalidUri { uri: uri.into() }
    }

    /// Returns the decode failure, if the bytes were loaded but rejected
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode(err) => Some(err),
            _ => None,
        }
    }
}
