//! Resolving program identifiers into byte buffers.
//!
//! The decoder only ever sees a [`Bytes`] buffer. Where that buffer comes
//! from is the job of a [`Loader`]: embedders can plug in their own, or use
//! [`FileLoader`] for paths and `file://` URIs and [`MemoryLoader`] for
//! buffers they already hold.
//!
//! ```no_run
//! use dillscan_core::{FileLoader, LoaderConfig, Program};
//!
//! let loader = FileLoader::with_config(LoaderConfig::new().max_file_size(64 * 1024 * 1024));
//! let program = Program::read_from_uri(&loader, "file:///tmp/app.dill")?;
//! println!("{} libraries", program.library_count());
//! # Ok::<(), dillscan_core::Error>(())
//! ```

use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::trace;

const FILE_SCHEME: &str = "file://";

/// Resolves an identifier into the buffer holding a kernel container
pub trait Loader: Send + Sync {
    /// Load the bytes for `uri`
    fn load(&self, uri: &str) -> Result<Bytes>;
}

/// Configuration for the file loader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Files larger than this are rejected before being read
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl LoaderConfig {
    /// Creates a new loader config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum accepted file size
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }
}

/// Loads programs from the local file system
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    config: LoaderConfig,
}

impl FileLoader {
    /// Creates a loader with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader with custom configuration
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Reads a file, enforcing the size cap first
    pub fn load_path(&self, path: &Path) -> Result<Bytes> {
        let metadata = fs::metadata(path).map_err(|e| Error::file_read(path, e))?;
        if metadata.len() > self.config.max_file_size {
            return Err(Error::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max: self.config.max_file_size,
            });
        }

        trace!("Reading {}", path.display());
        let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Bytes::from(data))
    }
}

impl Loader for FileLoader {
    fn load(&self, uri: &str) -> Result<Bytes> {
        let path = match uri.strip_prefix(FILE_SCHEME) {
            Some(path) => path,
            // Any other scheme, e.g. package: or http://
            None if uri.contains("://") || uri.starts_with("package:") => {
                return Err(Error::invalid_uri(uri));
            }
            None => uri,
        };
        if path.is_empty() {
            return Err(Error::invalid_uri(uri));
        }
        self.load_path(Path::new(path))
    }
}

/// Serves programs from buffers registered up front
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    programs: HashMap<String, Bytes>,
}

impl MemoryLoader {
    /// Creates an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a buffer under `uri`
    pub fn with_program(mut self, uri: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(uri, data);
        self
    }

    /// Registers a buffer under `uri`, replacing any previous one
    pub fn insert(&mut self, uri: impl Into<String>, data: impl Into<Bytes>) {
        self.programs.insert(uri.into(), data.into());
    }
}

impl Loader for MemoryLoader {
    fn load(&self, uri: &str) -> Result<Bytes> {
        // Clones share the registered allocation
        self.programs
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::not_found(uri))
    }
}
