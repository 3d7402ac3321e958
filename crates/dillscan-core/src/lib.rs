//! # dillscan-core
//!
//! A library for validating and decoding the header of Kernel (`.dill`)
//! program containers.
//!
//! This crate provides the core functionality for:
//! - Reading big-endian fields sequentially or from the component index at
//!   the tail of a file
//! - Validating the size floor, magic and format version of a container
//! - Detecting files made of several concatenated containers
//! - Locating the source, name, metadata, string and constant tables
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`reader`]: Byte cursor and tail index addressing
//! - [`decoder`]: Header validation and field extraction
//! - [`program`]: The decoded [`Program`] descriptor
//! - [`loader`]: Resolving identifiers into buffers
//! - [`format`]: Format constants
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use dillscan_core::Program;
//! use std::fs;
//!
//! let data = fs::read("./build/app.dill")?;
//! let program = Program::read_from_bytes(data)?;
//!
//! println!(
//!     "version {}, {} libraries, main: {:?}",
//!     program.binary_version(),
//!     program.library_count(),
//!     program.main_method_reference()
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`Loader`]: Customize how program identifiers are resolved into bytes
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decoder;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;
pub mod format;
pub mod loader;
pub mod program;
pub mod reader;

// Re-export primary types for convenience
pub use decoder::decode;
pub use error::{DecodeError, Error, ReadError, Result};
pub use loader::{FileLoader, Loader, LoaderConfig, MemoryLoader};
pub use program::{NameIndex, Program};
pub use reader::{Reader, TailIndex};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
