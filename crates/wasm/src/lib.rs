//! WebAssembly binary and text I/O for the prune IR.
//!
//! This crate translates between the wasm binary format and the structured
//! expression IR in `prune-ir`: [`decode_module`] rebuilds expression trees
//! from the flat operator stream, [`encode_module`] lowers them back, and
//! [`ModuleReader`]/[`ModuleWriter`] wrap both with file handling that
//! dispatches on the path suffix or the binary magic number.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

use wasmparser::BinaryReaderError;

/// A WebAssembly translation error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input WebAssembly code is invalid.
    ///
    /// This error code is used when the decoder encounters invalid
    /// WebAssembly code. This should never happen for validated code.
    #[error("Invalid input WebAssembly code at offset {offset}: {message}")]
    InvalidWebAssembly {
        /// A string describing the validation error.
        message: String,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },

    /// A feature used by the WebAssembly code is not supported here.
    ///
    /// The decoder handles the WebAssembly MVP; modules using later
    /// proposals are rejected rather than mistranslated.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// The input WebAssembly text could not be parsed.
    #[error("Invalid input WebAssembly text")]
    Text(#[from] wat::Error),

    /// The module could not be rendered as text.
    #[error("Rendering WebAssembly text failed")]
    Print(#[source] anyhow::Error),

    /// A file could not be read or written.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Build an [`Error::Unsupported`] from `format!`-style arguments.
///
/// Used wherever the decoder meets a post-MVP construct: name the construct,
/// wrap the message, and let the caller bail with `?` or `return Err(...)`.
#[macro_export]
macro_rules! unsupported {
    ($($arg:tt)*) => { $crate::Error::Unsupported(format!($($arg)*)) }
}

impl From<BinaryReaderError> for Error {
    /// Convert from a `BinaryReaderError` to an `Error`.
    fn from(e: BinaryReaderError) -> Self {
        Self::InvalidWebAssembly {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

/// A convenient alias for a `Result` that uses [`Error`] as the error type.
pub type Result<T> = core::result::Result<T, Error>;

mod decode;
mod encode;
mod io;

pub use crate::decode::decode_module;
pub use crate::encode::encode_module;
pub use crate::io::{ModuleReader, ModuleWriter};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
