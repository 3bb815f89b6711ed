//! Error types for the pxdgen crate.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for the pxdgen crate.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parser related errors.
    #[error("Parser error: {0}")]
    Parser(String),
}

impl Error {
    /// Creates a new parser error.
    pub fn parser_error(msg: impl Into<String>) -> Self {
        Self::Parser(msg.into())
    }
}
