//! Errors reported by the USD table functions.

use std::fmt;

use thiserror::Error;
use usdsql_core::usd::{ReadError, WalkError};

use crate::host::ChunkError;

/// Coarse error classification reported to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad arguments, raised at bind time before any I/O
    InvalidArgument,
    /// The asset does not exist or cannot be read
    NotFound,
    /// The asset is malformed or in an unsupported format
    ParseError,
    /// The stage was released while a walk was in progress
    StaleHandle,
    /// A projector produced rows that do not match its schema
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::StaleHandle => "StaleHandle",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Errors surfaced through the host protocol.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Unknown table function: {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("Output chunk rejected row: {0}")]
    Chunk(#[from] ChunkError),
}

impl FunctionError {
    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        FunctionError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FunctionError::InvalidArgument { .. } | FunctionError::UnknownFunction(_) => {
                ErrorKind::InvalidArgument
            }
            FunctionError::Read(ReadError::NotFound(_)) => ErrorKind::NotFound,
            FunctionError::Read(ReadError::Parse { .. })
            | FunctionError::Read(ReadError::UnsupportedFormat { .. }) => ErrorKind::ParseError,
            FunctionError::Walk(WalkError::StaleHandle) => ErrorKind::StaleHandle,
            FunctionError::Chunk(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for table-function operations.
pub type FunctionResult<T> = Result<T, FunctionError>;
