//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root Error struct holding an
//! error kind and an optional source for error chaining. These errors stay
//! inside the crate's write paths; `broadcast` and `emit` never surface them.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The connection was closed, or its reading side has gone away.
    Closed,
    /// A payload could not be serialized to JSON.
    Serialization,
}

impl Error {
    pub fn closed() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Closed,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error_kind {
            ErrorKind::Closed => write!(f, "SSE connection closed"),
            ErrorKind::Serialization => write!(f, "SSE payload serialization failed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
