//! Error types and result types for document store operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! Only the connect-time transport failure is recovered locally (logged, client
//! left disconnected); everything else is surfaced to the caller unchanged.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The store transport could not be established (unreachable, refused, bad options).
    #[error("Connection error: {0}")]
    Connection(String),
    /// An operation needing a live connection was called before `connect` or after `disconnect`.
    #[error("Not connected to a document store")]
    NotConnected,
    /// Malformed JSON-Lines input. `line` is 1-based and counts every physical line.
    #[error("Format error on line {line}: {message}")]
    Format { line: usize, message: String },
    /// Reading an ingestion source failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// The store rejected a filter, projection or pipeline.
    #[error("Query error: {0}")]
    Query(String),
    /// Query results could not be turned into a chart, or the chart could not be drawn.
    #[error("Render error: {0}")]
    Render(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Strict collection creation hit an existing collection.
    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A document with the given `_id` already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document has an invalid structure (e.g. a JSON scalar where an object was expected).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Shorthand for a [`DocumentStoreError::Format`] at the given 1-based line.
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        DocumentStoreError::Format { line, message: message.into() }
    }

    /// Returns `true` for the connection-related variants.
    pub fn is_connection(&self) -> bool {
        matches!(self, DocumentStoreError::Connection(_) | DocumentStoreError::NotConnected)
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<IoError> for DocumentStoreError {
    fn from(err: IoError) -> Self {
        DocumentStoreError::Io(err.to_string())
    }
}
