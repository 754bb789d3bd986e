//! Error types for mdstore_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using mdstore_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the metadata model or its backend.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Hierarchy construction found an incompatible existing node.
    #[error("Structural conflict at '{path}': {reason}")]
    StructuralConflict { path: String, reason: String },

    /// An object referenced by a connector could not be loaded.
    #[error("Failed to load {class_name} from {location} in {realm}: {reason}")]
    BackendLoad {
        class_name: String,
        realm: String,
        location: String,
        reason: String,
    },

    /// A backend location could not be read as the expected structure.
    #[error("Failed to read backend location {location}: {reason}")]
    BackendRead { location: String, reason: String },

    /// Unload was attempted on a connector that is not durably stored.
    #[error("Object is not persisted: {reason}")]
    NotPersisted { reason: String },

    /// No backend implementation exists for a mapper family.
    #[error("Unknown mapper family: {family}")]
    UnknownMapperFamily { family: String },

    /// Object file is corrupted or invalid.
    #[error("Corrupted object at {path}: {reason}")]
    CorruptedObject { path: PathBuf, reason: String },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Object header is malformed.
    #[error("Invalid object header: {reason}")]
    InvalidHeader { reason: String },

    /// Object not found in store.
    #[error("Object not found: {hash}")]
    ObjectNotFound { hash: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Invalid reference name or format.
    #[error("Invalid reference: {reason}")]
    InvalidRef { reason: String },

    /// Invalid object type.
    #[error("Invalid object type: expected {expected}, got {got}")]
    InvalidObjectType { expected: String, got: String },

    /// Invalid tree entry.
    #[error("Invalid tree entry: {reason}")]
    InvalidTreeEntry { reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Compression or decompression failed.
    #[error("Compression error: {reason}")]
    Compression { reason: String },

    /// A serialized record is not valid JSON of the expected shape.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A serialized record carries an unexpected type or schema version.
    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// UTF-8 encoding error.
    #[error("UTF-8 error: {source}")]
    Utf8Error {
        #[from]
        source: std::str::Utf8Error,
    },
}

impl Error {
    /// Create a StructuralConflict error.
    pub fn structural_conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::StructuralConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a BackendLoad error.
    pub fn backend_load(
        class_name: impl Into<String>,
        realm: impl Into<String>,
        location: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Error::BackendLoad {
            class_name: class_name.into(),
            realm: realm.into(),
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a BackendRead error.
    pub fn backend_read(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::BackendRead {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a NotPersisted error.
    pub fn not_persisted(reason: impl Into<String>) -> Self {
        Error::NotPersisted {
            reason: reason.into(),
        }
    }

    /// Create an UnknownMapperFamily error.
    pub fn unknown_mapper_family(family: impl Into<String>) -> Self {
        Error::UnknownMapperFamily {
            family: family.into(),
        }
    }

    /// Create a CorruptedObject error.
    pub fn corrupted_object(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            reason: reason.into(),
        }
    }

    /// Create an ObjectNotFound error.
    pub fn object_not_found(hash: impl Into<String>) -> Self {
        Error::ObjectNotFound { hash: hash.into() }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidRef error.
    pub fn invalid_ref(reason: impl Into<String>) -> Self {
        Error::InvalidRef {
            reason: reason.into(),
        }
    }

    /// Create an InvalidObjectType error.
    pub fn invalid_object_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::InvalidObjectType {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an InvalidTreeEntry error.
    pub fn invalid_tree_entry(reason: impl Into<String>) -> Self {
        Error::InvalidTreeEntry {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create an InvalidRecord error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Error::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Create a Compression error.
    pub fn compression_error(reason: impl Into<String>) -> Self {
        Error::Compression {
            reason: reason.into(),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
