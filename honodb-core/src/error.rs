// honodb-core/src/error.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Errors raised by the HonoDB core
#[derive(Error, Debug)]
pub enum HonoError {
    /// Malformed command, condition or payload. Raised before any state change.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Payload is not an object or carries no usable `id`
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Document id is immutable: {existing} cannot become {attempted}")]
    ImmutableId { existing: String, attempted: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A single undecodable record
    #[error("Corrupt record in {chunk} line {line}: {reason}")]
    CorruptRecord {
        chunk: String,
        line: usize,
        reason: String,
    },

    /// Structural damage (sequence gaps, unreadable catalog)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, HonoError>;

impl From<serde_json::Error> for HonoError {
    fn from(err: serde_json::Error) -> Self {
        HonoError::Serialization(err.to_string())
    }
}

/// Serializable discriminant of [`HonoError`], reported in verb results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ParseError,
    UnknownCollectionError,
    UnknownDatabaseError,
    CollectionExistsError,
    DatabaseExistsError,
    InvalidNameError,
    InvalidDocumentError,
    DuplicateIdError,
    ImmutableIdError,
    NotFoundError,
    CorruptRecordError,
    CorruptionError,
    #[serde(rename = "IOError")]
    IoError,
    ConfigError,
}

impl HonoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HonoError::Parse(_) => ErrorKind::ParseError,
            HonoError::UnknownCollection(_) => ErrorKind::UnknownCollectionError,
            HonoError::UnknownDatabase(_) => ErrorKind::UnknownDatabaseError,
            HonoError::CollectionExists(_) => ErrorKind::CollectionExistsError,
            HonoError::DatabaseExists(_) => ErrorKind::DatabaseExistsError,
            HonoError::InvalidName { .. } => ErrorKind::InvalidNameError,
            HonoError::InvalidDocument(_) => ErrorKind::InvalidDocumentError,
            HonoError::DuplicateId(_) => ErrorKind::DuplicateIdError,
            HonoError::ImmutableId { .. } => ErrorKind::ImmutableIdError,
            HonoError::NotFound(_) => ErrorKind::NotFoundError,
            HonoError::CorruptRecord { .. } => ErrorKind::CorruptRecordError,
            HonoError::Corruption(_) => ErrorKind::CorruptionError,
            // encode failures are reported as storage failures
            HonoError::Serialization(_) | HonoError::Io(_) => ErrorKind::IoError,
            HonoError::Config(_) => ErrorKind::ConfigError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::UnknownCollectionError => "UnknownCollectionError",
            ErrorKind::UnknownDatabaseError => "UnknownDatabaseError",
            ErrorKind::CollectionExistsError => "CollectionExistsError",
            ErrorKind::DatabaseExistsError => "DatabaseExistsError",
            ErrorKind::InvalidNameError => "InvalidNameError",
            ErrorKind::InvalidDocumentError => "InvalidDocumentError",
            ErrorKind::DuplicateIdError => "DuplicateIdError",
            ErrorKind::ImmutableIdError => "ImmutableIdError",
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::CorruptRecordError => "CorruptRecordError",
            ErrorKind::CorruptionError => "CorruptionError",
            ErrorKind::IoError => "IOError",
            ErrorKind::ConfigError => "ConfigError",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(HonoError::Parse("x".into()).kind(), ErrorKind::ParseError);
        assert_eq!(
            HonoError::ImmutableId {
                existing: "a".into(),
                attempted: "b".into()
            }
            .kind(),
            ErrorKind::ImmutableIdError
        );
        let io_err = HonoError::from(io::Error::new(io::ErrorKind::Other, "disk"));
        assert_eq!(io_err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_kind_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::IoError).unwrap(),
            "\"IOError\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFoundError).unwrap(),
            "\"NotFoundError\""
        );
        assert_eq!(ErrorKind::DuplicateIdError.to_string(), "DuplicateIdError");
    }
}
