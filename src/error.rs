use thiserror::Error;

/// Main error type for xmlshred
#[derive(Error, Debug)]
pub enum XmlShredError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or schema errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ingestion failed; the store is unchanged
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Query failed
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Outcome of a failed ingestion.
///
/// Every variant guarantees that no row for the file is visible in the store,
/// except `Rollback`, which reports that the rollback itself failed.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Bad file name or extension; nothing was written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A file with this name is already stored
    #[error("File '{0}' already exists")]
    DuplicateFile(String),

    /// Malformed XML; all rows written so far were rolled back
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Backing store failure; all rows written so far were rolled back
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Rolling back after `cause` failed as well
    #[error("Rollback failed after {cause}: {source}")]
    Rollback {
        cause: Box<IngestError>,
        #[source]
        source: rusqlite::Error,
    },
}

/// Query-time errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Missing parameters: {0}")]
    MissingParameters(String),

    #[error("File '{0}' not found")]
    FileNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Convenient Result type using XmlShredError
pub type Result<T> = std::result::Result<T, XmlShredError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XmlShredError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: XmlShredError = rusqlite_err.into();
        assert!(matches!(err, XmlShredError::Database(_)));

        let err: IngestError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, IngestError::Storage(_)));

        let err: QueryError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, QueryError::Storage(_)));
    }

    #[test]
    fn test_ingest_error_is_transparent() {
        let err: XmlShredError = IngestError::DuplicateFile("a.xml".to_string()).into();
        assert_eq!(err.to_string(), "File 'a.xml' already exists");
    }

    #[test]
    fn test_rollback_error_keeps_cause() {
        let err = IngestError::Rollback {
            cause: Box::new(IngestError::Parse("unexpected end".to_string())),
            source: rusqlite::Error::InvalidQuery,
        };
        let message = err.to_string();
        assert!(message.contains("Rollback failed"));
        assert!(message.contains("unexpected end"));
    }
}
