pub mod sax;
pub mod tracker;
pub mod walker;
pub mod writer;
pub mod xmlchar;

pub use sax::{drive, ContentHandler};
pub use tracker::HierarchyTracker;
pub use walker::discover_files;
pub use writer::{ShredHandler, TagId, TagWriter};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::IngestConfig;
use crate::db::Db;
use crate::error::{IngestError, Result, XmlShredError};
use crate::registry::{self, FileId};

/// Tuning knobs for a single ingestion
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Maximum attribute rows per INSERT statement
    pub attribute_batch_rows: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestConfig::default().into()
    }
}

impl From<IngestConfig> for IngestOptions {
    fn from(config: IngestConfig) -> Self {
        Self {
            attribute_batch_rows: config.attribute_batch_rows,
        }
    }
}

/// Reject empty names and names without an `.xml` suffix (any case)
pub fn validate_file_name(file_name: &str) -> std::result::Result<(), IngestError> {
    if file_name.trim().is_empty() {
        return Err(IngestError::InvalidInput("file name is empty".to_string()));
    }
    if !file_name.to_lowercase().ends_with(".xml") {
        return Err(IngestError::InvalidInput(format!(
            "'{}' must have the .xml extension",
            file_name
        )));
    }
    Ok(())
}

/// Ingest one document on a caller-owned connection.
///
/// Everything from the files row to the last attribute is written inside a
/// single IMMEDIATE transaction. It is committed only after the whole stream
/// parsed cleanly; on any error it is rolled back explicitly, so the store is
/// left exactly as it was.
pub fn ingest_into<R: BufRead>(
    conn: &mut Connection,
    file_name: &str,
    source: R,
    options: &IngestOptions,
) -> std::result::Result<FileId, IngestError> {
    validate_file_name(file_name)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    match shred(&tx, file_name, source, options) {
        Ok(file_id) => {
            tx.commit()?;
            Ok(file_id)
        }
        Err(cause) => {
            log::warn!("Ingestion of '{}' failed, rolling back: {}", file_name, cause);
            match tx.rollback() {
                Ok(()) => Err(cause),
                Err(source) => Err(IngestError::Rollback {
                    cause: Box::new(cause),
                    source,
                }),
            }
        }
    }
}

fn shred<R: BufRead>(
    tx: &Transaction<'_>,
    file_name: &str,
    source: R,
    options: &IngestOptions,
) -> std::result::Result<FileId, IngestError> {
    if registry::find_file_id(tx, file_name)?.is_some() {
        return Err(IngestError::DuplicateFile(file_name.to_string()));
    }
    let file_id = registry::reserve_file(tx, file_name)?;

    let writer = TagWriter::new(tx, file_id, options.attribute_batch_rows);
    let mut handler = ShredHandler::new(writer);
    drive(source, &mut handler)?;
    handler.tracker().finish()?;

    log::info!(
        "Ingested '{}' as file {} ({} tags, {} attributes, max depth {})",
        file_name,
        file_id,
        handler.writer().tags_written(),
        handler.writer().attributes_written(),
        handler.tracker().max_depth()
    );
    Ok(file_id)
}

/// Ingest one document on a fresh connection from `db`
pub async fn ingest<R>(db: &Db, file_name: &str, source: R) -> std::result::Result<FileId, IngestError>
where
    R: BufRead + Send + 'static,
{
    ingest_with(db, file_name, source, IngestOptions::default()).await
}

/// Like [`ingest`], with explicit options
pub async fn ingest_with<R>(
    db: &Db,
    file_name: &str,
    source: R,
    options: IngestOptions,
) -> std::result::Result<FileId, IngestError>
where
    R: BufRead + Send + 'static,
{
    let file_name = file_name.to_string();
    db.with_connection(move |conn| ingest_into(conn, &file_name, source, &options))
        .await
}

/// Ingest a document from disk, stored under the path's final component
pub async fn ingest_file(db: &Db, path: &Path, options: IngestOptions) -> Result<FileId> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IngestError::InvalidInput(format!("no usable file name in {}", path.display())))?
        .to_string();
    validate_file_name(&file_name)?;

    let source = BufReader::new(File::open(path).map_err(XmlShredError::Io)?);
    let file_id = ingest_with(db, &file_name, source, options).await?;
    Ok(file_id)
}
