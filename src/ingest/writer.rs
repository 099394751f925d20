//! Row writer for one file: tags one at a time, attributes in batches.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use std::fmt;

use super::sax::ContentHandler;
use super::tracker::HierarchyTracker;
use crate::error::IngestError;
use crate::registry::FileId;

/// Opaque identifier of a stored element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Build `INSERT INTO attributes ... VALUES (?, ?, ?), ...` for `rows` rows
fn attribute_insert_sql(rows: usize) -> String {
    let mut sql = String::from("INSERT INTO attributes (name, value, tag_id) VALUES ");
    for i in 0..rows {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str("(?, ?, ?)");
    }
    sql
}

/// Writes the rows of a single file.
///
/// Runs on the connection (or transaction) the caller owns; it never commits.
pub struct TagWriter<'c> {
    conn: &'c Connection,
    file_id: FileId,
    batch_rows: usize,
    tags_written: u64,
    attributes_written: u64,
}

impl<'c> TagWriter<'c> {
    pub fn new(conn: &'c Connection, file_id: FileId, batch_rows: usize) -> Self {
        Self {
            conn,
            file_id,
            batch_rows: batch_rows.max(1),
            tags_written: 0,
            attributes_written: 0,
        }
    }

    /// Insert one tag row
    pub fn insert_tag(&mut self, name: &str) -> rusqlite::Result<TagId> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO tags (name, file_id) VALUES (?1, ?2)")?;
        stmt.execute(params![name, self.file_id.0])?;
        self.tags_written += 1;
        Ok(TagId(self.conn.last_insert_rowid()))
    }

    /// Insert all attributes of one element as a single multi-row INSERT.
    ///
    /// Only elements with more than `batch_rows` attributes need more than one
    /// statement.
    pub fn insert_attributes(&mut self, tag: TagId, attributes: &[(String, String)]) -> rusqlite::Result<usize> {
        for batch in attributes.chunks(self.batch_rows) {
            let sql = attribute_insert_sql(batch.len());
            let mut stmt = self.conn.prepare_cached(&sql)?;

            let mut values: Vec<&dyn ToSql> = Vec::with_capacity(batch.len() * 3);
            for (name, value) in batch {
                values.push(name);
                values.push(value);
                values.push(&tag.0);
            }
            stmt.execute(values.as_slice())?;
        }
        self.attributes_written += attributes.len() as u64;
        Ok(attributes.len())
    }

    pub fn tags_written(&self) -> u64 {
        self.tags_written
    }

    pub fn attributes_written(&self) -> u64 {
        self.attributes_written
    }
}

/// Content handler that shreds a document into rows while tracking nesting
pub struct ShredHandler<'c> {
    writer: TagWriter<'c>,
    tracker: HierarchyTracker<TagId>,
}

impl<'c> ShredHandler<'c> {
    pub fn new(writer: TagWriter<'c>) -> Self {
        Self {
            writer,
            tracker: HierarchyTracker::new(),
        }
    }

    pub fn writer(&self) -> &TagWriter<'c> {
        &self.writer
    }

    pub fn tracker(&self) -> &HierarchyTracker<TagId> {
        &self.tracker
    }
}

impl ContentHandler for ShredHandler<'_> {
    fn start_element(&mut self, name: &str, attributes: &[(String, String)]) -> Result<(), IngestError> {
        let tag = self.writer.insert_tag(name)?;
        if !attributes.is_empty() {
            self.writer.insert_attributes(tag, attributes)?;
        }
        self.tracker.on_element_open(name, tag);
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<(), IngestError> {
        self.tracker.on_element_close()?;
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), IngestError> {
        self.tracker.on_text(text);
        Ok(())
    }
}
