//! The files table: unique file names mapped to the ids every other row hangs off.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;

use crate::db::Db;
use crate::error::{IngestError, Result, XmlShredError};

/// Opaque identifier of a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A stored file with its element count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub tag_count: u64,
}

/// Resolve a file name to its id
pub fn find_file_id(conn: &Connection, name: &str) -> rusqlite::Result<Option<FileId>> {
    conn.query_row("SELECT id FROM files WHERE name = ?1", params![name], |row| {
        row.get::<_, i64>(0)
    })
    .optional()
    .map(|id| id.map(FileId))
}

/// Insert the files row for `name`.
///
/// The UNIQUE constraint on `files.name` is the final arbiter between
/// concurrent writers; a violation is reported as `DuplicateFile`.
pub fn reserve_file(conn: &Connection, name: &str) -> std::result::Result<FileId, IngestError> {
    match conn.execute("INSERT INTO files (name) VALUES (?1)", params![name]) {
        Ok(_) => Ok(FileId(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Err(IngestError::DuplicateFile(name.to_string())),
        Err(e) => Err(IngestError::Storage(e)),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// All stored files ordered by name
pub fn list_files(conn: &Connection) -> rusqlite::Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT f.id, f.name, COUNT(t.id)
        FROM files f
        LEFT JOIN tags t ON t.file_id = f.id
        GROUP BY f.id, f.name
        ORDER BY f.name
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FileRecord {
            id: FileId(row.get(0)?),
            name: row.get(1)?,
            tag_count: row.get::<_, i64>(2)? as u64,
        })
    })?;
    rows.collect()
}

/// Delete a file by name. Tags and attributes go with it through the
/// foreign key cascade. Returns false when no such file exists.
pub fn delete_file(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let deleted = conn.execute("DELETE FROM files WHERE name = ?1", params![name])?;
    Ok(deleted > 0)
}

/// List stored files on a fresh connection
pub async fn files(db: &Db) -> Result<Vec<FileRecord>> {
    db.with_connection(|conn| list_files(conn).map_err(XmlShredError::from))
        .await
}

/// Delete a stored file on a fresh connection
pub async fn remove_file(db: &Db, name: &str) -> Result<bool> {
    let name = name.to_string();
    let removed = db
        .with_connection(move |conn| delete_file(conn, &name).map_err(XmlShredError::from))
        .await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    fn setup_conn() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        let mut conn = db.open_connection().unwrap();
        migrate::run_migrations(&mut conn).unwrap();
        (conn, temp_dir)
    }

    #[test]
    fn test_reserve_and_find() {
        let (conn, _temp_dir) = setup_conn();

        assert_eq!(find_file_id(&conn, "a.xml").unwrap(), None);
        let id = reserve_file(&conn, "a.xml").unwrap();
        assert_eq!(find_file_id(&conn, "a.xml").unwrap(), Some(id));
        assert_eq!(find_file_id(&conn, "A.xml").unwrap(), None);
    }

    #[test]
    fn test_reserve_duplicate_is_duplicate_file() {
        let (conn, _temp_dir) = setup_conn();

        reserve_file(&conn, "a.xml").unwrap();
        let err = reserve_file(&conn, "a.xml").unwrap_err();
        assert!(matches!(err, IngestError::DuplicateFile(ref name) if name == "a.xml"));
    }

    #[test]
    fn test_list_files_counts_tags() {
        let (conn, _temp_dir) = setup_conn();

        let b = reserve_file(&conn, "b.xml").unwrap();
        reserve_file(&conn, "a.xml").unwrap();
        conn.execute("INSERT INTO tags (name, file_id) VALUES ('root', ?1)", params![b.0]).unwrap();
        conn.execute("INSERT INTO tags (name, file_id) VALUES ('item', ?1)", params![b.0]).unwrap();

        let files = list_files(&conn).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.xml");
        assert_eq!(files[0].tag_count, 0);
        assert_eq!(files[1].name, "b.xml");
        assert_eq!(files[1].tag_count, 2);
    }

    #[test]
    fn test_delete_file() {
        let (conn, _temp_dir) = setup_conn();

        let id = reserve_file(&conn, "a.xml").unwrap();
        conn.execute("INSERT INTO tags (name, file_id) VALUES ('root', ?1)", params![id.0]).unwrap();

        assert!(delete_file(&conn, "a.xml").unwrap());
        assert!(!delete_file(&conn, "a.xml").unwrap());

        let tags: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0)).unwrap();
        assert_eq!(tags, 0);
    }

    #[tokio::test]
    async fn test_async_files_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(|conn| {
            migrate::run_migrations(conn)?;
            reserve_file(conn, "x.xml").map_err(XmlShredError::from)?;
            Ok::<(), XmlShredError>(())
        })
        .await
        .unwrap();

        let listed = files(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(remove_file(&db, "x.xml").await.unwrap());
        assert!(files(&db).await.unwrap().is_empty());
    }
}
