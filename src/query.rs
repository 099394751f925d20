//! Read-only structural queries over shredded files.
//!
//! Every query resolves the file name first, so an unknown file is always
//! `FileNotFound` and never an empty result. Tag names match exactly
//! (binary collation, case-sensitive).

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::Db;
use crate::error::{QueryError, Result, XmlShredError};
use crate::registry::{find_file_id, FileId};

/// Row totals across the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub files: u64,
    pub tags: u64,
    pub attributes: u64,
}

fn require(file_name: &str, tag_name: &str) -> std::result::Result<(), QueryError> {
    if file_name.is_empty() || tag_name.is_empty() {
        return Err(QueryError::MissingParameters(
            "'filename' and 'tag_name' are required".to_string(),
        ));
    }
    Ok(())
}

fn resolve(conn: &Connection, file_name: &str) -> std::result::Result<FileId, QueryError> {
    find_file_id(conn, file_name)?.ok_or_else(|| QueryError::FileNotFound(file_name.to_string()))
}

/// Number of `tag_name` elements in `file_name`. Zero is a valid answer.
pub fn count_tag_in(conn: &Connection, file_name: &str, tag_name: &str) -> std::result::Result<u64, QueryError> {
    require(file_name, tag_name)?;
    let file_id = resolve(conn, file_name)?;

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tags WHERE file_id = ?1 AND name = ?2",
        params![file_id.0, tag_name],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Distinct attribute names carried by any `tag_name` element in `file_name`,
/// sorted lexicographically
pub fn list_attribute_names_in(
    conn: &Connection,
    file_name: &str,
    tag_name: &str,
) -> std::result::Result<Vec<String>, QueryError> {
    require(file_name, tag_name)?;
    let file_id = resolve(conn, file_name)?;

    let mut stmt = conn.prepare_cached(
        r#"
        SELECT DISTINCT a.name
        FROM attributes a
        JOIN tags t ON a.tag_id = t.id
        WHERE t.file_id = ?1 AND t.name = ?2
        ORDER BY a.name
        "#,
    )?;
    let names = stmt
        .query_map(params![file_id.0, tag_name], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

pub fn store_stats_in(conn: &Connection) -> rusqlite::Result<StoreStats> {
    conn.query_row(
        r#"
        SELECT
            (SELECT COUNT(*) FROM files),
            (SELECT COUNT(*) FROM tags),
            (SELECT COUNT(*) FROM attributes)
        "#,
        [],
        |row| {
            Ok(StoreStats {
                files: row.get::<_, i64>(0)? as u64,
                tags: row.get::<_, i64>(1)? as u64,
                attributes: row.get::<_, i64>(2)? as u64,
            })
        },
    )
}

/// [`count_tag_in`] on a fresh connection
pub async fn count_tag(db: &Db, file_name: &str, tag_name: &str) -> std::result::Result<u64, QueryError> {
    let file_name = file_name.to_string();
    let tag_name = tag_name.to_string();
    db.with_connection(move |conn| count_tag_in(conn, &file_name, &tag_name))
        .await
}

/// [`list_attribute_names_in`] on a fresh connection
pub async fn list_attribute_names(
    db: &Db,
    file_name: &str,
    tag_name: &str,
) -> std::result::Result<Vec<String>, QueryError> {
    let file_name = file_name.to_string();
    let tag_name = tag_name.to_string();
    db.with_connection(move |conn| list_attribute_names_in(conn, &file_name, &tag_name))
        .await
}

pub async fn store_stats(db: &Db) -> Result<StoreStats> {
    db.with_connection(|conn| store_stats_in(conn).map_err(XmlShredError::from))
        .await
}
