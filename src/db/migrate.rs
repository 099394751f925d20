//! Schema management: embedded, versioned migrations applied on every start.

use rusqlite::{params, Connection};
use crate::error::{Result, XmlShredError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Files own tags, tags own attributes. Both links cascade on delete so that
/// removing a file removes everything shredded from it.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_core_tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS attributes (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                value TEXT,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        name: "002_lookup_indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_tags_file_name ON tags(file_id, name);
            CREATE INDEX IF NOT EXISTS idx_attributes_tag ON attributes(tag_id);
        "#,
    },
];

/// Tables the store cannot work without
pub const REQUIRED_TABLES: &[&str] = &["attributes", "files", "schema_migrations", "tags"];

/// Indexes created by `002_lookup_indexes`
pub const REQUIRED_INDEXES: &[&str] = &["idx_attributes_tag", "idx_tags_file_name"];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Run all pending migrations. Safe to call on every process start.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            XmlShredError::Config(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    Ok(())
}

fn sqlite_master_names(conn: &Connection, kind: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")?;
    let names = stmt
        .query_map([kind], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Verify that all expected database objects exist and the file is sound
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let tables = sqlite_master_names(conn, "table")?;
    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|name| name == t))
        .collect();
    if !missing.is_empty() {
        return Err(XmlShredError::Config(format!("Missing tables: {}", missing.join(", "))));
    }

    let indexes = sqlite_master_names(conn, "index")?;
    for index_name in REQUIRED_INDEXES {
        if indexes.iter().any(|i| i == index_name) {
            log::debug!("✓ Index exists: {}", index_name);
        } else {
            log::warn!("Index not found: {} (queries will fall back to scans)", index_name);
        }
    }

    let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(XmlShredError::Config("Foreign keys not enabled".to_string()));
    }

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if integrity != "ok" {
        return Err(XmlShredError::Config(format!(
            "Database integrity check failed: {}",
            integrity
        )));
    }

    log::info!("✓ Database schema verification complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_test_db(temp_dir: &TempDir) -> Connection {
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migration_tracking() {
        let temp_dir = TempDir::new().unwrap();
        let conn = open_test_db(&temp_dir);

        ensure_migrations_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![1, "001_test"],
        )
        .unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert!(applied.contains(&"001_test".to_string()));
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open_test_db(&temp_dir);

        run_migrations(&mut conn).unwrap();

        let tables = sqlite_master_names(&conn, "table").unwrap();
        for table in REQUIRED_TABLES {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
        let indexes = sqlite_master_names(&conn, "index").unwrap();
        for index in REQUIRED_INDEXES {
            assert!(indexes.contains(&index.to_string()), "missing index {}", index);
        }
        verify_schema(&conn).unwrap();
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open_test_db(&temp_dir);

        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert_eq!(applied, vec!["001_core_tables", "002_lookup_indexes"]);
    }

    #[test]
    fn test_file_name_unique_at_store_level() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open_test_db(&temp_dir);
        run_migrations(&mut conn).unwrap();

        conn.execute("INSERT INTO files (name) VALUES ('a.xml')", []).unwrap();
        let err = conn.execute("INSERT INTO files (name) VALUES ('a.xml')", []).unwrap_err();
        assert_eq!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::ConstraintViolation));
    }

    #[test]
    fn test_cascade_delete() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open_test_db(&temp_dir);
        run_migrations(&mut conn).unwrap();

        conn.execute("INSERT INTO files (id, name) VALUES (1, 'a.xml')", []).unwrap();
        conn.execute("INSERT INTO tags (id, name, file_id) VALUES (10, 'root', 1)", []).unwrap();
        conn.execute(
            "INSERT INTO attributes (name, value, tag_id) VALUES ('x', '1', 10)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM files WHERE id = 1", []).unwrap();

        let tags: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0)).unwrap();
        let attrs: i64 = conn.query_row("SELECT COUNT(*) FROM attributes", [], |r| r.get(0)).unwrap();
        assert_eq!(tags, 0);
        assert_eq!(attrs, 0);
    }

    #[test]
    fn test_dangling_tag_reference_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = open_test_db(&temp_dir);
        run_migrations(&mut conn).unwrap();

        let result = conn.execute("INSERT INTO tags (name, file_id) VALUES ('root', 42)", []);
        assert!(result.is_err());
    }
}
