use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

pub mod migrate;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Store handle.
///
/// Holds only the location and connection settings; every operation opens its
/// own connection, so a `Db` can be cloned freely and shared between tasks.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Override how long a connection waits on another writer's lock
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with the store pragmas applied
    pub fn open_connection(&self) -> rusqlite::Result<Connection> {
        connect(&self.path, self.busy_timeout)
    }

    /// Execute a closure with a fresh database connection in a blocking task
    ///
    /// The connection is closed when the closure returns, on both success and
    /// error paths. A panic inside the closure comes back as a "database task
    /// failed" error.
    pub async fn with_connection<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Connection) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<rusqlite::Error> + Send + 'static,
    {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        task::spawn_blocking(move || {
            let mut conn = connect(&path, busy_timeout)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            log::error!("Database task failed: {}", e);
            E::from(rusqlite::Error::ToSqlConversionFailure(
                format!("database task failed: {}", e).into(),
            ))
        })?
    }
}

/// WAL gives readers a stable snapshot while an ingestion transaction is open,
/// and foreign keys must be enabled per connection for the cascades to fire.
fn connect(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XmlShredError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_db_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);

        let result = db
            .with_connection(|conn| {
                conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])?;
                Ok::<(), XmlShredError>(())
            })
            .await;

        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_pragmas_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));

        db.with_connection(|conn| {
            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
            assert_eq!(journal_mode.to_uppercase(), "WAL");

            let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
            assert_eq!(foreign_keys, 1);

            Ok::<(), XmlShredError>(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_reported() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));

        let err = db
            .with_connection(|_conn| -> std::result::Result<(), XmlShredError> { panic!("closure exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, XmlShredError::Database(_)));
        assert!(err.to_string().contains("database task failed"), "{}", err);
    }

    #[test]
    fn test_busy_timeout_override() {
        let db = Db::new("unused.db").with_busy_timeout(Duration::from_millis(10));
        assert_eq!(db.busy_timeout, Duration::from_millis(10));
        assert_eq!(db.path(), Path::new("unused.db"));
    }
}
