pub mod models;
pub mod sqlite_repository;

use rusqlite::Connection;
use std::path::Path;

pub use sqlite_repository::SqliteRepository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Item not found")]
    NotFound,
    #[error("Invalid data format: {0}")]
    InvalidData(String),
    #[error("Constraint violated: {0}")]
    Conflict(String),
    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Open a SQLite database at `path` and bring its schema up to date.
pub fn open_database(path: &Path) -> Result<Connection, RepositoryError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open a migrated in-memory database.
pub fn open_memory_database() -> Result<Connection, RepositoryError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

pub fn run_migrations(conn: &Connection) -> Result<(), RepositoryError> {
    let current_version = current_schema_version(conn);

    let migrations: Vec<(i64, &str)> =
        vec![(1, include_str!("../../resources/migrations/001_initial.sql"))];

    for (version, sql) in migrations {
        if version > current_version {
            log::info!("Running migration v{}", version);
            conn.execute_batch(sql)
                .map_err(|e| RepositoryError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// 0 when no schema exists yet.
fn current_schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_has_schema() {
        let conn = open_memory_database().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users', 'profiles', 'diseases', 'detections')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = open_memory_database().unwrap();
        assert!(run_migrations(&conn).is_ok());
        assert_eq!(current_schema_version(&conn), 1);
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
