pub mod flatten;
pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Transaction;

pub use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Storage-level failures callers are expected to branch on. Carried inside
/// `anyhow::Error`; recover with `err.downcast_ref::<DbError>()`.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A UNIQUE constraint rejected the write. `constraint` is the
    /// `table.column` list reported by SQLite, e.g. `site_links.url`.
    #[error("unique constraint failed: {constraint}")]
    UniqueViolation { constraint: String },
}

impl DbError {
    pub fn is_unique_on(&self, column: &str) -> bool {
        match self {
            DbError::UniqueViolation { constraint } => {
                constraint.split(", ").any(|c| c == column)
            }
        }
    }
}

/// Turn SQLite UNIQUE / PRIMARY KEY failures into [`DbError::UniqueViolation`],
/// pass everything else through untouched.
pub fn map_constraint(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        let unique = code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
        if unique {
            let constraint = message
                .strip_prefix("UNIQUE constraint failed: ")
                .unwrap_or(message)
                .to_string();
            return DbError::UniqueViolation { constraint }.into();
        }
    }
    err.into()
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, &path.display().to_string())
    }

    /// Fresh private database, used by tests and `JOBTRACK_DB_PATH=:memory:`.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, label: &str) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", label);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`, rolls back
    /// (on drop) when it returns `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_transaction_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.with_tx(|tx| {
            tx.execute("INSERT INTO groups (name) VALUES ('Staff')", [])?;
            anyhow::bail!("boom")
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                let sql = "SELECT COUNT(*) FROM groups WHERE name = 'Staff'";
                Ok(conn.query_row(sql, [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn unique_violation_is_classified() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                conn.execute("INSERT INTO groups (name) VALUES ('Staff')", [])?;
                conn.execute("INSERT INTO groups (name) VALUES ('Staff')", [])
                    .map_err(map_constraint)?;
                Ok(())
            })
            .unwrap_err();

        let db_err = err.downcast_ref::<DbError>().expect("classified");
        assert!(db_err.is_unique_on("groups.name"));
    }
}
