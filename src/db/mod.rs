//! SQLite-backed persistence gateway for the catalog.
//!
//! One `CatalogDb` wraps one connection. Request handling shares a single
//! instance behind a mutex; the purge job opens its own. Lookups return
//! `Ok(None)` for a missing row and `Err` only when storage itself failed,
//! so callers can tell "not found" from "unavailable".

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub mod types;
pub use types::*;

pub struct CatalogDb {
    conn: Connection,
}

impl CatalogDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::from(e)))?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(E::from(DbError::from(e)));
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `path` and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL lets the purge job write while request handling reads.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Current UTC time in the storage format.
    pub(crate) fn now() -> String {
        Utc::now().to_rfc3339()
    }

    /// Id of the last inserted row on this connection.
    pub(crate) fn last_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Run a single-row query, mapping "no rows" to `None`.
    pub(crate) fn query_opt<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>, DbError>
    where
        P: rusqlite::Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(sql, params, f).optional()?)
    }

    /// Row offset of a zero-based search page. Saturates instead of
    /// overflowing; the services reject pages past `PAGE_MAX` anyway.
    pub(crate) fn page_offset(page: i64) -> i64 {
        page.max(0).saturating_mul(crate::config::limits::PAGE_SIZE)
    }

    /// Count rows in a table matching `column = id`. Table/column names are
    /// always compile-time constants.
    pub(crate) fn count_where(&self, table: &str, column: &str, id: i64) -> Result<i64, DbError> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column);
        Ok(self.conn.query_row(&sql, params![id], |r| r.get(0))?)
    }
}

pub mod aliases;
pub mod brands;
pub mod content;
pub mod history;
pub mod media;
pub mod products;
pub mod reference;
pub mod reports;
pub mod sessions;
pub mod store_products;
pub mod stores;
pub mod tags;
pub mod users;
pub mod verification;

pub use reports::ReportTable;
pub use verification::PurgeCounts;

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::CatalogDb;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// Test temp dirs are cleaned up by the OS. Foreign keys stay on: tests seed
    /// real accounts through `seed_account`.
    pub fn test_db() -> CatalogDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        CatalogDb::open_at(path).expect("Failed to open test database")
    }

    /// Insert a user plus one account with the given alias; returns the account id.
    pub fn seed_account(db: &CatalogDb, alias: &str) -> i64 {
        let user_id = db.create_user().expect("create user");
        let account = db
            .create_user_account(user_id, alias)
            .expect("create account");
        db.register_alias(alias, account.id, crate::entity::EntityType::UserAccount)
            .expect("register alias");
        account.id
    }

    /// Like `seed_account`, but also grants admin.
    pub fn seed_admin(db: &CatalogDb, alias: &str) -> i64 {
        let id = seed_account(db, alias);
        db.grant_admin(id).expect("grant admin");
        id
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_applies_schema() {
        let db = test_db();
        let version: i32 = db
            .conn_ref()
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.conn_ref().execute(
                "INSERT INTO user (creation_timestamp) VALUES (?1)",
                params![CatalogDb::now()],
            )?;
            Err(DbError::Migration("abort".into()))
        });
        assert!(result.is_err());

        let users: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM user", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        let id: i64 = db
            .with_transaction(|tx| -> Result<i64, DbError> { tx.create_user() })
            .unwrap();
        assert!(id > 0);
        assert_eq!(db.count_where("user", "id", id).unwrap(), 1);
    }

    #[test]
    fn test_unique_violation_detected() {
        let db = test_db();
        db.conn_ref()
            .execute(
                "INSERT INTO alias (alias, entity_id, entity_type) VALUES ('dup', 1, 1)",
                [],
            )
            .unwrap();
        let err = db
            .conn_ref()
            .execute(
                "INSERT INTO alias (alias, entity_id, entity_type) VALUES ('dup', 2, 2)",
                [],
            )
            .map_err(DbError::from)
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(!err.is_busy());
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(CatalogDb::page_offset(0), 0);
        assert_eq!(CatalogDb::page_offset(3), 60);
        assert_eq!(CatalogDb::page_offset(i64::MAX), i64::MAX);
        assert_eq!(CatalogDb::page_offset(-1), 0);
    }
}
