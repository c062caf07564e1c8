//! Embedded schema migrations.
//!
//! Each entry in `MIGRATIONS` is applied once, in order, inside its own
//! transaction together with the `schema_version` row that records it.
//! Upgrading a database that already holds data takes an online backup first.

use rusqlite::{params, Connection};

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "baseline",
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        name: "reference seed",
        sql: include_str!("migrations/002_reference_seed.sql"),
    },
];

fn latest_known() -> i32 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Versions recorded in `schema_version`, creating the table on first use.
fn applied_versions(conn: &Connection) -> Result<Vec<i32>, String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Cannot create schema_version: {}", e))?;

    let mut stmt = conn
        .prepare("SELECT version FROM schema_version ORDER BY version")
        .map_err(|e| format!("Cannot read schema_version: {}", e))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i32>(0))
        .map_err(|e| format!("Cannot read schema_version: {}", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Cannot read schema_version: {}", e))
}

/// Copy the database to `<path>.pre-migration.bak`. In-memory databases
/// have nothing worth keeping.
fn snapshot(conn: &Connection) -> Result<(), String> {
    let Some(path) = conn.path().filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let target = format!("{}.pre-migration.bak", path);
    let mut dest = Connection::open(&target)
        .map_err(|e| format!("Cannot open snapshot {}: {}", target, e))?;
    rusqlite::backup::Backup::new(conn, &mut dest)
        .and_then(|backup| backup.step(-1).map(|_| ()))
        .map_err(|e| format!("Snapshot before migration failed: {}", e))?;
    log::info!("Snapshot written to {}", target);
    Ok(())
}

/// Bring the schema up to date. Returns how many migrations ran.
///
/// A database stamped with a version this build does not know was written by
/// a newer release and is left untouched.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    let applied = applied_versions(conn)?;
    if let Some(unknown) = applied.iter().find(|v| **v > latest_known()) {
        return Err(format!(
            "Database is at schema v{} but this build only knows up to v{}; \
             upgrade the catalog service before opening it.",
            unknown,
            latest_known()
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }
    if !applied.is_empty() {
        snapshot(conn)?;
    }

    for migration in &pending {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| format!("Cannot start migration v{}: {}", migration.version, e))?;
        tx.execute_batch(migration.sql)
            .and_then(|_| {
                tx.execute(
                    "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
                    params![migration.version, migration.name],
                )
            })
            .map_err(|e| format!("Migration v{} ({}) failed: {}", migration.version, migration.name, e))?;
        tx.commit()
            .map_err(|e| format!("Cannot commit migration v{}: {}", migration.version, e))?;
        log::info!("Schema migrated to v{} ({})", migration.version, migration.name);
    }

    Ok(pending.len())
}
