use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use paperlink_common::{Error, Result};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

use crate::migrations::{self, MigrationReport, MigrationStatus};
use crate::schema;

/// Persistent storage for documents, settings, and the audit log.
///
/// Single-writer: one connection behind a mutex. Schema migrations run at
/// open and can be re-invoked on demand; already-applied migrations are
/// skipped via the ledger.
pub struct Store {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        Self::from_connection(conn, Some(db_path.to_path_buf()))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        // Bootstrap behavior: apply pending migrations, but keep serving a
        // partially migrated schema rather than refusing to start.
        let report = store.run_pending()?;
        if !report.succeeded() {
            warn!("migration run halted: {}", report.summary());
        }

        Ok(store)
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("store lock poisoned".into()))
    }

    /// Path of the backing database file; `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Apply pending migrations from the application registry and audit the
    /// run. Safe to re-invoke; an empty pending set is a trivial success.
    pub fn run_pending(&self) -> Result<MigrationReport> {
        let report = {
            let mut conn = self.connection()?;
            migrations::run_migrations(&mut conn, schema::registry())?
        };

        if report.attempted() > 0 {
            // The audit table itself is created by a migration, so this can
            // fail on a halted first run; the report still stands.
            let details = json!({
                "message": report.summary(),
                "success": report.succeeded(),
            });
            if let Err(e) = self.log_activity("MIGRATION", "system", "migration", details) {
                warn!("failed to audit migration run: {e}");
            }
        }

        Ok(report)
    }

    /// Every registry migration with its applied/pending state, registry
    /// order, for the admin display.
    pub fn migration_statuses(&self) -> Result<Vec<MigrationStatus>> {
        let conn = self.connection()?;
        migrations::statuses(&conn, schema::registry())
    }

    /// Ledger contents: applied migration names in application order.
    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        migrations::applied_names(&conn)
    }
}

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
