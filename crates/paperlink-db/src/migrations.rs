//! Schema migration registry, runner, and ledger.
//!
//! Migrations are named, one-way schema or seed mutations applied at most
//! once. The ledger table records which names have been applied; the pending
//! set is the registry-order list of names absent from the ledger. Each
//! pending migration runs in its own transaction: either its whole effect and
//! its ledger row commit together, or neither does.
//!
//! A migration that seeds data can declare `conflict_tolerant: true`, meaning
//! a uniqueness violation is an expected consequence of pre-existing rows.
//! Such a failure rolls the migration back and the run continues; every other
//! failure halts the run immediately. Classification is declared per
//! migration, never inferred from driver error text.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use paperlink_common::{Error, Result};
use rusqlite::{Connection, Transaction, params};
use serde::Serialize;
use tracing::{error, info, warn};

/// A single registered migration.
pub struct Migration {
    pub name: &'static str,
    /// Uniqueness conflicts raised by this migration are expected when the
    /// seeded data already exists; roll back and continue past them.
    pub conflict_tolerant: bool,
    pub apply: fn(&Transaction) -> rusqlite::Result<()>,
}

/// The migration that stopped a run, with the driver's reason.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Option<MigrationFailure>,
}

impl MigrationReport {
    /// A run succeeds when no fatal error occurred; benign skips still count
    /// as success.
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }

    /// Number of pending migrations the runner acted on.
    pub fn attempted(&self) -> usize {
        self.applied.len() + self.skipped.len() + usize::from(self.failed.is_some())
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("Applied {} migrations", self.applied.len());
        if !self.skipped.is_empty() {
            summary.push_str(&format!(" ({} skipped)", self.skipped.len()));
        }
        if let Some(failure) = &self.failed {
            summary.push_str(&format!(", halted at '{}'", failure.name));
        }
        summary
    }
}

/// Registry name joined with its ledger entry, for the admin display.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Create the ledger table if it doesn't exist.
pub fn ensure_ledger(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            migration_name TEXT NOT NULL UNIQUE,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .map_err(|e| Error::Database(format!("failed to create migrations table: {e}")))?;
    Ok(())
}

/// Applied migration names in ledger insertion order.
pub fn applied_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT migration_name FROM migrations ORDER BY id")
        .map_err(|e| Error::Database(format!("failed to prepare ledger query: {e}")))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))?);
    }
    Ok(names)
}

/// Apply all pending migrations from `registry`, in registry order.
///
/// Returns a report naming what was applied, what was skipped as a benign
/// conflict, and the migration that halted the run, if any. The ledger
/// reflects exactly the migrations that committed; a re-invocation retries
/// only the remaining pending set.
pub fn run_migrations(conn: &mut Connection, registry: &[Migration]) -> Result<MigrationReport> {
    ensure_ledger(conn)?;

    let applied: HashSet<String> = applied_names(conn)?.into_iter().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut report = MigrationReport::default();

    for migration in registry {
        if !seen.insert(migration.name) {
            // Registry misconfiguration; skip the duplicate, keep going.
            warn!("duplicate migration name in registry: {}", migration.name);
            continue;
        }
        if applied.contains(migration.name) {
            continue;
        }

        let outcome = apply_one(conn, migration);
        match outcome {
            Ok(()) => {
                info!("applied migration: {}", migration.name);
                report.applied.push(migration.name.to_string());
            }
            Err(e) if migration.conflict_tolerant && is_constraint_violation(&e) => {
                warn!(
                    "migration {} hit an expected uniqueness conflict, skipping: {e}",
                    migration.name
                );
                report.skipped.push(migration.name.to_string());
            }
            Err(e) => {
                error!("migration {} failed, halting run: {e}", migration.name);
                report.failed = Some(MigrationFailure {
                    name: migration.name.to_string(),
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    Ok(report)
}

/// Every registry name with its applied timestamp, in registry order.
pub fn statuses(conn: &Connection, registry: &[Migration]) -> Result<Vec<MigrationStatus>> {
    ensure_ledger(conn)?;

    let mut stmt = conn
        .prepare("SELECT migration_name, applied_at FROM migrations")
        .map_err(|e| Error::Database(format!("failed to prepare ledger query: {e}")))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;

    let mut applied_at: HashMap<String, DateTime<Utc>> = HashMap::new();
    for row in rows {
        let (name, at) =
            row.map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))?;
        applied_at.insert(name, crate::store::parse_datetime(at));
    }

    Ok(registry
        .iter()
        .map(|m| MigrationStatus {
            name: m.name.to_string(),
            applied_at: applied_at.get(m.name).copied(),
        })
        .collect())
}

/// Run one migration and its ledger insert inside a single transaction.
fn apply_one(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    (migration.apply)(&tx)?;
    tx.execute(
        "INSERT INTO migrations (migration_name, applied_at) VALUES (?1, datetime('now'))",
        params![migration.name],
    )?;
    tx.commit()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
