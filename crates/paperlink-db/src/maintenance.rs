//! Database maintenance: backups, restore, reset, and table statistics.
//!
//! Backups use SQLite's online backup API against the live connection, so
//! they are consistent without stopping the service. Restore runs in the
//! other direction, replacing the live database contents page by page.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use paperlink_common::{Error, Result};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::store::Store;

const BACKUP_PAGES_PER_STEP: std::os::raw::c_int = 64;
const BACKUP_PAUSE: Duration = Duration::from_millis(50);

/// Row counts for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub name: String,
    pub row_count: u64,
}

/// Snapshot of a database's structure and size.
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub tables: Vec<TableStats>,
    pub total_rows: u64,
    pub file_size: Option<u64>,
}

/// A backup file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub created: DateTime<Utc>,
}

impl Store {
    /// Write a consistent snapshot of the live database into `backup_dir`.
    pub fn backup(&self, backup_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(backup_dir)?;
        let path = available_backup_path(backup_dir);

        {
            let conn = self.connection()?;
            let mut dst = Connection::open(&path)
                .map_err(|e| Error::Database(format!("failed to create backup file: {e}")))?;
            let backup = Backup::new(&conn, &mut dst)
                .map_err(|e| Error::Database(format!("failed to start backup: {e}")))?;
            backup
                .run_to_completion(BACKUP_PAGES_PER_STEP, BACKUP_PAUSE, None)
                .map_err(|e| Error::Database(format!("backup failed: {e}")))?;

            conn.execute(
                "UPDATE system_variables
                 SET variable_value = datetime('now'), updated_at = CURRENT_TIMESTAMP
                 WHERE variable_key = 'system.last_backup'",
                [],
            )
            .map_err(|e| Error::Database(format!("failed to update last backup time: {e}")))?;
        }

        info!("database backed up to {}", path.display());
        self.log_activity(
            "backup_database",
            "system",
            "database",
            json!({"file": path.file_name().and_then(|n| n.to_str())}),
        )?;
        Ok(path)
    }

    /// Replace the live database contents with a backup file's.
    pub fn restore(&self, backup_path: &Path) -> Result<()> {
        if !backup_path.is_file() {
            return Err(Error::NotFound(format!(
                "backup file {}",
                backup_path.display()
            )));
        }

        let src = Connection::open_with_flags(backup_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| Error::Database(format!("failed to open backup file: {e}")))?;

        {
            let mut conn = self.connection()?;
            let backup = Backup::new(&src, &mut conn)
                .map_err(|e| Error::Database(format!("failed to start restore: {e}")))?;
            backup
                .run_to_completion(BACKUP_PAGES_PER_STEP, BACKUP_PAUSE, None)
                .map_err(|e| Error::Database(format!("restore failed: {e}")))?;
        }

        info!("database restored from {}", backup_path.display());
        self.log_activity(
            "restore_database",
            "system",
            "database",
            json!({"file": backup_path.file_name().and_then(|n| n.to_str())}),
        )?;
        Ok(())
    }

    /// Reset to a freshly migrated schema. A backup is always taken first;
    /// its path is returned.
    pub fn reset(&self, backup_dir: &Path) -> Result<PathBuf> {
        let backup_path = self.backup(backup_dir)?;

        {
            let conn = self.connection()?;
            conn.execute_batch("PRAGMA foreign_keys=OFF;")
                .map_err(|e| Error::Database(format!("failed to disable foreign keys: {e}")))?;

            for table in user_tables(&conn)? {
                conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table)))
                    .map_err(|e| Error::Database(format!("failed to drop {table}: {e}")))?;
            }

            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| Error::Database(format!("failed to re-enable foreign keys: {e}")))?;
        }

        let report = self.run_pending()?;
        if !report.succeeded() {
            return Err(Error::Database(format!(
                "schema rebuild after reset halted: {}",
                report.summary()
            )));
        }

        info!("database reset, backup at {}", backup_path.display());
        self.log_activity(
            "reset_database",
            "system",
            "database",
            json!({"backup": backup_path.file_name().and_then(|n| n.to_str())}),
        )?;
        Ok(backup_path)
    }

    /// Structure and size of the live database.
    pub fn db_stats(&self) -> Result<DbStats> {
        let conn = self.connection()?;
        let mut stats = stats_of(&conn)?;
        stats.file_size = self
            .db_path()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());
        Ok(stats)
    }

    /// Delete a backup file by bare filename; traversal is rejected.
    pub fn delete_backup(&self, backup_dir: &Path, filename: &str) -> Result<()> {
        paperlink_security::safe_backup_filename(filename)?;
        let path = backup_dir.join(filename);
        if !path.is_file() {
            return Err(Error::NotFound(format!("backup {filename}")));
        }
        std::fs::remove_file(&path)?;

        self.log_activity(
            "delete_backup",
            "system",
            "database",
            json!({"file": filename}),
        )?;
        Ok(())
    }
}

/// Structure and row counts of an arbitrary backup file, opened read-only.
pub fn stats_from_file(path: &Path) -> Result<DbStats> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::Database(format!("failed to open {}: {e}", path.display())))?;
    let mut stats = stats_of(&conn)?;
    stats.file_size = std::fs::metadata(path).ok().map(|m| m.len());
    Ok(stats)
}

/// Backup files in `dir`, newest first. A missing directory is an empty list.
pub fn list_backups(dir: &Path) -> Result<Vec<BackupInfo>> {
    let mut backups = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            continue;
        }
        let metadata = entry.metadata()?;
        let created = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        backups.push(BackupInfo {
            filename: entry.file_name().to_string_lossy().into_owned(),
            path,
            size: metadata.len(),
            created,
        });
    }

    backups.sort_by(|a, b| b.created.cmp(&a.created).then(b.filename.cmp(&a.filename)));
    Ok(backups)
}

fn user_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to read tables: {e}")))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::Database(format!("failed to read tables: {e}")))?;
    Ok(names)
}

fn stats_of(conn: &Connection) -> Result<DbStats> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to read tables: {e}")))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::Database(format!("failed to read tables: {e}")))?;

    let mut tables = Vec::with_capacity(names.len());
    let mut total_rows = 0u64;
    for name in names {
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count {name}: {e}")))?;
        total_rows += count as u64;
        tables.push(TableStats {
            name,
            row_count: count as u64,
        });
    }

    Ok(DbStats {
        tables,
        total_rows,
        file_size: None,
    })
}

fn available_backup_path(dir: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let base = dir.join(format!("backup_{stamp}.db"));
    if !base.exists() {
        return base;
    }
    // Same-second backups get a numeric suffix.
    for n in 1.. {
        let candidate = dir.join(format!("backup_{stamp}_{n}.db"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use paperlink_common::Page;
    use uuid::Uuid;

    use super::*;
    use crate::documents::NewDocument;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("paperlink-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_doc(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            description: None,
            original_filename: format!("{title}.pdf"),
            file_size: 1234,
            mime_type: "application/pdf".to_string(),
            is_public: true,
        }
    }

    #[test]
    fn backup_creates_snapshot_and_updates_marker() {
        let store = Store::in_memory().unwrap();
        store.add_document(sample_doc("doc")).unwrap();
        let dir = temp_dir();

        let path = store.backup(&dir).unwrap();
        assert!(path.is_file());

        let stats = stats_from_file(&path).unwrap();
        let docs = stats.tables.iter().find(|t| t.name == "documents").unwrap();
        assert_eq!(docs.row_count, 1);

        let marker = {
            let conn = store.connection().unwrap();
            conn.query_row(
                "SELECT variable_value FROM system_variables
                 WHERE variable_key = 'system.last_backup'",
                [],
                |row| row.get::<_, String>(0),
            )
            .unwrap()
        };
        assert!(!marker.is_empty());
    }

    #[test]
    fn restore_replaces_live_contents() {
        let dir = temp_dir();

        let source = Store::in_memory().unwrap();
        source.add_document(sample_doc("kept")).unwrap();
        let backup = source.backup(&dir).unwrap();

        let target = Store::in_memory().unwrap();
        assert_eq!(target.document_count().unwrap(), 0);

        target.restore(&backup).unwrap();
        assert_eq!(target.document_count().unwrap(), 1);
        let rows = target.documents_by_size(Page::default()).unwrap();
        assert_eq!(rows[0].title, "kept");
    }

    #[test]
    fn restore_of_missing_file_is_not_found() {
        let store = Store::in_memory().unwrap();
        let err = store.restore(Path::new("/nonexistent/backup.db")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn reset_wipes_data_and_rebuilds_schema() {
        let store = Store::in_memory().unwrap();
        store.add_document(sample_doc("gone")).unwrap();
        let dir = temp_dir();

        let backup = store.reset(&dir).unwrap();
        assert!(backup.is_file());

        assert_eq!(store.document_count().unwrap(), 0);
        let statuses = store.migration_statuses().unwrap();
        assert!(statuses.iter().all(|s| s.is_applied()));

        // The pre-reset data survives in the automatic backup.
        let stats = stats_from_file(&backup).unwrap();
        let docs = stats.tables.iter().find(|t| t.name == "documents").unwrap();
        assert_eq!(docs.row_count, 1);
    }

    #[test]
    fn backups_are_listed_and_deletable() {
        let store = Store::in_memory().unwrap();
        let dir = temp_dir();

        let path = store.backup(&dir).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();

        let listed = list_backups(&dir).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, name);
        assert!(listed[0].size > 0);

        store.delete_backup(&dir, &name).unwrap();
        assert!(list_backups(&dir).unwrap().is_empty());
        assert!(matches!(
            store.delete_backup(&dir, &name).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn delete_backup_rejects_traversal() {
        let store = Store::in_memory().unwrap();
        let dir = temp_dir();
        let err = store.delete_backup(&dir, "../paperlink.db").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn listing_a_missing_directory_is_empty() {
        let dir = temp_dir().join("does-not-exist");
        assert!(list_backups(&dir).unwrap().is_empty());
    }

    #[test]
    fn db_stats_cover_all_user_tables() {
        let store = Store::in_memory().unwrap();
        store.add_document(sample_doc("a")).unwrap();
        let stats = store.db_stats().unwrap();

        let names: Vec<&str> = stats.tables.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"documents"));
        assert!(names.contains(&"settings"));
        assert!(names.contains(&"migrations"));
        assert!(stats.total_rows > 0);
        // In-memory databases have no file.
        assert!(stats.file_size.is_none());
    }
}
