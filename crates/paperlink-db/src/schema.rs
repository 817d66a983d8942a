//! The application's migration registry.
//!
//! Seven migrations, applied in declaration order, build the full schema:
//! core tables, settings with seeded defaults, the audit log, per-user
//! settings, storage settings, system variables, and late additions to the
//! documents table. Every procedure is guarded (`IF NOT EXISTS`, `INSERT OR
//! IGNORE`, column-presence checks) so reapplication after an out-of-band
//! ledger edit is harmless.

use rusqlite::{Transaction, params};
use uuid::Uuid;

use crate::migrations::Migration;

/// Default admin credentials seeded on first run. Operators are expected to
/// change this password immediately.
const ADMIN_USERNAME: &str = "admin";
const ADMIN_DEFAULT_PASSWORD: &str = "admin123";

static REGISTRY: [Migration; 7] = [
    Migration {
        name: "create_tables",
        // The admin seed can collide with a pre-existing admin row.
        conflict_tolerant: true,
        apply: create_tables,
    },
    Migration {
        name: "create_settings_table",
        conflict_tolerant: false,
        apply: create_settings_table,
    },
    Migration {
        name: "create_audit_log_table",
        conflict_tolerant: false,
        apply: create_audit_log_table,
    },
    Migration {
        name: "add_user_settings",
        conflict_tolerant: false,
        apply: add_user_settings,
    },
    Migration {
        name: "add_storage_settings",
        conflict_tolerant: false,
        apply: add_storage_settings,
    },
    Migration {
        name: "add_system_variables",
        conflict_tolerant: false,
        apply: add_system_variables,
    },
    Migration {
        name: "update_document_table",
        conflict_tolerant: false,
        apply: update_document_table,
    },
];

/// The fixed, ordered migration registry.
pub fn registry() -> &'static [Migration] {
    &REGISTRY
}

fn seed_err(e: paperlink_common::Error) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(e))
}

fn create_tables(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            email TEXT,
            is_admin INTEGER DEFAULT 0,
            last_login TIMESTAMP,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            filename TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            short_url TEXT NOT NULL UNIQUE,
            qr_code TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            user_uuid TEXT,
            is_public INTEGER DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (user_uuid) REFERENCES users(uuid)
        );

        CREATE TABLE IF NOT EXISTS stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            document_id INTEGER,
            document_uuid TEXT UNIQUE,
            views INTEGER DEFAULT 0,
            downloads INTEGER DEFAULT 0,
            last_view_at DATETIME,
            last_download_at DATETIME,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
            FOREIGN KEY (document_uuid) REFERENCES documents(uuid) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            document_id INTEGER NOT NULL,
            document_uuid TEXT,
            ip_address TEXT,
            user_agent TEXT,
            referer TEXT,
            device_type TEXT,
            country TEXT,
            city TEXT,
            viewed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
            FOREIGN KEY (document_uuid) REFERENCES documents(uuid) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS document_tags (
            document_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            document_uuid TEXT,
            tag_uuid TEXT,
            PRIMARY KEY (document_id, tag_id),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE,
            FOREIGN KEY (document_uuid) REFERENCES documents(uuid) ON DELETE CASCADE,
            FOREIGN KEY (tag_uuid) REFERENCES tags(uuid) ON DELETE CASCADE
        );",
    )?;

    // Seed the default admin user on a fresh database only.
    let existing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![ADMIN_USERNAME],
        |row| row.get(0),
    )?;
    if existing == 0 {
        let password =
            paperlink_security::hash_password(ADMIN_DEFAULT_PASSWORD).map_err(seed_err)?;
        tx.execute(
            "INSERT INTO users (username, password, is_admin, uuid) VALUES (?1, ?2, 1, ?3)",
            params![ADMIN_USERNAME, password, Uuid::new_v4().to_string()],
        )?;
    }

    Ok(())
}

fn create_settings_table(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            setting_key TEXT NOT NULL UNIQUE,
            setting_value TEXT NOT NULL,
            setting_description TEXT,
            setting_type TEXT DEFAULT 'text',
            is_public INTEGER DEFAULT 0,
            is_editable INTEGER DEFAULT 1,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let defaults: &[(&str, &str, &str, &str, i64, i64)] = &[
        ("general.site_title", "Paperlink", "Site Title", "text", 1, 1),
        (
            "general.site_description_short",
            "Modern PDF Sharing Platform",
            "Short Description",
            "text",
            1,
            1,
        ),
        (
            "general.site_description",
            "Share PDF documents with ease. Upload your PDFs and get a secure link immediately.",
            "Site Description",
            "text",
            1,
            1,
        ),
        (
            "general.admin_email",
            "admin@example.com",
            "Admin Email",
            "email",
            0,
            1,
        ),
        (
            "general.items_per_page",
            "10",
            "Items Per Page",
            "number",
            0,
            1,
        ),
        (
            "upload.max_file_size",
            "10485760",
            "Maximum File Size (bytes)",
            "number",
            0,
            1,
        ),
        (
            "security.session_timeout",
            "3600",
            "Session Timeout (seconds)",
            "number",
            0,
            1,
        ),
        (
            "security.max_login_attempts",
            "5",
            "Maximum Login Attempts",
            "number",
            0,
            1,
        ),
        ("qrcode.size", "300", "QR Code Size", "number", 0, 1),
    ];

    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO settings
            (setting_key, setting_value, setting_description, setting_type, is_public, is_editable)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (key, value, description, kind, is_public, is_editable) in defaults {
        stmt.execute(params![key, value, description, kind, is_public, is_editable])?;
    }

    Ok(())
}

fn create_audit_log_table(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE,
            user_id INTEGER,
            user_uuid TEXT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            entity_uuid TEXT,
            details TEXT,
            ip_address TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (user_uuid) REFERENCES users(uuid)
        );",
    )
}

fn add_user_settings(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id),
            UNIQUE(user_id, setting_key)
        );",
    )
}

fn add_storage_settings(tx: &Transaction) -> rusqlite::Result<()> {
    let settings: &[(&str, &str, &str)] = &[
        (
            "storage.max_space",
            "1048576000",
            "Maximum storage space (bytes, default 1000MB)",
        ),
        (
            "storage.warning_threshold",
            "80",
            "Storage warning threshold percentage",
        ),
    ];

    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO settings
            (setting_key, setting_value, setting_description, setting_type, is_public, is_editable)
            VALUES (?1, ?2, ?3, 'number', 0, 1)",
    )?;
    for (key, value, description) in settings {
        stmt.execute(params![key, value, description])?;
    }

    Ok(())
}

fn add_system_variables(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS system_variables (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variable_key TEXT NOT NULL UNIQUE,
            variable_value TEXT,
            description TEXT,
            is_encrypted INTEGER DEFAULT 0,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let variables: [(&str, String, &str); 5] = [
        ("system.last_backup", String::new(), "Last database backup date"),
        (
            "system.installation_id",
            Uuid::new_v4().to_string(),
            "Unique installation identifier",
        ),
        (
            "system.is_maintenance_enabled",
            "0".to_string(),
            "Enable maintenance mode",
        ),
        ("system.installation_date", now, "Installation date"),
        (
            "system.database_version",
            "1.0".to_string(),
            "Database schema version",
        ),
    ];

    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO system_variables (variable_key, variable_value, description)
            VALUES (?1, ?2, ?3)",
    )?;
    for (key, value, description) in &variables {
        stmt.execute(params![key, value, description])?;
    }

    Ok(())
}

fn update_document_table(tx: &Transaction) -> rusqlite::Result<()> {
    if !column_exists(tx, "documents", "download_count")? {
        tx.execute_batch("ALTER TABLE documents ADD COLUMN download_count INTEGER DEFAULT 0")?;
    }
    if !column_exists(tx, "documents", "expiry_date")? {
        tx.execute_batch("ALTER TABLE documents ADD COLUMN expiry_date DATETIME DEFAULT NULL")?;
    }
    Ok(())
}

fn column_exists(tx: &Transaction, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;
    use crate::migrations::{applied_names, run_migrations};

    fn migrated_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_migrations(&mut conn, registry()).unwrap();
        assert!(report.succeeded(), "fresh migration run must succeed");
        conn
    }

    #[test]
    fn fresh_database_applies_all_registry_migrations() {
        let conn = migrated_conn();
        let names = applied_names(&conn).unwrap();
        assert_eq!(names.len(), registry().len());
        assert_eq!(names[0], "create_tables");
        assert_eq!(names[6], "update_document_table");
    }

    #[test]
    fn all_tables_exist_after_migration() {
        let conn = migrated_conn();
        for table in [
            "users",
            "documents",
            "stats",
            "views",
            "tags",
            "document_tags",
            "settings",
            "audit_log",
            "user_settings",
            "system_variables",
            "migrations",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn default_settings_are_seeded() {
        let conn = migrated_conn();
        let per_page: String = conn
            .query_row(
                "SELECT setting_value FROM settings WHERE setting_key = 'general.items_per_page'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(per_page, "10");

        let max_space: String = conn
            .query_row(
                "SELECT setting_value FROM settings WHERE setting_key = 'storage.max_space'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(max_space, "1048576000");
    }

    #[test]
    fn admin_user_is_seeded_with_hashed_password() {
        let conn = migrated_conn();
        let (is_admin, password): (i64, String) = conn
            .query_row(
                "SELECT is_admin, password FROM users WHERE username = 'admin'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(is_admin, 1);
        assert!(paperlink_security::verify_password("admin123", &password));
    }

    #[test]
    fn documents_table_gains_late_columns() {
        let conn = migrated_conn();
        conn.execute_batch(
            "INSERT INTO documents
                (uuid, title, filename, original_filename, file_size, mime_type, short_url,
                 qr_code, user_id, download_count)
             VALUES ('u1', 't', 'f.pdf', 'o.pdf', 10, 'application/pdf', 'abc', 'qr/abc.png', 1, 3)",
        )
        .unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT download_count FROM documents WHERE uuid = 'u1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn reapplication_after_ledger_wipe_is_harmless() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, registry()).unwrap();

        // Operators may delete ledger rows out-of-band; the guarded
        // procedures must tolerate a full rerun.
        conn.execute("DELETE FROM migrations", []).unwrap();
        let report = run_migrations(&mut conn, registry()).unwrap();

        assert!(report.succeeded());
        let admin_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE username='admin'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(admin_count, 1);
    }
}
