use chrono::{DateTime, Utc};
use paperlink_common::{Error, Page, Result};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::store::{Store, parse_datetime};

/// Attempts at generating a unique short code before giving up. The code
/// space is large enough that more than one retry means something is wrong.
const SHORT_CODE_ATTEMPTS: usize = 5;

/// A document to register. File contents live outside the store; this is the
/// metadata row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub is_public: bool,
}

/// A registered document, as referenced by short links.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub uuid: String,
    pub title: String,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub short_url: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of the files-by-size table in the storage report.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentUsageRow {
    pub uuid: String,
    pub title: String,
    pub original_filename: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    pub downloads: u64,
}

/// Aggregate storage consumption.
#[derive(Debug, Clone, Serialize)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub file_count: u64,
}

/// The admin storage view: totals against the configured cap plus a page of
/// the largest files.
#[derive(Debug, Clone, Serialize)]
pub struct StorageReport {
    pub usage: StorageUsage,
    pub max_bytes: u64,
    pub percent_used: f64,
    pub warning: bool,
    pub files: Vec<DocumentUsageRow>,
    pub page: u32,
    pub total_pages: u32,
}

impl Store {
    /// Register a document under a fresh UUID and short code. The stored
    /// filename is derived from the UUID so uploads can never collide.
    pub fn add_document(&self, new: NewDocument) -> Result<DocumentRecord> {
        let uuid = Uuid::new_v4().to_string();
        let filename = format!("{uuid}.pdf");

        let conn = self.connection()?;
        for attempt in 0..SHORT_CODE_ATTEMPTS {
            let short_url =
                paperlink_security::generate_short_code(paperlink_security::shortcode::SHORT_CODE_LEN)?;
            let qr_code = format!("qr/{short_url}.png");

            let result = conn.execute(
                "INSERT INTO documents
                    (uuid, title, description, filename, original_filename, file_size,
                     mime_type, short_url, qr_code, user_id, is_public)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)",
                params![
                    uuid,
                    new.title,
                    new.description,
                    filename,
                    new.original_filename,
                    new.file_size as i64,
                    new.mime_type,
                    short_url,
                    qr_code,
                    new.is_public as i64
                ],
            );

            match result {
                Ok(_) => {
                    return Ok(DocumentRecord {
                        uuid,
                        title: new.title,
                        filename,
                        original_filename: new.original_filename,
                        file_size: new.file_size,
                        short_url,
                        is_public: new.is_public,
                        created_at: Utc::now(),
                    });
                }
                // Short code collided; roll a new one.
                Err(rusqlite::Error::SqliteFailure(inner, _))
                    if inner.code == rusqlite::ErrorCode::ConstraintViolation
                        && attempt + 1 < SHORT_CODE_ATTEMPTS => {}
                Err(e) => {
                    return Err(Error::Database(format!("failed to insert document: {e}")));
                }
            }
        }

        Err(Error::Database("could not allocate a unique short code".into()))
    }

    /// Resolve a short code to its document, public documents only.
    pub fn document_by_short_url(&self, short_url: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.connection()?;
        let record = conn
            .query_row(
                "SELECT uuid, title, filename, original_filename, file_size, short_url,
                        is_public, created_at
                 FROM documents WHERE short_url = ?1 AND is_public = 1",
                params![short_url],
                |row| {
                    Ok(DocumentRecord {
                        uuid: row.get(0)?,
                        title: row.get(1)?,
                        filename: row.get(2)?,
                        original_filename: row.get(3)?,
                        file_size: row.get::<_, i64>(4)? as u64,
                        short_url: row.get(5)?,
                        is_public: row.get::<_, i64>(6)? != 0,
                        created_at: parse_datetime(row.get::<_, String>(7)?),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to query document: {e}")))?;
        Ok(record)
    }

    pub fn document_count(&self) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count documents: {e}")))?;
        Ok(count as u64)
    }

    /// Record a view against a document's stats row and the views table.
    pub fn record_view(&self, document_uuid: &str, ip_address: Option<&str>) -> Result<()> {
        let conn = self.connection()?;
        let document_id: i64 = conn
            .query_row(
                "SELECT id FROM documents WHERE uuid = ?1",
                params![document_uuid],
                |row| row.get(0),
            )
            .map_err(|_| Error::NotFound(format!("document {document_uuid}")))?;

        conn.execute(
            "INSERT INTO views (uuid, document_id, document_uuid, ip_address)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                document_id,
                document_uuid,
                ip_address
            ],
        )
        .map_err(|e| Error::Database(format!("failed to record view: {e}")))?;

        conn.execute(
            "INSERT INTO stats (uuid, document_id, document_uuid, views, last_view_at)
             VALUES (?1, ?2, ?3, 1, CURRENT_TIMESTAMP)
             ON CONFLICT(document_uuid)
             DO UPDATE SET views = views + 1, last_view_at = CURRENT_TIMESTAMP",
            params![Uuid::new_v4().to_string(), document_id, document_uuid],
        )
        .map_err(|e| Error::Database(format!("failed to update view stats: {e}")))?;

        Ok(())
    }

    /// Record a download and audit it.
    pub fn record_download(&self, document_uuid: &str) -> Result<()> {
        let title = {
            let conn = self.connection()?;
            let (document_id, title): (i64, String) = conn
                .query_row(
                    "SELECT id, title FROM documents WHERE uuid = ?1",
                    params![document_uuid],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|_| Error::NotFound(format!("document {document_uuid}")))?;

            conn.execute(
                "INSERT INTO stats (uuid, document_id, document_uuid, downloads, last_download_at)
                 VALUES (?1, ?2, ?3, 1, CURRENT_TIMESTAMP)
                 ON CONFLICT(document_uuid)
                 DO UPDATE SET downloads = downloads + 1, last_download_at = CURRENT_TIMESTAMP",
                params![Uuid::new_v4().to_string(), document_id, document_uuid],
            )
            .map_err(|e| Error::Database(format!("failed to update download stats: {e}")))?;
            title
        };

        self.log_activity(
            "download",
            "document",
            document_uuid,
            json!({"title": title}),
        )
    }

    pub fn storage_usage(&self) -> Result<StorageUsage> {
        let conn = self.connection()?;
        let (total_bytes, file_count): (i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(file_size), 0), COUNT(*) FROM documents",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| Error::Database(format!("failed to compute storage usage: {e}")))?;
        Ok(StorageUsage {
            total_bytes: total_bytes as u64,
            file_count: file_count as u64,
        })
    }

    /// Largest files first, with view and download counts.
    pub fn documents_by_size(&self, page: Page) -> Result<Vec<DocumentUsageRow>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT d.uuid, d.title, d.original_filename, d.file_size, d.created_at,
                        (SELECT COUNT(*) FROM views v WHERE v.document_uuid = d.uuid),
                        COALESCE(s.downloads, 0)
                 FROM documents d
                 LEFT JOIN stats s ON d.uuid = s.document_uuid
                 ORDER BY d.file_size DESC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![page.per_page, page.offset()], |row| {
                Ok(DocumentUsageRow {
                    uuid: row.get(0)?,
                    title: row.get(1)?,
                    original_filename: row.get(2)?,
                    file_size: row.get::<_, i64>(3)? as u64,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                    views: row.get::<_, i64>(5)? as u64,
                    downloads: row.get::<_, i64>(6)? as u64,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query documents: {e}")))?;

        let mut documents = Vec::new();
        for row in rows {
            documents
                .push(row.map_err(|e| Error::Database(format!("failed to read document: {e}")))?);
        }
        Ok(documents)
    }

    pub fn storage_report(&self, page: Page) -> Result<StorageReport> {
        let usage = self.storage_usage()?;
        let max_bytes = self.max_storage_bytes();
        let threshold = self.storage_warning_threshold();

        let percent_used = if max_bytes == 0 {
            100.0
        } else {
            ((usage.total_bytes as f64 / max_bytes as f64) * 100.0).clamp(0.0, 100.0)
        };

        let total_pages = page.total_pages(usage.file_count);
        let files = self.documents_by_size(page)?;

        Ok(StorageReport {
            usage,
            max_bytes,
            percent_used,
            warning: percent_used >= threshold,
            files,
            page: page.number,
            total_pages,
        })
    }
}
