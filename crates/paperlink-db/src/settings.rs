use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use paperlink_common::{Error, Result};
use rusqlite::params;
use serde::Serialize;

use crate::store::{Store, parse_datetime};

/// An application setting row.
#[derive(Debug, Clone, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub setting_type: String,
    pub is_public: bool,
    pub is_editable: bool,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    /// Category prefix of the dotted key ("storage.max_space" -> "storage").
    pub fn category(&self) -> &str {
        self.key.split('.').next().unwrap_or(&self.key)
    }
}

impl Store {
    pub fn setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT setting_value FROM settings WHERE setting_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .ok();
        Ok(value)
    }

    /// Update a setting. Unknown keys and non-editable settings are rejected;
    /// the caller finds out per key instead of a silent no-op.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        let editable: Option<bool> = conn
            .query_row(
                "SELECT is_editable FROM settings WHERE setting_key = ?1",
                params![key],
                |row| row.get::<_, i64>(0).map(|v| v != 0),
            )
            .ok();

        match editable {
            None => Err(Error::NotFound(format!("setting {key}"))),
            Some(false) => Err(Error::InvalidInput(format!("setting {key} is not editable"))),
            Some(true) => {
                conn.execute(
                    "UPDATE settings SET setting_value = ?1, updated_at = CURRENT_TIMESTAMP
                     WHERE setting_key = ?2",
                    params![value, key],
                )
                .map_err(|e| Error::Database(format!("failed to update setting: {e}")))?;
                Ok(())
            }
        }
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT setting_key, setting_value, setting_description, setting_type,
                        is_public, is_editable, updated_at
                 FROM settings ORDER BY setting_key",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Setting {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    description: row.get(2)?,
                    setting_type: row.get(3)?,
                    is_public: row.get::<_, i64>(4)? != 0,
                    is_editable: row.get::<_, i64>(5)? != 0,
                    updated_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query settings: {e}")))?;

        let mut settings = Vec::new();
        for row in rows {
            settings
                .push(row.map_err(|e| Error::Database(format!("failed to read setting: {e}")))?);
        }
        Ok(settings)
    }

    /// Settings grouped by category prefix, for the admin settings view.
    pub fn settings_by_category(&self) -> Result<BTreeMap<String, Vec<Setting>>> {
        let mut grouped: BTreeMap<String, Vec<Setting>> = BTreeMap::new();
        for setting in self.list_settings()? {
            grouped
                .entry(setting.category().to_string())
                .or_default()
                .push(setting);
        }
        Ok(grouped)
    }

    pub fn items_per_page(&self) -> u32 {
        self.setting("general.items_per_page")
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10)
    }

    pub fn max_storage_bytes(&self) -> u64 {
        self.setting("storage.max_space")
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_048_576_000)
    }

    pub fn storage_warning_threshold(&self) -> f64 {
        self.setting("storage.warning_threshold")
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(80.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_settings_are_readable() {
        let store = Store::in_memory().unwrap();
        assert_eq!(
            store.setting("general.site_title").unwrap().as_deref(),
            Some("Paperlink")
        );
        assert_eq!(store.items_per_page(), 10);
        assert_eq!(store.max_storage_bytes(), 1_048_576_000);
    }

    #[test]
    fn update_round_trips() {
        let store = Store::in_memory().unwrap();
        store.set_setting("general.items_per_page", "25").unwrap();
        assert_eq!(store.items_per_page(), 25);
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = Store::in_memory().unwrap();
        let err = store.set_setting("general.bogus", "x").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn non_editable_settings_are_rejected() {
        let store = Store::in_memory().unwrap();
        {
            let conn = store.connection().unwrap();
            conn.execute(
                "UPDATE settings SET is_editable = 0 WHERE setting_key = 'qrcode.size'",
                [],
            )
            .unwrap();
        }
        let err = store.set_setting("qrcode.size", "600").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.setting("qrcode.size").unwrap().as_deref(), Some("300"));
    }

    #[test]
    fn settings_group_by_dotted_prefix() {
        let store = Store::in_memory().unwrap();
        let grouped = store.settings_by_category().unwrap();
        assert!(grouped.contains_key("general"));
        assert!(grouped.contains_key("storage"));
        assert_eq!(grouped["storage"].len(), 2);
    }
}
