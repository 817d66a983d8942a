use paperlink_common::{Error, Result};

/// Validate a backup filename supplied by an operator.
///
/// Backups are addressed by bare filename only; anything that could escape
/// the backup directory is rejected before a path is ever built.
pub fn safe_backup_filename(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("backup filename cannot be empty".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::InvalidInput(format!(
            "invalid backup filename: {name}"
        )));
    }
    if !name.ends_with(".db") {
        return Err(Error::InvalidInput(format!(
            "backup filename must end in .db: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::safe_backup_filename;

    #[test]
    fn accepts_plain_backup_names() {
        assert!(safe_backup_filename("backup_20260830_120000.db").is_ok());
    }

    #[test]
    fn rejects_traversal_attempts() {
        assert!(safe_backup_filename("../paperlink.db").is_err());
        assert!(safe_backup_filename("..\\paperlink.db").is_err());
        assert!(safe_backup_filename("/etc/passwd.db").is_err());
        assert!(safe_backup_filename("dir/name.db").is_err());
    }

    #[test]
    fn rejects_non_database_files() {
        assert!(safe_backup_filename("").is_err());
        assert!(safe_backup_filename("notes.txt").is_err());
    }
}
