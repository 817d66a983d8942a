use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration '{name}' failed: {reason}")]
    Migration { name: String, reason: String },

    #[error("security error: {0}")]
    Security(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("locked".into());
        assert_eq!(e.to_string(), "database error: locked");

        let e = Error::Migration {
            name: "create_tables".into(),
            reason: "syntax error".into(),
        };
        assert_eq!(
            e.to_string(),
            "migration 'create_tables' failed: syntax error"
        );

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }
}
