pub mod audit;
pub mod documents;
pub mod export;
pub mod maintenance;
pub mod migrations;
pub mod schema;
pub mod settings;
pub mod store;

pub use audit::AuditRecord;
pub use documents::{DocumentUsageRow, NewDocument, StorageReport, StorageUsage};
pub use export::ExportFormat;
pub use maintenance::{BackupInfo, DbStats, TableStats};
pub use migrations::{Migration, MigrationFailure, MigrationReport, MigrationStatus};
pub use settings::Setting;
pub use store::Store;
