pub mod loader;
pub mod model;
pub mod watcher;

pub use loader::ConfigLoader;
pub use model::{AdminConfig, AppConfig, GatewayConfig, StorageConfig};
pub use watcher::ConfigWatcher;
