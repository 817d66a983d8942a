pub mod error;
pub mod format;
pub mod pagination;

pub use error::{Error, Result};
pub use format::format_bytes;
pub use pagination::Page;
