pub mod auth;
pub mod password;
pub mod shortcode;
pub mod validation;

pub use auth::{RESET_CONFIRM_PHRASE, confirm_destructive, verify_admin_token};
pub use password::{hash_password, verify_password};
pub use shortcode::generate_short_code;
pub use validation::safe_backup_filename;
