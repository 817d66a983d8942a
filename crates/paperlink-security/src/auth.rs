use paperlink_common::{Error, Result};
use ring::constant_time::verify_slices_are_equal;

/// Phrase an operator must type to confirm a database reset.
pub const RESET_CONFIRM_PHRASE: &str = "RESET";

/// Compare a presented admin token against the configured one in constant
/// time. Length differences still return false, just without an early exit
/// on the content.
pub fn verify_admin_token(expected: &str, presented: &str) -> bool {
    verify_slices_are_equal(expected.as_bytes(), presented.as_bytes()).is_ok()
}

/// Gate for destructive operations: the caller must echo the confirm phrase.
pub fn confirm_destructive(phrase: &str) -> Result<()> {
    if phrase == RESET_CONFIRM_PHRASE {
        Ok(())
    } else {
        Err(Error::Security(format!(
            "destructive action not confirmed: type {RESET_CONFIRM_PHRASE} to proceed"
        )))
    }
}
