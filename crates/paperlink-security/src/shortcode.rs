use paperlink_common::{Error, Result};
use ring::rand::{SecureRandom, SystemRandom};

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Default length of generated short codes.
pub const SHORT_CODE_LEN: usize = 8;

/// Generate a random alphanumeric short code for document links.
///
/// Uniqueness is enforced by the database (short_url is UNIQUE); at 8
/// characters over 62 symbols collisions are retry-on-insert rare.
pub fn generate_short_code(len: usize) -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| Error::Security("failed to generate short code".into()))?;

    Ok(bytes
        .iter()
        .map(|b| CHARSET[(*b as usize) % CHARSET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_alphanumeric_and_sized() {
        let code = generate_short_code(SHORT_CODE_LEN).unwrap();
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn codes_differ_between_calls() {
        let a = generate_short_code(SHORT_CODE_LEN).unwrap();
        let b = generate_short_code(SHORT_CODE_LEN).unwrap();
        assert_ne!(a, b);
    }
}
