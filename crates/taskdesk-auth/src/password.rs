//! Password hashing and verification
//!
//! New hashes are Argon2id PHC strings. Bcrypt hashes (`$2a$`, `$2b$`,
//! `$2y$`) carried over from older credential stores are still accepted
//! by [`verify_password`].

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use tracing::warn;

use crate::error::AuthError;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Real Argon2 hash of a throwaway secret, checked when a login names an
/// unknown account so that path costs the same as a wrong password
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("taskdesk-timing-equalizer").unwrap_or_default());

/// Hash a password with Argon2id and a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Check a plaintext password against a stored hash
///
/// Returns `false` on mismatch and on hashes that cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if BCRYPT_PREFIXES.iter().any(|p| stored_hash.starts_with(p)) {
        return match bcrypt::verify(password, stored_hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("Stored bcrypt hash could not be checked: {}", e);
                false
            }
        };
    }

    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash used in place of a missing account's hash
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
    }

    #[test]
    fn test_mutated_password_rejected() {
        let hash = hash_password("correct horse").unwrap();
        assert!(!verify_password("correct hors", &hash));
        assert!(!verify_password("Correct horse", &hash));
        assert!(!verify_password("correct horse ", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn test_bcrypt_hashes_accepted() {
        let hash = bcrypt::hash("legacy-pass", 4).unwrap();
        assert!(verify_password("legacy-pass", &hash));
        assert!(!verify_password("legacy-pas", &hash));
    }

    #[test]
    fn test_garbage_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "$2b$10$truncated"));
    }

    #[test]
    fn test_dummy_hash_never_matches_login_input() {
        assert!(dummy_hash().starts_with("$argon2id$"));
        assert!(!verify_password("admin", dummy_hash()));
    }
}
