//! # Password Hashing
//!
//! Argon2id with the crate's default cost, stored as a PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`). Salts come from the
//! thread-local CSPRNG.

use crate::ZooError;
use crate::primitives::PASSWORD_SALT_BYTES;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use std::sync::OnceLock;

impl From<argon2::password_hash::Error> for ZooError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hashing(err.to_string())
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ZooError> {
    let mut bytes = [0u8; PASSWORD_SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)?;
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string.
///
/// Anything that does not parse is a mismatch. The parameters encoded in the
/// stored string are used, so hashes made with older costs keep verifying.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Run a full verification against a throwaway hash.
///
/// Used when the account does not exist, so a failed sign-in costs the same
/// whether or not the email is registered.
pub fn burn_verification(password: &str) {
    static DUMMY: OnceLock<String> = OnceLock::new();
    let stored = DUMMY.get_or_init(|| hash_password("menagerie-dummy").unwrap_or_default());
    let _ = verify_password(password, stored);
}
