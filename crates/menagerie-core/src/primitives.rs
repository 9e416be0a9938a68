//! # Primitives
//!
//! Shared limits and defaults. Form bounds follow the validation rules in
//! [`crate::validation`]; the rest configure sessions and hashing.

/// Default session lifetime in seconds (8 hours).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;

/// Number of resolved sessions kept in memory.
pub const SESSION_CACHE_SIZE: usize = 256;

/// Random bytes in a session token before encoding.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Default number of login attempts allowed per email per minute.
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

/// Argon2 salt length in bytes.
pub const PASSWORD_SALT_BYTES: usize = 16;

/// Maximum treatment notes length in characters.
pub const MAX_TREATMENT_NOTES: usize = 10_000;

/// Maximum habitat capacity.
pub const MAX_HABITAT_CAPACITY: u32 = 100_000;

/// Maximum animal age in years.
pub const MAX_ANIMAL_AGE: u32 = 100;
