//! # Storage Module
//!
//! Durable zoo records in an embedded redb database.
//!
//! redb provides:
//! - ACID transactions (every multi-row change commits or rolls back whole)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent page renders, single writer)
//!
//! Rows are postcard-encoded and keyed by sequential ids. Uniqueness that a
//! relational schema would enforce (user email, habitat number, animal name
//! plus species) is checked inside the same write transaction that mutates
//! the row.

mod redb_store;

pub use redb_store::ZooStore;

use crate::cache::CacheStats;
use crate::model::User;
use crate::{Timestamp, UserId, ZooError};
use serde::{Deserialize, Serialize};

// =============================================================================
// SESSIONS
// =============================================================================

/// A login session as stored in the sessions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque cookie value.
    pub token: String,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// A live session joined with its user.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session: Session,
    pub user: User,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Which tasks a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    CreatedBy(UserId),
    AssignedTo(UserId),
}

/// Row counts and cache counters, reported by `menagerie status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: u64,
    pub animals: u64,
    pub habitats: u64,
    pub treatments: u64,
    pub tasks: u64,
    pub sessions: u64,
    pub session_cache: CacheStats,
}

impl StoreStats {
    /// Whether the zoo holds no records at all. Sessions do not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users == 0
            && self.animals == 0
            && self.habitats == 0
            && self.treatments == 0
            && self.tasks == 0
    }
}

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

macro_rules! storage_error {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for ZooError {
                fn from(err: $source) -> Self {
                    Self::Storage(err.to_string())
                }
            }
        )+
    };
}

storage_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
