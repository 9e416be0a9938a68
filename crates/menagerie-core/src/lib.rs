//! # Menagerie Core
//!
//! Domain engine for the Menagerie zoo management system.
//!
//! Everything the web application decides lives here: the entity model,
//! form validation, the role matrix, password hashing, the redb-backed
//! store, the seeding generator, dashboard statistics and map geometry.
//! The crate has no async and no network code; `apps/menagerie` wraps it
//! in an HTTP server and a CLI.

pub mod authz;
pub mod cache;
pub mod dashboard;
pub mod map;
pub mod model;
pub mod password;
pub mod primitives;
pub mod response;
pub mod seed;
pub mod storage;
pub mod validation;

pub use authz::{Access, Action, RouteDecision, authorize_route};
pub use model::{
    Animal, Habitat, HealthStatus, Role, Sex, Task, TaskPriority, TaskStatus, TaskType, Treatment,
    User,
};
pub use response::{FieldErrors, FormState};
pub use seed::{SeedPlan, SeedReport};
pub use storage::{ActiveSession, Session, StoreStats, TaskFilter, ZooStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by the core.
#[derive(Debug, Error)]
pub enum ZooError {
    /// The underlying database failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored row could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("animal", "task", ...).
        entity: &'static str,
        /// Requested identifier.
        id: u64,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict on {field}: {message}")]
    Conflict {
        /// Form field the conflict belongs to.
        field: &'static str,
        /// Human readable message.
        message: String,
    },

    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input rejected outside of form validation (CLI arguments, seed plans).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<postcard::Error> for ZooError {
    fn from(err: postcard::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, ZooError>;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a staff account.
    UserId
);
id_type!(
    /// Identifier of an animal.
    AnimalId
);
id_type!(
    /// Identifier of a habitat.
    HabitatId
);
id_type!(
    /// Identifier of a medical treatment.
    TreatmentId
);
id_type!(
    /// Identifier of an operational task.
    TaskId
);

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Seconds since the unix epoch, UTC.
///
/// Date-only values (due dates, treatment dates, arrival dates) are stored
/// as midnight UTC of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

/// Seconds in a day.
pub const SECONDS_PER_DAY: i64 = 86_400;

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

const DATETIME_FORMAT: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");

impl Timestamp {
    /// Current wall clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Midnight UTC of the given calendar date.
    #[must_use]
    pub fn from_date(date: time::Date) -> Self {
        Self(date.midnight().assume_utc().unix_timestamp())
    }

    /// Parse a `YYYY-MM-DD` form value.
    pub fn parse_date(value: &str) -> Option<Self> {
        time::Date::parse(value.trim(), DATE_FORMAT)
            .ok()
            .map(Self::from_date)
    }

    /// The UTC date-time for this timestamp.
    pub fn to_datetime(self) -> Option<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp(self.0).ok()
    }

    /// The UTC calendar date for this timestamp.
    pub fn date(self) -> Option<time::Date> {
        self.to_datetime().map(|dt| dt.date())
    }

    /// `YYYY-MM-DD`, or an empty string for out-of-range values.
    #[must_use]
    pub fn format_date(self) -> String {
        self.to_datetime()
            .and_then(|dt| dt.format(DATE_FORMAT).ok())
            .unwrap_or_default()
    }

    /// `YYYY-MM-DD HH:MM`, or an empty string for out-of-range values.
    #[must_use]
    pub fn format_datetime(self) -> String {
        self.to_datetime()
            .and_then(|dt| dt.format(DATETIME_FORMAT).ok())
            .unwrap_or_default()
    }

    /// Shift by a number of seconds (saturating).
    #[must_use]
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds))
    }

    /// Shift by a number of days (saturating).
    #[must_use]
    pub fn plus_days(self, days: i64) -> Self {
        self.plus_seconds(days.saturating_mul(SECONDS_PER_DAY))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_datetime())
    }
}

// =============================================================================
// TESTS
// =============================================================================
