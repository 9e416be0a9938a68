//! # Model
//!
//! Entities tracked by the zoo: staff users, animals, habitats, medical
//! treatments and operational tasks.
//!
//! Every enum round-trips through its SCREAMING_CASE label, which is what
//! forms submit and what pages display.

use crate::{AnimalId, HabitatId, TaskId, Timestamp, TreatmentId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// LABELED ENUMS
// =============================================================================

macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire label.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($label => Ok(Self::$variant),)+
                    other => Err(UnknownLabel(other.to_string())),
                }
            }
        }
    };
}

/// A form submitted a label no enum variant carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

labeled_enum!(
    /// Staff role. Ordered by privilege.
    Role {
        /// Keepers and other staff: read access, task status updates.
        Staff => "STAFF",
        /// Managers: full CRUD on zoo records and users.
        Admin => "ADMIN",
        /// Owner account: everything an admin can do, plus the global task view.
        SuperAdmin => "SUPER_ADMIN",
    }
);

labeled_enum!(
    /// Sex of an animal.
    Sex {
        Male => "MALE",
        Female => "FEMALE",
        Unknown => "UNKNOWN",
    }
);

labeled_enum!(
    /// Health assessment of an animal.
    HealthStatus {
        Healthy => "HEALTHY",
        Observation => "OBSERVATION",
        Unhealthy => "UNHEALTHY",
    }
);

labeled_enum!(
    /// Category of an operational task.
    TaskType {
        General => "GENERAL",
        Feeding => "FEEDING",
        Cleaning => "CLEANING",
        Medical => "MEDICAL",
        Maintenance => "MAINTENANCE",
        Transfer => "TRANSFER",
        Inventory => "INVENTORY",
    }
);

labeled_enum!(
    /// Lifecycle state of a task.
    TaskStatus {
        Todo => "TODO",
        InProgress => "IN_PROGRESS",
        Blocked => "BLOCKED",
        Done => "DONE",
        Canceled => "CANCELED",
    }
);

labeled_enum!(
    /// Task urgency.
    TaskPriority {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Urgent => "URGENT",
    }
);

impl Role {
    /// Roles that may be granted through the user forms.
    pub const ASSIGNABLE: &'static [Self] = &[Self::Staff, Self::Admin];
}

impl TaskStatus {
    /// Whether the task still needs work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Done | Self::Canceled)
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A staff account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Always stored lowercase; unique.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Name for display, falling back to the email.
    #[must_use]
    pub fn label(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() { &self.email } else { name }
    }
}

/// An animal in the collection. `(name, species)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub name: String,
    /// Scientific name.
    pub species: String,
    pub common_name: String,
    pub age: u32,
    pub sex: Sex,
    /// Kilograms.
    pub weight: Option<f64>,
    pub image_url: Option<String>,
    pub health_status: HealthStatus,
    pub habitat_id: Option<HabitatId>,
    pub arrival_date: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An enclosure on the zoo map. `number` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habitat {
    pub id: HabitatId,
    pub number: u32,
    pub name: String,
    /// Biome label ("forest", "savanna", ...). Drives the map badge color.
    pub kind: String,
    pub capacity: u32,
    /// Flat polygon outline: x1, y1, x2, y2, ...
    pub coordinates: Vec<i32>,
    /// Fill color on the map.
    pub color: Option<String>,
    pub closed: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A medical treatment recorded against an animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: TreatmentId,
    pub animal_id: AnimalId,
    pub title: String,
    pub notes: Option<String>,
    pub date: Timestamp,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

/// An operational task, optionally linked to an animal, habitat or treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<Timestamp>,
    pub start_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub animal_id: Option<AnimalId>,
    pub habitat_id: Option<HabitatId>,
    pub treatment_id: Option<TreatmentId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    /// Move the task to `status`, stamping lifecycle timestamps.
    ///
    /// `IN_PROGRESS` records the start, `DONE` records completion and `TODO`
    /// clears a previous completion. Other transitions keep timestamps.
    pub fn apply_status(&mut self, status: TaskStatus, now: Timestamp) {
        self.status = status;
        match status {
            TaskStatus::InProgress => self.start_at = Some(now),
            TaskStatus::Done => self.completed_at = Some(now),
            TaskStatus::Todo => self.completed_at = None,
            TaskStatus::Blocked | TaskStatus::Canceled => {}
        }
        self.updated_at = now;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: TaskId(1),
            title: "Feed lions".to_string(),
            description: None,
            kind: TaskType::Feeding,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            start_at: None,
            completed_at: None,
            assigned_to: Some(UserId(2)),
            created_by: UserId(1),
            animal_id: None,
            habitat_id: None,
            treatment_id: None,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    #[test]
    fn labels_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(*status));
        }
        assert_eq!("SUPER_ADMIN".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("super_admin".parse::<Role>().is_err());
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Staff < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
    }

    #[test]
    fn in_progress_stamps_start() {
        let mut t = task();
        t.apply_status(TaskStatus::InProgress, Timestamp(100));
        assert_eq!(t.start_at, Some(Timestamp(100)));
        assert_eq!(t.completed_at, None);
        assert_eq!(t.updated_at, Timestamp(100));
    }

    #[test]
    fn done_then_todo_clears_completion() {
        let mut t = task();
        t.apply_status(TaskStatus::Done, Timestamp(200));
        assert_eq!(t.completed_at, Some(Timestamp(200)));

        t.apply_status(TaskStatus::Todo, Timestamp(300));
        assert_eq!(t.completed_at, None);
        assert_eq!(t.status, TaskStatus::Todo);
    }

    #[test]
    fn blocked_keeps_timestamps() {
        let mut t = task();
        t.apply_status(TaskStatus::InProgress, Timestamp(10));
        t.apply_status(TaskStatus::Blocked, Timestamp(20));
        assert_eq!(t.start_at, Some(Timestamp(10)));
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn active_statuses() {
        assert!(TaskStatus::Blocked.is_active());
        assert!(!TaskStatus::Done.is_active());
        assert!(!TaskStatus::Canceled.is_active());
    }
}
