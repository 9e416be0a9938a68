//! # Authorization
//!
//! Two layers decide what a signed-in user may do:
//!
//! 1. **Route rules**: an ordered table of path patterns evaluated by the
//!    session guard before any handler runs. First match wins.
//! 2. **Actions**: `Role::can(Action)` checked by handlers before mutating,
//!    plus record-level checks (task assignee, treatment creator) that need
//!    the stored row.
//!
//! Pattern syntax: segments separated by `/`; `*` matches exactly one
//! segment, `**` matches zero or more trailing segments.

use crate::model::{Role, Task, Treatment};
use crate::UserId;

// =============================================================================
// ACTIONS
// =============================================================================

/// A mutation or privileged view a handler may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewUsers,
    ManageUsers,
    CreateAnimal,
    UpdateAnimal,
    DeleteAnimal,
    UpdateHabitat,
    CreateTask,
    UpdateTask,
    DeleteTask,
    /// Every task in the zoo.
    ViewAllTasks,
    /// Tasks the caller created.
    ViewCreatedTasks,
    /// Role part only; the caller must also be the assignee.
    ChangeTaskStatus,
    CreateTreatment,
    /// Role part only; the caller must also be the creator.
    DeleteTreatment,
}

const MANAGERS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const OWNER: &[Role] = &[Role::SuperAdmin];
const EVERYONE: &[Role] = &[Role::Staff, Role::Admin, Role::SuperAdmin];

impl Action {
    /// Roles granted this action.
    #[must_use]
    pub const fn roles(self) -> &'static [Role] {
        match self {
            Self::ViewAllTasks => OWNER,
            Self::ChangeTaskStatus => EVERYONE,
            Self::ViewUsers
            | Self::ManageUsers
            | Self::CreateAnimal
            | Self::UpdateAnimal
            | Self::DeleteAnimal
            | Self::UpdateHabitat
            | Self::CreateTask
            | Self::UpdateTask
            | Self::DeleteTask
            | Self::ViewCreatedTasks
            | Self::CreateTreatment
            | Self::DeleteTreatment => MANAGERS,
        }
    }
}

impl Role {
    /// Whether this role is granted `action`.
    #[must_use]
    pub fn can(self, action: Action) -> bool {
        action.roles().contains(&self)
    }
}

/// Only the assignee may move a task between statuses.
#[must_use]
pub fn can_change_status(user: UserId, task: &Task) -> bool {
    task.assigned_to == Some(user)
}

/// Only a manager who recorded the treatment may delete it.
#[must_use]
pub fn can_delete_treatment(user: UserId, role: Role, treatment: &Treatment) -> bool {
    role.can(Action::DeleteTreatment) && treatment.created_by == user
}

// =============================================================================
// ROUTE RULES
// =============================================================================

/// Access class attached to a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone.
    Public,
    /// Anonymous only; signed-in users are sent home.
    GuestOnly,
    /// The site root: sends users home and guests to the login page.
    Root,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in users holding one of these roles.
    Roles(&'static [Role]),
}

/// Outcome of checking a path against the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
    /// Signed in, wrong role.
    Forbidden,
}

impl RouteDecision {
    /// Where a non-`Allow` decision sends the browser.
    #[must_use]
    pub const fn location(self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin => Some("/login"),
            Self::RedirectToHome => Some("/home"),
            Self::Forbidden => Some("/unauthorized"),
        }
    }
}

/// Ordered route table.
pub const ROUTE_RULES: &[(&str, Access)] = &[
    ("/", Access::Root),
    ("/login", Access::GuestOnly),
    ("/unauthorized", Access::Public),
    ("/health", Access::Public),
    ("/static/**", Access::Public),
    ("/home/users/**", Access::Roles(MANAGERS)),
    ("/home/*/create", Access::Roles(MANAGERS)),
    ("/home/*/*/edit", Access::Roles(MANAGERS)),
    ("/home/animals/*/delete", Access::Roles(MANAGERS)),
    ("/home/tasks/*/delete", Access::Roles(MANAGERS)),
    ("/home/animals/*/treatments/**", Access::Roles(MANAGERS)),
    ("/home/**", Access::Authenticated),
    ("/logout", Access::Authenticated),
];

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn matches_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", _)) => true,
        Some((&"*", rest)) => match path.split_first() {
            Some((_, tail)) => matches_segments(rest, tail),
            None => false,
        },
        Some((literal, rest)) => match path.split_first() {
            Some((head, tail)) => head == literal && matches_segments(rest, tail),
            None => false,
        },
    }
}

/// Whether `path` matches `pattern`. Empty segments (doubled or trailing
/// slashes) are ignored on both sides.
#[must_use]
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    matches_segments(&segments(pattern), &segments(path))
}

/// Access class for a path. Unlisted paths are public (they render 404).
#[must_use]
pub fn access_for(path: &str) -> Access {
    ROUTE_RULES
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern, path))
        .map_or(Access::Public, |(_, access)| *access)
}

/// Decide a request for `path` by a caller with `role` (`None` = anonymous).
#[must_use]
pub fn authorize_route(path: &str, role: Option<Role>) -> RouteDecision {
    match (access_for(path), role) {
        (Access::Public, _) => RouteDecision::Allow,
        (Access::GuestOnly, None) => RouteDecision::Allow,
        (Access::GuestOnly, Some(_)) | (Access::Root, Some(_)) => RouteDecision::RedirectToHome,
        (Access::Root, None) | (Access::Authenticated, None) | (Access::Roles(_), None) => {
            RouteDecision::RedirectToLogin
        }
        (Access::Authenticated, Some(_)) => RouteDecision::Allow,
        (Access::Roles(allowed), Some(role)) => {
            if allowed.contains(&role) {
                RouteDecision::Allow
            } else {
                RouteDecision::Forbidden
            }
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// A sidebar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub title: &'static str,
    pub url: &'static str,
    /// Action required to see the entry, if any.
    pub requires: Option<Action>,
}

const NAV_ITEMS: &[NavItem] = &[
    NavItem { title: "Home", url: "/home", requires: None },
    NavItem { title: "Users", url: "/home/users", requires: Some(Action::ViewUsers) },
    NavItem { title: "Animals", url: "/home/animals", requires: None },
    NavItem { title: "Habitats", url: "/home/habitats", requires: None },
    NavItem { title: "Tasks", url: "/home/tasks", requires: None },
    NavItem { title: "Zoo Map", url: "/home/map", requires: None },
];

/// Sidebar entries visible to `role`.
pub fn navigation(role: Role) -> impl Iterator<Item = &'static NavItem> {
    NAV_ITEMS
        .iter()
        .filter(move |item| item.requires.is_none_or(|action| role.can(action)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskPriority, TaskStatus, TaskType};
    use crate::{AnimalId, TaskId, Timestamp, TreatmentId};
    use proptest::prelude::*;

    #[test]
    fn staff_cannot_mutate_records() {
        for action in [
            Action::ViewUsers,
            Action::CreateAnimal,
            Action::DeleteAnimal,
            Action::UpdateHabitat,
            Action::CreateTask,
            Action::CreateTreatment,
        ] {
            assert!(!Role::Staff.can(action), "{action:?}");
            assert!(Role::Admin.can(action), "{action:?}");
            assert!(Role::SuperAdmin.can(action), "{action:?}");
        }
        assert!(Role::Staff.can(Action::ChangeTaskStatus));
    }

    #[test]
    fn only_super_admin_sees_all_tasks() {
        assert!(Role::SuperAdmin.can(Action::ViewAllTasks));
        assert!(!Role::Admin.can(Action::ViewAllTasks));
        assert!(Role::Admin.can(Action::ViewCreatedTasks));
        assert!(!Role::Staff.can(Action::ViewCreatedTasks));
    }

    #[test]
    fn status_change_needs_assignee() {
        let task = Task {
            id: TaskId(1),
            title: "Clean pond".to_string(),
            description: None,
            kind: TaskType::Cleaning,
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            due_date: None,
            start_at: None,
            completed_at: None,
            assigned_to: Some(UserId(5)),
            created_by: UserId(1),
            animal_id: None,
            habitat_id: None,
            treatment_id: None,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        };
        assert!(can_change_status(UserId(5), &task));
        assert!(!can_change_status(UserId(1), &task));
    }

    #[test]
    fn treatment_delete_needs_creator() {
        let treatment = Treatment {
            id: TreatmentId(1),
            animal_id: AnimalId(1),
            title: "Checkup".to_string(),
            notes: None,
            date: Timestamp(0),
            created_by: UserId(2),
            created_at: Timestamp(0),
        };
        assert!(can_delete_treatment(UserId(2), Role::Admin, &treatment));
        assert!(!can_delete_treatment(UserId(3), Role::Admin, &treatment));
        assert!(!can_delete_treatment(UserId(2), Role::Staff, &treatment));
    }

    #[test]
    fn pattern_wildcards() {
        assert!(pattern_matches("/home/**", "/home"));
        assert!(pattern_matches("/home/**", "/home/animals/3"));
        assert!(pattern_matches("/home/*/create", "/home/tasks/create"));
        assert!(!pattern_matches("/home/*/create", "/home/create"));
        assert!(pattern_matches("/home/*/*/edit", "/home/habitats/2/edit/"));
        assert!(pattern_matches("/", "/"));
        assert!(!pattern_matches("/", "/login"));
    }

    #[test]
    fn root_redirects_by_session() {
        assert_eq!(authorize_route("/", None), RouteDecision::RedirectToLogin);
        assert_eq!(
            authorize_route("/", Some(Role::Staff)),
            RouteDecision::RedirectToHome
        );
    }

    #[test]
    fn login_is_guest_only() {
        assert_eq!(authorize_route("/login", None), RouteDecision::Allow);
        assert_eq!(
            authorize_route("/login", Some(Role::Admin)),
            RouteDecision::RedirectToHome
        );
    }

    #[test]
    fn staff_is_kept_out_of_management_pages() {
        for path in [
            "/home/users",
            "/home/users/4/edit",
            "/home/animals/create",
            "/home/animals/3/edit",
            "/home/animals/3/delete",
            "/home/animals/3/treatments",
            "/home/animals/3/treatments/9/delete",
            "/home/habitats/2/edit",
            "/home/tasks/create",
            "/home/tasks/8/delete",
        ] {
            assert_eq!(
                authorize_route(path, Some(Role::Staff)),
                RouteDecision::Forbidden,
                "{path}"
            );
            assert_eq!(authorize_route(path, Some(Role::Admin)), RouteDecision::Allow);
            assert_eq!(authorize_route(path, None), RouteDecision::RedirectToLogin);
        }
    }

    #[test]
    fn staff_reaches_read_pages_and_status_changes() {
        for path in [
            "/home",
            "/home/animals",
            "/home/animals/3",
            "/home/habitats",
            "/home/tasks/8",
            "/home/tasks/8/status",
            "/home/map",
            "/logout",
        ] {
            assert_eq!(authorize_route(path, Some(Role::Staff)), RouteDecision::Allow, "{path}");
        }
    }

    #[test]
    fn unknown_paths_are_public() {
        assert_eq!(authorize_route("/nope", None), RouteDecision::Allow);
        assert_eq!(access_for("/static/app.css"), Access::Public);
    }

    #[test]
    fn sidebar_hides_users_from_staff() {
        let staff: Vec<_> = navigation(Role::Staff).map(|i| i.title).collect();
        assert!(!staff.contains(&"Users"));
        assert_eq!(staff.len(), 5);

        let admin: Vec<_> = navigation(Role::Admin).map(|i| i.title).collect();
        assert!(admin.contains(&"Users"));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    proptest! {
        #[test]
        fn double_star_matches_any_suffix(suffix in prop::collection::vec(segment(), 0..5)) {
            let path = format!("/home/{}", suffix.join("/"));
            prop_assert!(pattern_matches("/home/**", &path));
        }

        #[test]
        fn single_star_matches_exactly_one(parts in prop::collection::vec(segment(), 0..4)) {
            let path = format!("/{}", parts.join("/"));
            prop_assert_eq!(pattern_matches("/*", &path), parts.len() == 1);
        }

        #[test]
        fn anonymous_never_reaches_home(suffix in prop::collection::vec(segment(), 0..4)) {
            let path = format!("/home/{}", suffix.join("/"));
            prop_assert_eq!(authorize_route(&path, None), RouteDecision::RedirectToLogin);
        }
    }
}
