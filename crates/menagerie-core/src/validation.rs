//! # Validation
//!
//! Raw form submissions in, typed inputs or per-field errors out.
//!
//! Form structs mirror the HTML forms one-to-one: every field is a string
//! (missing fields deserialize as empty), so a submission never fails to
//! parse before it reaches these rules.

use crate::model::{HealthStatus, Role, Sex, TaskPriority, TaskType};
use crate::primitives::{MAX_ANIMAL_AGE, MAX_HABITAT_CAPACITY, MAX_TREATMENT_NOTES};
use crate::response::{FieldErrors, FormState};
use crate::{AnimalId, HabitatId, Timestamp, TreatmentId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Message returned for any rejected login.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

// =============================================================================
// CHECKER
// =============================================================================

/// Accumulates field errors while a form is read.
#[derive(Debug, Default)]
struct Checker {
    errors: FieldErrors,
}

impl Checker {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Required text with a character-count window. Returns the trimmed value.
    fn text(
        &mut self,
        field: &str,
        value: &str,
        min: usize,
        max: usize,
        min_message: &str,
    ) -> String {
        let value = value.trim();
        let len = value.chars().count();
        if len < min {
            self.fail(field, min_message);
        } else if len > max {
            self.fail(field, format!("Must be at most {max} characters"));
        }
        value.to_string()
    }

    /// Optional text: empty means `None`.
    fn optional_text(&mut self, field: &str, value: &str, max: usize) -> Option<String> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.chars().count() > max {
            self.fail(field, format!("Must be at most {max} characters"));
        }
        Some(value.to_string())
    }

    /// Required unsigned integer within `min..=max`.
    fn number(
        &mut self,
        field: &str,
        value: &str,
        min: u32,
        max: u32,
        label: &str,
    ) -> Option<u32> {
        let value = value.trim();
        if value.is_empty() {
            self.fail(field, format!("{label} is required"));
            return None;
        }
        let Ok(parsed) = value.parse::<i64>() else {
            self.fail(field, format!("{label} must be a whole number"));
            return None;
        };
        if parsed < i64::from(min) {
            self.fail(field, format!("{label} must be {min} or more"));
            return None;
        }
        if parsed > i64::from(max) {
            self.fail(field, format!("{label} must be at most {max}"));
            return None;
        }
        u32::try_from(parsed).ok()
    }

    /// Enum label with a default for empty input.
    fn label<T: FromStr + Copy>(&mut self, field: &str, value: &str, default: T) -> T {
        let value = value.trim();
        if value.is_empty() {
            return default;
        }
        match value.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                self.fail(field, format!("Invalid option '{value}'"));
                default
            }
        }
    }

    /// Optional record reference: empty means `None`.
    fn reference(&mut self, field: &str, value: &str) -> Option<u64> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match value.parse::<u64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                self.fail(field, "Invalid selection");
                None
            }
        }
    }

    /// Optional `YYYY-MM-DD` date.
    fn optional_date(&mut self, field: &str, value: &str) -> Option<Timestamp> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let parsed = Timestamp::parse_date(value);
        if parsed.is_none() {
            self.fail(field, "Invalid date");
        }
        parsed
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, FieldErrors> {
        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(self.errors),
        }
    }
}

/// Characters that never belong in an address or URL a page will echo back.
fn has_unsafe_chars(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"'))
}

/// Address check: one `@`, non-empty local part, and a dotted domain of
/// letters, digits and hyphens. No whitespace, control characters or
/// angle brackets anywhere.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !has_unsafe_chars(value)
        && domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

/// Absolute http(s) URL with a host, as parsed by [`url::Url`].
///
/// The raw text is checked too: the parser silently strips tabs, newlines
/// and surrounding spaces, but the stored value is the raw text.
#[must_use]
pub fn is_valid_url(value: &str) -> bool {
    if has_unsafe_chars(value) {
        return false;
    }
    let Ok(parsed) = url::Url::parse(value) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(url::Host::Domain(domain)) => domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }),
        Some(url::Host::Ipv4(_) | url::Host::Ipv6(_)) => true,
        None => false,
    }
}

// =============================================================================
// LOGIN
// =============================================================================

/// Login form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Credentials that passed shape checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Lowercased.
    pub email: String,
    pub password: String,
}

/// Shape-check a login. Failures are indistinguishable from a wrong password.
pub fn validate_login(form: &LoginForm) -> Result<Credentials, FormState> {
    let email = form.email.trim().to_lowercase();
    if !is_valid_email(&email) || form.password.chars().count() < 6 {
        return Err(FormState::with_message(INVALID_CREDENTIALS));
    }
    Ok(Credentials {
        email,
        password: form.password.clone(),
    })
}

// =============================================================================
// USERS
// =============================================================================

/// Create/edit user form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// A validated account to create. The password is still plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// A validated account edit. `password: None` keeps the current hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role: Role,
}

fn check_user_fields(checker: &mut Checker, form: &UserForm) -> (String, String, Role) {
    let name = checker.text(
        "name",
        &form.name,
        2,
        50,
        "Name must be at least 2 characters long",
    );
    let email = form.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        checker.fail("email", "Invalid email address");
    }
    let role = checker.label("role", &form.role, Role::Staff);
    if !Role::ASSIGNABLE.contains(&role) {
        checker.fail("role", "Role must be STAFF or ADMIN");
    }
    (name, email, role)
}

fn check_password(checker: &mut Checker, password: &str) {
    if password.chars().count() < 8 {
        checker.fail("password", "Password must be at least 8 characters long");
    }
}

/// Validate a new account.
pub fn validate_new_user(form: &UserForm) -> Result<NewUser, FieldErrors> {
    let mut checker = Checker::default();
    let (name, email, role) = check_user_fields(&mut checker, form);
    check_password(&mut checker, &form.password);
    checker.finish(Some(NewUser {
        name,
        email,
        password: form.password.clone(),
        role,
    }))
}

/// Validate an account edit. An empty password leaves it unchanged.
pub fn validate_user_update(form: &UserForm) -> Result<UserUpdate, FieldErrors> {
    let mut checker = Checker::default();
    let (name, email, role) = check_user_fields(&mut checker, form);
    let password = if form.password.is_empty() {
        None
    } else {
        check_password(&mut checker, &form.password);
        Some(form.password.clone())
    };
    checker.finish(Some(UserUpdate {
        name,
        email,
        password,
        role,
    }))
}

// =============================================================================
// ANIMALS
// =============================================================================

/// Create/edit animal form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalForm {
    pub name: String,
    pub species: String,
    pub common_name: String,
    pub age: String,
    pub sex: String,
    pub health_status: String,
    pub weight: String,
    pub image_url: String,
    pub habitat_id: String,
}

/// A validated animal.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimalInput {
    pub name: String,
    pub species: String,
    pub common_name: String,
    pub age: u32,
    pub sex: Sex,
    pub health_status: HealthStatus,
    pub weight: Option<f64>,
    pub image_url: Option<String>,
    pub habitat_id: Option<HabitatId>,
}

/// Validate an animal submission (create and edit share the rules).
pub fn validate_animal(form: &AnimalForm) -> Result<AnimalInput, FieldErrors> {
    let mut c = Checker::default();
    let name = c.text(
        "name",
        &form.name,
        2,
        100,
        "Name must be at least 2 characters",
    );
    let species = c.text("species", &form.species, 2, 200, "Scientific name required");
    let common_name = c.text(
        "common_name",
        &form.common_name,
        2,
        100,
        "Common name required",
    );
    let age = c.number("age", &form.age, 0, MAX_ANIMAL_AGE, "Age");
    let sex = c.label("sex", &form.sex, Sex::Unknown);
    let health_status = c.label("health_status", &form.health_status, HealthStatus::Healthy);

    let weight = match form.weight.trim() {
        "" => None,
        raw => match raw.parse::<f64>() {
            Ok(w) if w.is_finite() && w >= 0.0 => Some(w),
            Ok(_) => {
                c.fail("weight", "Weight must be positive");
                None
            }
            Err(_) => {
                c.fail("weight", "Weight must be a number");
                None
            }
        },
    };

    let image_url = match form.image_url.trim() {
        "" => None,
        raw if is_valid_url(raw) => Some(raw.to_string()),
        _ => {
            c.fail("image_url", "Invalid URL");
            None
        }
    };

    let habitat_id = c.reference("habitat_id", &form.habitat_id).map(HabitatId);

    let input = age.map(|age| AnimalInput {
        name,
        species,
        common_name,
        age,
        sex,
        health_status,
        weight,
        image_url,
        habitat_id,
    });
    c.finish(input)
}

// =============================================================================
// HABITATS
// =============================================================================

/// Edit habitat form. `type` is a keyword in Rust, hence the rename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitatForm {
    pub number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub capacity: String,
    pub color: String,
    pub closed: String,
}

/// A validated habitat edit. Coordinates are not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitatInput {
    pub number: u32,
    pub name: String,
    pub kind: String,
    pub capacity: u32,
    pub color: Option<String>,
    pub closed: bool,
}

/// Validate a habitat edit.
pub fn validate_habitat(form: &HabitatForm) -> Result<HabitatInput, FieldErrors> {
    let mut c = Checker::default();
    let number = c.number("number", &form.number, 1, u32::MAX, "Number");
    let name = c.text(
        "name",
        &form.name,
        2,
        100,
        "Name must be at least 2 characters",
    );
    let kind = c.text("type", &form.kind, 2, 100, "Type is required");
    let capacity = c.number(
        "capacity",
        &form.capacity,
        0,
        MAX_HABITAT_CAPACITY,
        "Capacity",
    );
    let color = c.optional_text("color", &form.color, 32);
    let closed = match form.closed.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            c.fail("closed", "Choose open or closed");
            None
        }
    };

    let input = match (number, capacity, closed) {
        (Some(number), Some(capacity), Some(closed)) => Some(HabitatInput {
            number,
            name,
            kind,
            capacity,
            color,
            closed,
        }),
        _ => None,
    };
    c.finish(input)
}

// =============================================================================
// TASKS
// =============================================================================

/// Create/edit task form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    pub due_date: String,
    pub assigned_to: String,
    pub animal_id: String,
    pub habitat_id: String,
    pub treatment_id: String,
}

/// A validated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskType,
    pub priority: TaskPriority,
    pub due_date: Option<Timestamp>,
    pub assigned_to: Option<UserId>,
    pub animal_id: Option<AnimalId>,
    pub habitat_id: Option<HabitatId>,
    pub treatment_id: Option<TreatmentId>,
}

/// Validate a task submission, including the per-category link rules.
pub fn validate_task(form: &TaskForm) -> Result<TaskInput, FieldErrors> {
    let mut c = Checker::default();
    let title = c.text(
        "title",
        &form.title,
        2,
        120,
        "Title must be at least 2 characters",
    );
    let description = c.optional_text("description", &form.description, MAX_TREATMENT_NOTES);
    let kind = c.label("type", &form.kind, TaskType::General);
    let priority = c.label("priority", &form.priority, TaskPriority::Medium);
    let due_date = c.optional_date("due_date", &form.due_date);
    let assigned_to = c.reference("assigned_to", &form.assigned_to).map(UserId);
    let animal_id = c.reference("animal_id", &form.animal_id).map(AnimalId);
    let habitat_id = c.reference("habitat_id", &form.habitat_id).map(HabitatId);
    let treatment_id = c
        .reference("treatment_id", &form.treatment_id)
        .map(TreatmentId);

    match kind {
        TaskType::Feeding => {
            if animal_id.is_none() {
                c.fail("animal_id", "Animal is required");
            }
            if habitat_id.is_none() {
                c.fail("habitat_id", "Habitat is required");
            }
        }
        TaskType::Cleaning if habitat_id.is_none() => {
            c.fail("habitat_id", "Habitat is required for cleaning tasks");
        }
        TaskType::Medical if animal_id.is_none() => {
            c.fail("animal_id", "Animal is required for medical tasks");
        }
        _ => {}
    }

    c.finish(Some(TaskInput {
        title,
        description,
        kind,
        priority,
        due_date,
        assigned_to,
        animal_id,
        habitat_id,
        treatment_id,
    }))
}

// =============================================================================
// TREATMENTS
// =============================================================================

/// Add treatment form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentForm {
    pub animal_id: String,
    pub title: String,
    pub notes: String,
    pub date: String,
}

/// A validated treatment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentInput {
    pub animal_id: AnimalId,
    pub title: String,
    pub notes: Option<String>,
    pub date: Timestamp,
}

/// Validate a treatment submission.
pub fn validate_treatment(form: &TreatmentForm) -> Result<TreatmentInput, FieldErrors> {
    let mut c = Checker::default();
    let animal_id = c.reference("animal_id", &form.animal_id).map(AnimalId);
    if form.animal_id.trim().is_empty() {
        c.fail("animal_id", "Animal is required");
    }
    let title = c.text(
        "title",
        &form.title,
        2,
        120,
        "Title must be at least 2 characters",
    );
    let notes = c.optional_text("notes", &form.notes, MAX_TREATMENT_NOTES);
    let date = if form.date.trim().is_empty() {
        c.fail("date", "Date is required");
        None
    } else {
        c.optional_date("date", &form.date)
    };

    let input = match (animal_id, date) {
        (Some(animal_id), Some(date)) => Some(TreatmentInput {
            animal_id,
            title,
            notes,
            date,
        }),
        _ => None,
    };
    c.finish(input)
}

// =============================================================================
// TESTS
// =============================================================================
