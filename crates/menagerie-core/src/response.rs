//! # Response Module
//!
//! Structured outcome of a form action.
//!
//! A failed action never silently drops input: the form is re-rendered with
//! a top-level message and the messages attached to each offending field.
//! A successful action carries no state at all (the web layer redirects).

use crate::ZooError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name -> messages, in deterministic field order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Field key used for errors that do not belong to a form field.
pub const DB_FIELD: &str = "db";

/// Message attached to [`DB_FIELD`] when the database fails.
pub const DB_RETRY_MESSAGE: &str = "An unexpected error occurred. Please try again!";

/// State handed back to a form after a rejected submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    /// Summary shown above the form.
    pub message: Option<String>,
    /// Per-field messages.
    pub errors: FieldErrors,
}

impl FormState {
    /// Empty state (fresh form).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State with only a summary message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            errors: FieldErrors::new(),
        }
    }

    /// State carrying validation errors under a summary message.
    #[must_use]
    pub fn invalid(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self {
            message: Some(message.into()),
            errors,
        }
    }

    /// Attach a message to a field.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Builder form of [`FormState::add_error`].
    #[must_use]
    pub fn error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_error(field, message);
        self
    }

    /// Messages for one field.
    #[must_use]
    pub fn field(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the state carries anything to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.errors.is_empty()
    }

    /// Translate a store failure into form state.
    ///
    /// Conflicts land on their field under `conflict_message`; everything
    /// else becomes a database error under `db_message`.
    #[must_use]
    pub fn from_store_error(err: &ZooError, conflict_message: &str, db_message: &str) -> Self {
        match err {
            ZooError::Conflict { field, message } => {
                Self::with_message(conflict_message).error(*field, message.clone())
            }
            ZooError::NotFound { entity, .. } => {
                let field = format!("{entity}_id");
                Self::with_message(format!("{} not found.", capitalize(entity)))
                    .error(field, format!("{} does not exist.", capitalize(entity)))
            }
            ZooError::Forbidden(message) => Self::with_message(message.clone()),
            _ => Self::with_message(db_message).error(DB_FIELD, DB_RETRY_MESSAGE),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
