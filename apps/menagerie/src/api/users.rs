//! Staff accounts: list, create, edit.

use super::session::CurrentUser;
use super::{AppState, RecordPath, html, require, see_other, store_rejection, unprocessable};
use crate::error::{AppError, AppResult};
use axum::Form;
use axum::extract::State;
use axum::response::{Html, Response};
use menagerie_core::validation::{UserForm, validate_new_user, validate_user_update};
use menagerie_core::{Action, FormState, Role, Timestamp, User, UserId};
use tracing::info;

fn role_options() -> Vec<(String, String)> {
    html::enum_options(Role::ASSIGNABLE)
}

fn user_fields(form: &UserForm, state: &FormState, editing: bool) -> String {
    let mut fields = html::form_message(state);
    fields.push_str(&html::input("Name", "name", "text", &form.name, state));
    fields.push_str(&html::input("Email", "email", "email", &form.email, state));
    let password_label = if editing {
        "Password (leave empty to keep)"
    } else {
        "Password"
    };
    fields.push_str(&html::input(password_label, "password", "password", "", state));
    fields.push_str(&html::select("Role", "role", &role_options(), &form.role, state));
    fields
}

fn create_html(viewer: &User, form: &UserForm, state: &FormState) -> String {
    let body = html::form("/home/users/create", &user_fields(form, state, false), "Create");
    html::page("Create Employee Account", viewer, "/home/users", &html::card("New account", &body))
}

fn edit_html(viewer: &User, id: UserId, form: &UserForm, state: &FormState) -> String {
    let action = format!("/home/users/{}/edit", id.0);
    let body = html::form(&action, &user_fields(form, state, true), "Save");
    html::page("Edit User", viewer, "/home/users", &html::card("Account", &body))
}

/// Load an account that may be edited through the form.
fn editable_user(state: &AppState, id: u64) -> AppResult<User> {
    let user = state.store.get_user(UserId(id))?;
    if user.role == Role::SuperAdmin {
        return Err(AppError::Forbidden(
            "the owner account is managed from the command line".to_string(),
        ));
    }
    Ok(user)
}

pub(super) async fn list(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    require(&viewer, Action::ViewUsers)?;
    let users = state.store.list_users()?;
    let can_manage = viewer.role.can(Action::ManageUsers);

    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|user| {
            let actions = if can_manage && user.role != Role::SuperAdmin {
                html::link(&format!("/home/users/{}/edit", user.id.0), "Edit")
            } else {
                String::new()
            };
            vec![
                html::escape(&user.name),
                html::escape(&user.email),
                html::badge(user.role.as_str(), "blue"),
                user.created_at.format_date(),
                actions,
            ]
        })
        .collect();

    let mut content = String::new();
    if can_manage {
        content.push_str("<div class=\"toolbar\">");
        content.push_str(&html::link_button("/home/users/create", "Add User"));
        content.push_str("</div>");
    }
    content.push_str(&html::card(
        "Users",
        &html::table(&["Name", "Email", "Role", "Created", ""], &rows),
    ));
    Ok(Html(html::page("Users", &viewer, "/home/users", &content)))
}

pub(super) async fn create_page(CurrentUser(viewer): CurrentUser) -> AppResult<Html<String>> {
    require(&viewer, Action::ManageUsers)?;
    let form = UserForm {
        role: Role::Staff.to_string(),
        ..UserForm::default()
    };
    Ok(Html(create_html(&viewer, &form, &FormState::new())))
}

pub(super) async fn create(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Form(form): Form<UserForm>,
) -> AppResult<Response> {
    require(&viewer, Action::ManageUsers)?;
    let input = match validate_new_user(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected =
                FormState::invalid("Missing Fields. Failed to Create Employee Account.", errors);
            return Ok(unprocessable(create_html(&viewer, &form, &rejected)));
        }
    };

    match state.store.create_user(&input, Timestamp::now()) {
        Ok(user) => {
            info!(user = user.id.0, role = %user.role, by = viewer.id.0, "user created");
            Ok(see_other("/home/users"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Registration failed!",
                "Database Error: Failed to register user!",
            );
            Ok(store_rejection(&err, create_html(&viewer, &form, &rejected)))
        }
    }
}

pub(super) async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Html<String>> {
    require(&viewer, Action::ManageUsers)?;
    let user = editable_user(&state, id)?;
    let form = UserForm {
        name: user.name.clone(),
        email: user.email.clone(),
        password: String::new(),
        role: user.role.to_string(),
    };
    Ok(Html(edit_html(&viewer, user.id, &form, &FormState::new())))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(form): Form<UserForm>,
) -> AppResult<Response> {
    require(&viewer, Action::ManageUsers)?;
    let user = editable_user(&state, id)?;
    let input = match validate_user_update(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Invalid fields. Please check your input.", errors);
            return Ok(unprocessable(edit_html(&viewer, user.id, &form, &rejected)));
        }
    };

    match state.store.update_user(user.id, &input, Timestamp::now()) {
        Ok(updated) => {
            info!(user = updated.id.0, by = viewer.id.0, "user updated");
            Ok(see_other("/home/users"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Update failed!",
                "Database Error: Failed to update user!",
            );
            Ok(store_rejection(&err, edit_html(&viewer, user.id, &form, &rejected)))
        }
    }
}
