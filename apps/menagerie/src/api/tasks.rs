//! Tasks: role-scoped lists, detail, CRUD and status changes.

use super::session::CurrentUser;
use super::{AppState, RecordPath, html, require, see_other, store_rejection, unprocessable};
use crate::error::{AppError, AppResult};
use axum::Form;
use axum::extract::State;
use axum::response::{Html, Response};
use menagerie_core::authz::can_change_status;
use menagerie_core::validation::{TaskForm, validate_task};
use menagerie_core::{
    Action, AnimalId, FormState, HabitatId, Task, TaskFilter, TaskId, TaskPriority, TaskStatus,
    TaskType, Timestamp, TreatmentId, User, UserId, ZooError,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

// =============================================================================
// LOOKUPS
// =============================================================================

/// Display names for everything a task can point at.
struct Names {
    users: BTreeMap<UserId, String>,
    animals: BTreeMap<AnimalId, String>,
    habitats: BTreeMap<HabitatId, String>,
    treatments: BTreeMap<TreatmentId, String>,
}

impl Names {
    fn load(state: &AppState) -> AppResult<Self> {
        let animals: BTreeMap<AnimalId, String> = state
            .store
            .list_animals()?
            .into_iter()
            .map(|a| (a.id, format!("{} ({})", a.name, a.common_name)))
            .collect();
        let treatments = state
            .store
            .list_treatments()?
            .into_iter()
            .map(|t| {
                let animal = animals.get(&t.animal_id).map_or("?", String::as_str);
                (t.id, format!("{} - {} ({})", t.date.format_date(), t.title, animal))
            })
            .collect();
        Ok(Self {
            users: state
                .store
                .list_users()?
                .into_iter()
                .map(|u| (u.id, u.label().to_string()))
                .collect(),
            habitats: state
                .store
                .list_habitats()?
                .into_iter()
                .map(|h| (h.id, format!("#{} {}", h.number, h.name)))
                .collect(),
            animals,
            treatments,
        })
    }

    fn user(&self, id: Option<UserId>) -> String {
        html::or_dash(id.and_then(|id| self.users.get(&id)).map(String::as_str))
    }
}

fn status_badge(status: TaskStatus) -> String {
    let tone = match status {
        TaskStatus::Todo => "gray",
        TaskStatus::InProgress => "blue",
        TaskStatus::Blocked => "red",
        TaskStatus::Done => "green",
        TaskStatus::Canceled => "amber",
    };
    html::badge(status.as_str(), tone)
}

fn priority_badge(priority: TaskPriority) -> String {
    let tone = match priority {
        TaskPriority::Low => "gray",
        TaskPriority::Medium => "blue",
        TaskPriority::High => "amber",
        TaskPriority::Urgent => "red",
    };
    html::badge(priority.as_str(), tone)
}

fn date_or_dash(value: Option<Timestamp>) -> String {
    value.map_or_else(|| "-".to_string(), Timestamp::format_date)
}

// =============================================================================
// LIST & DETAIL
// =============================================================================

fn task_table(tasks: &[Task], names: &Names) -> String {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            vec![
                html::link(&format!("/home/tasks/{}", task.id.0), &task.title),
                task.kind.to_string(),
                status_badge(task.status),
                priority_badge(task.priority),
                date_or_dash(task.due_date),
                names.user(task.assigned_to),
                names.user(Some(task.created_by)),
            ]
        })
        .collect();
    html::table(
        &["Title", "Type", "Status", "Priority", "Due", "Assigned to", "Created by"],
        &rows,
    )
}

pub(super) async fn list(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    let names = Names::load(&state)?;
    let mut content = String::new();

    if viewer.role.can(Action::CreateTask) {
        content.push_str("<div class=\"toolbar\">");
        content.push_str(&html::link_button("/home/tasks/create", "Add Task"));
        content.push_str("</div>");
    }
    if viewer.role.can(Action::ViewAllTasks) {
        let all = state.store.list_tasks(TaskFilter::All)?;
        content.push_str(&html::card("All Tasks", &task_table(&all, &names)));
    }
    if viewer.role.can(Action::ViewCreatedTasks) {
        let created = state.store.list_tasks(TaskFilter::CreatedBy(viewer.id))?;
        content.push_str(&html::card("Created By Me", &task_table(&created, &names)));
    }
    let mine = state.store.list_tasks(TaskFilter::AssignedTo(viewer.id))?;
    content.push_str(&html::card("My Tasks", &task_table(&mine, &names)));

    Ok(Html(html::page("Tasks", &viewer, "/home/tasks", &content)))
}

/// Anyone who can see a task through one of the list views may open it.
fn can_view(viewer: &User, task: &Task) -> bool {
    viewer.role.can(Action::ViewAllTasks)
        || task.assigned_to == Some(viewer.id)
        || (viewer.role.can(Action::ViewCreatedTasks) && task.created_by == viewer.id)
}

pub(super) async fn detail(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Html<String>> {
    let task = state.store.get_task(TaskId(id))?;
    if !can_view(&viewer, &task) {
        return Err(AppError::Forbidden(format!("task {id} is not visible")));
    }
    let names = Names::load(&state)?;

    let mut content = String::new();
    if viewer.role.can(Action::UpdateTask) || viewer.role.can(Action::DeleteTask) {
        content.push_str("<div class=\"toolbar\">");
        if viewer.role.can(Action::UpdateTask) {
            content.push_str(&html::link_button(&format!("/home/tasks/{id}/edit"), "Edit"));
        }
        if viewer.role.can(Action::DeleteTask) {
            content.push_str(&html::post_button(
                &format!("/home/tasks/{id}/delete"),
                "Delete",
                "btn btn-danger",
            ));
        }
        content.push_str("</div>");
    }

    let animal = task.animal_id.map_or_else(
        || "-".to_string(),
        |a| match names.animals.get(&a) {
            Some(name) => html::link(&format!("/home/animals/{}", a.0), name),
            None => "-".to_string(),
        },
    );
    let habitat = html::or_dash(
        task.habitat_id
            .and_then(|h| names.habitats.get(&h))
            .map(String::as_str),
    );
    let treatment = html::or_dash(
        task.treatment_id
            .and_then(|t| names.treatments.get(&t))
            .map(String::as_str),
    );

    let about = html::details(&[
        ("Type", task.kind.to_string()),
        ("Status", status_badge(task.status)),
        ("Priority", priority_badge(task.priority)),
        ("Due", date_or_dash(task.due_date)),
        ("Started", task.start_at.map_or_else(|| "-".to_string(), |t| t.format_datetime())),
        (
            "Completed",
            task.completed_at.map_or_else(|| "-".to_string(), |t| t.format_datetime()),
        ),
        ("Assigned to", names.user(task.assigned_to)),
        ("Created by", names.user(Some(task.created_by))),
        ("Animal", animal),
        ("Habitat", habitat),
        ("Treatment", treatment),
        ("Description", html::or_dash(task.description.as_deref())),
        ("Updated", task.updated_at.format_datetime()),
    ]);
    content.push_str(&html::card("Details", &about));

    if can_change_status(viewer.id, &task) {
        let options = html::enum_options(TaskStatus::ALL);
        let fields = html::select("Status", "status", &options, task.status.as_str(), &FormState::new());
        content.push_str(&html::card(
            "Update status",
            &html::form(&format!("/home/tasks/{id}/status"), &fields, "Update"),
        ));
    }

    Ok(Html(html::page(&task.title, &viewer, "/home/tasks", &content)))
}

// =============================================================================
// CREATE / EDIT / DELETE
// =============================================================================

fn task_form(task: &Task) -> TaskForm {
    fn id_text(id: Option<u64>) -> String {
        id.map(|v| v.to_string()).unwrap_or_default()
    }
    TaskForm {
        title: task.title.clone(),
        description: task.description.clone().unwrap_or_default(),
        kind: task.kind.to_string(),
        priority: task.priority.to_string(),
        due_date: task.due_date.map(Timestamp::format_date).unwrap_or_default(),
        assigned_to: id_text(task.assigned_to.map(|v| v.0)),
        animal_id: id_text(task.animal_id.map(|v| v.0)),
        habitat_id: id_text(task.habitat_id.map(|v| v.0)),
        treatment_id: id_text(task.treatment_id.map(|v| v.0)),
    }
}

fn options<K: Copy>(items: &BTreeMap<K, String>, raw: impl Fn(K) -> u64) -> Vec<(String, String)> {
    html::reference_options(items.iter().map(|(k, v)| (raw(*k), v.clone())))
}

fn form_html(
    viewer: &User,
    title: &str,
    action: &str,
    form: &TaskForm,
    names: &Names,
    state: &FormState,
) -> String {
    let mut fields = html::form_message(state);
    fields.push_str(&html::input("Title", "title", "text", &form.title, state));
    fields.push_str(&html::textarea("Description", "description", &form.description, state));
    fields.push_str(&html::select("Type", "type", &html::enum_options(TaskType::ALL), &form.kind, state));
    fields.push_str(&html::select(
        "Priority",
        "priority",
        &html::enum_options(TaskPriority::ALL),
        &form.priority,
        state,
    ));
    fields.push_str(&html::input("Due date", "due_date", "date", &form.due_date, state));
    fields.push_str(&html::select(
        "Assign to",
        "assigned_to",
        &options(&names.users, |k| k.0),
        &form.assigned_to,
        state,
    ));
    fields.push_str(&html::field_errors(state, "user_id"));
    fields.push_str(&html::select(
        "Animal",
        "animal_id",
        &options(&names.animals, |k| k.0),
        &form.animal_id,
        state,
    ));
    fields.push_str(&html::select(
        "Habitat",
        "habitat_id",
        &options(&names.habitats, |k| k.0),
        &form.habitat_id,
        state,
    ));
    fields.push_str(&html::select(
        "Treatment",
        "treatment_id",
        &options(&names.treatments, |k| k.0),
        &form.treatment_id,
        state,
    ));
    let body = html::form(action, &fields, "Save");
    html::page(title, viewer, "/home/tasks", &html::card("Task", &body))
}

pub(super) async fn create_page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    require(&viewer, Action::CreateTask)?;
    let names = Names::load(&state)?;
    let form = TaskForm {
        kind: TaskType::General.to_string(),
        priority: TaskPriority::Medium.to_string(),
        ..TaskForm::default()
    };
    Ok(Html(form_html(
        &viewer,
        "Add Task",
        "/home/tasks/create",
        &form,
        &names,
        &FormState::new(),
    )))
}

pub(super) async fn create(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Form(form): Form<TaskForm>,
) -> AppResult<Response> {
    require(&viewer, Action::CreateTask)?;
    let names = Names::load(&state)?;
    let render = |rejected: &FormState| {
        form_html(&viewer, "Add Task", "/home/tasks/create", &form, &names, rejected)
    };

    let input = match validate_task(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Missing Fields. Failed to Create Task.", errors);
            return Ok(unprocessable(render(&rejected)));
        }
    };

    match state.store.create_task(&input, viewer.id, Timestamp::now()) {
        Ok(task) => {
            info!(task = task.id.0, kind = %task.kind, by = viewer.id.0, "task created");
            Ok(see_other("/home/tasks"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Missing Fields. Failed to Create Task.",
                "Database Error: Failed to create task!",
            );
            Ok(store_rejection(&err, render(&rejected)))
        }
    }
}

pub(super) async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Html<String>> {
    require(&viewer, Action::UpdateTask)?;
    let task = state.store.get_task(TaskId(id))?;
    let names = Names::load(&state)?;
    Ok(Html(form_html(
        &viewer,
        "Edit Task",
        &format!("/home/tasks/{id}/edit"),
        &task_form(&task),
        &names,
        &FormState::new(),
    )))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(form): Form<TaskForm>,
) -> AppResult<Response> {
    require(&viewer, Action::UpdateTask)?;
    let task = state.store.get_task(TaskId(id))?;
    let names = Names::load(&state)?;
    let action = format!("/home/tasks/{id}/edit");
    let render =
        |rejected: &FormState| form_html(&viewer, "Edit Task", &action, &form, &names, rejected);

    let input = match validate_task(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Invalid fields. Failed to Update Task.", errors);
            return Ok(unprocessable(render(&rejected)));
        }
    };

    match state.store.update_task(task.id, &input, Timestamp::now()) {
        Ok(updated) => {
            info!(task = updated.id.0, by = viewer.id.0, "task updated");
            Ok(see_other("/home/tasks"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Invalid fields. Failed to Update Task.",
                "Database Error: Failed to update task!",
            );
            Ok(store_rejection(&err, render(&rejected)))
        }
    }
}

pub(super) async fn delete(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Response> {
    require(&viewer, Action::DeleteTask)?;
    state.store.delete_task(TaskId(id))?;
    info!(task = id, by = viewer.id.0, "task deleted");
    Ok(see_other("/home/tasks"))
}

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct StatusForm {
    status: String,
}

pub(super) async fn set_status(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(form): Form<StatusForm>,
) -> AppResult<Response> {
    require(&viewer, Action::ChangeTaskStatus)?;
    let status: TaskStatus = form
        .status
        .parse()
        .map_err(|err| ZooError::Invalid(format!("status: {err}")))?;
    let task = state.store.get_task(TaskId(id))?;
    if !can_change_status(viewer.id, &task) {
        return Err(AppError::Forbidden(format!(
            "user {} is not assigned to task {id}",
            viewer.id
        )));
    }
    let updated = state.store.set_task_status(task.id, status, Timestamp::now())?;
    info!(task = id, status = %updated.status, by = viewer.id.0, "task status changed");
    Ok(see_other(&format!("/home/tasks/{id}")))
}
