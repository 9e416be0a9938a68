//! Habitats: list with occupancy, edit.

use super::session::CurrentUser;
use super::{AppState, RecordPath, html, require, see_other, store_rejection, unprocessable};
use crate::error::AppResult;
use axum::Form;
use axum::extract::State;
use axum::response::{Html, Response};
use menagerie_core::map::habitat_color;
use menagerie_core::validation::{HabitatForm, validate_habitat};
use menagerie_core::{Action, FormState, Habitat, HabitatId, Timestamp, User};
use tracing::info;

fn habitat_form(habitat: &Habitat) -> HabitatForm {
    HabitatForm {
        number: habitat.number.to_string(),
        name: habitat.name.clone(),
        kind: habitat.kind.clone(),
        capacity: habitat.capacity.to_string(),
        color: habitat.color.clone().unwrap_or_default(),
        closed: habitat.closed.to_string(),
    }
}

fn edit_html(viewer: &User, id: HabitatId, form: &HabitatForm, state: &FormState) -> String {
    let closed_options = vec![
        ("false".to_string(), "Open".to_string()),
        ("true".to_string(), "Closed".to_string()),
    ];
    let mut fields = html::form_message(state);
    fields.push_str(&html::input("Number", "number", "number", &form.number, state));
    fields.push_str(&html::input("Name", "name", "text", &form.name, state));
    fields.push_str(&html::input("Type", "type", "text", &form.kind, state));
    fields.push_str(&html::input("Capacity", "capacity", "number", &form.capacity, state));
    fields.push_str(&html::input("Color", "color", "text", &form.color, state));
    fields.push_str(&html::select("Status", "closed", &closed_options, &form.closed, state));

    let body = html::form(&format!("/home/habitats/{}/edit", id.0), &fields, "Save");
    html::page("Edit Habitat", viewer, "/home/habitats", &html::card("Habitat", &body))
}

fn swatch(color: &str) -> String {
    format!(
        "<span class=\"badge\" style=\"background:{}\">&nbsp;</span> {}",
        html::escape(color),
        html::escape(color)
    )
}

pub(super) async fn list(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    let habitats = state.store.list_habitats()?;
    let residents = state.store.habitat_residents()?;
    let can_edit = viewer.role.can(Action::UpdateHabitat);

    let rows: Vec<Vec<String>> = habitats
        .iter()
        .map(|habitat| {
            let count = residents.get(&habitat.id).copied().unwrap_or(0);
            let occupancy = if count >= habitat.capacity {
                html::badge(&format!("{count} / {} full", habitat.capacity), "amber")
            } else {
                format!("{count} / {}", habitat.capacity)
            };
            let status = if habitat.closed {
                html::badge("Closed", "red")
            } else {
                html::badge("Open", "green")
            };
            let color = habitat
                .color
                .clone()
                .unwrap_or_else(|| habitat_color(&habitat.kind).to_string());
            let actions = if can_edit {
                html::link(&format!("/home/habitats/{}/edit", habitat.id.0), "Edit")
            } else {
                String::new()
            };
            vec![
                habitat.number.to_string(),
                html::escape(&habitat.name),
                html::escape(&habitat.kind),
                occupancy,
                status,
                swatch(&color),
                actions,
            ]
        })
        .collect();

    let content = html::card(
        "Habitats",
        &html::table(
            &["Number", "Name", "Type", "Residents", "Status", "Color", ""],
            &rows,
        ),
    );
    Ok(Html(html::page("Habitats", &viewer, "/home/habitats", &content)))
}

pub(super) async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Html<String>> {
    require(&viewer, Action::UpdateHabitat)?;
    let habitat = state.store.get_habitat(HabitatId(id))?;
    Ok(Html(edit_html(
        &viewer,
        habitat.id,
        &habitat_form(&habitat),
        &FormState::new(),
    )))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(form): Form<HabitatForm>,
) -> AppResult<Response> {
    require(&viewer, Action::UpdateHabitat)?;
    let habitat = state.store.get_habitat(HabitatId(id))?;

    let input = match validate_habitat(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Invalid fields. Please check your input.", errors);
            return Ok(unprocessable(edit_html(&viewer, habitat.id, &form, &rejected)));
        }
    };

    match state.store.update_habitat(habitat.id, &input, Timestamp::now()) {
        Ok(updated) => {
            info!(habitat = updated.id.0, number = updated.number, by = viewer.id.0, "habitat updated");
            Ok(see_other("/home/habitats"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Update failed!",
                "Database Error: Failed to update habitat!",
            );
            Ok(store_rejection(&err, edit_html(&viewer, habitat.id, &form, &rejected)))
        }
    }
}
