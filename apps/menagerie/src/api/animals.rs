//! Animals and their treatments.

use super::session::CurrentUser;
use super::{AppState, RecordPath, html, require, see_other, store_rejection, unprocessable};
use crate::error::{AppError, AppResult};
use axum::Form;
use axum::extract::State;
use axum::response::{Html, Response};
use menagerie_core::authz::can_delete_treatment;
use menagerie_core::validation::{
    AnimalForm, TreatmentForm, validate_animal, validate_treatment,
};
use menagerie_core::{
    Action, Animal, AnimalId, FormState, Habitat, HealthStatus, Sex, Timestamp, TreatmentId, User,
};
use std::collections::BTreeMap;
use tracing::info;

fn health_badge(status: HealthStatus) -> String {
    let tone = match status {
        HealthStatus::Healthy => "green",
        HealthStatus::Observation => "amber",
        HealthStatus::Unhealthy => "red",
    };
    html::badge(status.as_str(), tone)
}

fn habitat_label(habitat: &Habitat) -> String {
    format!("#{} {}", habitat.number, habitat.name)
}

fn animal_form(animal: &Animal) -> AnimalForm {
    AnimalForm {
        name: animal.name.clone(),
        species: animal.species.clone(),
        common_name: animal.common_name.clone(),
        age: animal.age.to_string(),
        sex: animal.sex.to_string(),
        health_status: animal.health_status.to_string(),
        weight: animal.weight.map(|w| w.to_string()).unwrap_or_default(),
        image_url: animal.image_url.clone().unwrap_or_default(),
        habitat_id: animal
            .habitat_id
            .map(|h| h.0.to_string())
            .unwrap_or_default(),
    }
}

fn animal_fields(form: &AnimalForm, habitats: &[Habitat], state: &FormState) -> String {
    let habitat_options =
        html::reference_options(habitats.iter().map(|h| (h.id.0, habitat_label(h))));
    let mut fields = html::form_message(state);
    fields.push_str(&html::input("Name", "name", "text", &form.name, state));
    fields.push_str(&html::input("Scientific name", "species", "text", &form.species, state));
    fields.push_str(&html::input("Common name", "common_name", "text", &form.common_name, state));
    fields.push_str(&html::input("Age", "age", "number", &form.age, state));
    fields.push_str(&html::select("Sex", "sex", &html::enum_options(Sex::ALL), &form.sex, state));
    fields.push_str(&html::select(
        "Health status",
        "health_status",
        &html::enum_options(HealthStatus::ALL),
        &form.health_status,
        state,
    ));
    fields.push_str(&html::input("Weight (kg)", "weight", "text", &form.weight, state));
    fields.push_str(&html::input("Image URL", "image_url", "url", &form.image_url, state));
    fields.push_str(&html::select(
        "Habitat",
        "habitat_id",
        &habitat_options,
        &form.habitat_id,
        state,
    ));
    fields
}

fn form_html(
    viewer: &User,
    title: &str,
    action: &str,
    form: &AnimalForm,
    habitats: &[Habitat],
    state: &FormState,
) -> String {
    let body = html::form(action, &animal_fields(form, habitats, state), "Save");
    html::page(title, viewer, "/home/animals", &html::card("Animal", &body))
}

// =============================================================================
// ANIMALS
// =============================================================================

pub(super) async fn list(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    let animals = state.store.list_animals()?;
    let habitats: BTreeMap<_, _> = state
        .store
        .list_habitats()?
        .into_iter()
        .map(|h| (h.id, h))
        .collect();

    let rows: Vec<Vec<String>> = animals
        .iter()
        .map(|animal| {
            let habitat = animal
                .habitat_id
                .and_then(|id| habitats.get(&id))
                .map_or_else(|| "-".to_string(), |h| html::escape(&habitat_label(h)));
            vec![
                html::link(&format!("/home/animals/{}", animal.id.0), &animal.name),
                html::escape(&animal.common_name),
                format!("<em>{}</em>", html::escape(&animal.species)),
                animal.age.to_string(),
                animal.sex.to_string(),
                health_badge(animal.health_status),
                habitat,
                animal.arrival_date.format_date(),
            ]
        })
        .collect();

    let mut content = String::new();
    if viewer.role.can(Action::CreateAnimal) {
        content.push_str("<div class=\"toolbar\">");
        content.push_str(&html::link_button("/home/animals/create", "Add Animal"));
        content.push_str("</div>");
    }
    content.push_str(&html::card(
        "Animals",
        &html::table(
            &["Name", "Common name", "Species", "Age", "Sex", "Health", "Habitat", "Arrived"],
            &rows,
        ),
    ));
    Ok(Html(html::page("Animals", &viewer, "/home/animals", &content)))
}

pub(super) async fn create_page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Html<String>> {
    require(&viewer, Action::CreateAnimal)?;
    let habitats = state.store.list_habitats()?;
    let form = AnimalForm {
        sex: Sex::Unknown.to_string(),
        health_status: HealthStatus::Healthy.to_string(),
        ..AnimalForm::default()
    };
    Ok(Html(form_html(
        &viewer,
        "Add Animal",
        "/home/animals/create",
        &form,
        &habitats,
        &FormState::new(),
    )))
}

pub(super) async fn create(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Form(form): Form<AnimalForm>,
) -> AppResult<Response> {
    require(&viewer, Action::CreateAnimal)?;
    let habitats = state.store.list_habitats()?;
    let render = |rejected: &FormState| {
        form_html(&viewer, "Add Animal", "/home/animals/create", &form, &habitats, rejected)
    };

    let input = match validate_animal(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Missing Fields. Failed to Create Animal.", errors);
            return Ok(unprocessable(render(&rejected)));
        }
    };

    match state.store.create_animal(&input, Timestamp::now()) {
        Ok(animal) => {
            info!(animal = animal.id.0, by = viewer.id.0, "animal created");
            Ok(see_other("/home/animals"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Animal already exists!",
                "Database Error: Failed to create animal!",
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
    require(&viewer, Action::UpdateAnimal)?;
    let animal = state.store.get_animal(AnimalId(id))?;
    let habitats = state.store.list_habitats()?;
    Ok(Html(form_html(
        &viewer,
        "Edit Animal",
        &format!("/home/animals/{id}/edit"),
        &animal_form(&animal),
        &habitats,
        &FormState::new(),
    )))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(form): Form<AnimalForm>,
) -> AppResult<Response> {
    require(&viewer, Action::UpdateAnimal)?;
    let animal = state.store.get_animal(AnimalId(id))?;
    let habitats = state.store.list_habitats()?;
    let action = format!("/home/animals/{id}/edit");
    let render =
        |rejected: &FormState| form_html(&viewer, "Edit Animal", &action, &form, &habitats, rejected);

    let input = match validate_animal(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected = FormState::invalid("Invalid fields. Please check your input.", errors);
            return Ok(unprocessable(render(&rejected)));
        }
    };

    match state.store.update_animal(animal.id, &input, Timestamp::now()) {
        Ok(updated) => {
            info!(animal = updated.id.0, by = viewer.id.0, "animal updated");
            Ok(see_other("/home/animals"))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Update failed!",
                "Database Error: Failed to update animal!",
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
    require(&viewer, Action::DeleteAnimal)?;
    state.store.delete_animal(AnimalId(id))?;
    info!(animal = id, by = viewer.id.0, "animal deleted");
    Ok(see_other("/home/animals"))
}

// =============================================================================
// PROFILE & TREATMENTS
// =============================================================================

fn profile_html(
    state: &AppState,
    viewer: &User,
    animal: &Animal,
    treatment_form: &TreatmentForm,
    form_state: &FormState,
) -> AppResult<String> {
    let habitat = match animal.habitat_id {
        Some(id) => Some(state.store.get_habitat(id)?),
        None => None,
    };
    let authors: BTreeMap<_, _> = state
        .store
        .list_users()?
        .into_iter()
        .map(|u| (u.id, u.label().to_string()))
        .collect();
    let treatments = state.store.treatments_for_animal(animal.id)?;

    let mut content = String::new();
    if viewer.role.can(Action::UpdateAnimal) || viewer.role.can(Action::DeleteAnimal) {
        content.push_str("<div class=\"toolbar\">");
        if viewer.role.can(Action::UpdateAnimal) {
            content.push_str(&html::link_button(
                &format!("/home/animals/{}/edit", animal.id.0),
                "Edit",
            ));
        }
        if viewer.role.can(Action::DeleteAnimal) {
            content.push_str(&html::post_button(
                &format!("/home/animals/{}/delete", animal.id.0),
                "Delete",
                "btn btn-danger",
            ));
        }
        content.push_str("</div>");
    }

    let mut about = String::new();
    if let Some(url) = &animal.image_url {
        about.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" width=\"200\" height=\"200\"/>",
            html::escape(url),
            html::escape(&animal.name)
        ));
    }
    about.push_str(&html::details(&[
        ("Common name", html::escape(&animal.common_name)),
        ("Scientific name", format!("<em>{}</em>", html::escape(&animal.species))),
        ("Age", animal.age.to_string()),
        ("Sex", animal.sex.to_string()),
        (
            "Weight",
            animal.weight.map_or_else(|| "-".to_string(), |w| format!("{w} kg")),
        ),
        ("Health", health_badge(animal.health_status)),
        (
            "Habitat",
            habitat
                .as_ref()
                .map_or_else(|| "-".to_string(), |h| html::escape(&habitat_label(h))),
        ),
        ("Arrived", animal.arrival_date.format_date()),
    ]));
    content.push_str(&html::card("About", &about));

    let rows: Vec<Vec<String>> = treatments
        .iter()
        .map(|treatment| {
            let actions = if can_delete_treatment(viewer.id, viewer.role, treatment) {
                html::post_button(
                    &format!(
                        "/home/animals/{}/treatments/{}/delete",
                        animal.id.0, treatment.id.0
                    ),
                    "Delete",
                    "btn btn-danger",
                )
            } else {
                String::new()
            };
            vec![
                treatment.date.format_date(),
                html::escape(&treatment.title),
                html::or_dash(treatment.notes.as_deref()),
                html::or_dash(authors.get(&treatment.created_by).map(String::as_str)),
                actions,
            ]
        })
        .collect();
    let mut treatments_html = html::table(&["Date", "Title", "Notes", "Recorded by", ""], &rows);

    if viewer.role.can(Action::CreateTreatment) {
        let mut fields = html::form_message(form_state);
        fields.push_str(&html::input("Title", "title", "text", &treatment_form.title, form_state));
        fields.push_str(&html::input("Date", "date", "date", &treatment_form.date, form_state));
        fields.push_str(&html::textarea("Notes", "notes", &treatment_form.notes, form_state));
        fields.push_str(&html::field_errors(form_state, "animal_id"));
        treatments_html.push_str("<h2>Add treatment</h2>");
        treatments_html.push_str(&html::form(
            &format!("/home/animals/{}/treatments", animal.id.0),
            &fields,
            "Add Treatment",
        ));
    }
    content.push_str(&html::card("Treatments", &treatments_html));

    Ok(html::page(&animal.name, viewer, "/home/animals", &content))
}

fn fresh_treatment_form(animal: AnimalId) -> TreatmentForm {
    TreatmentForm {
        animal_id: animal.0.to_string(),
        date: Timestamp::now().format_date(),
        ..TreatmentForm::default()
    }
}

pub(super) async fn profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
) -> AppResult<Html<String>> {
    let animal = state.store.get_animal(AnimalId(id))?;
    let page = profile_html(
        &state,
        &viewer,
        &animal,
        &fresh_treatment_form(animal.id),
        &FormState::new(),
    )?;
    Ok(Html(page))
}

pub(super) async fn add_treatment(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath(id): RecordPath<u64>,
    Form(mut form): Form<TreatmentForm>,
) -> AppResult<Response> {
    require(&viewer, Action::CreateTreatment)?;
    let animal = state.store.get_animal(AnimalId(id))?;
    // The animal comes from the URL, never from the form body.
    form.animal_id = id.to_string();

    let input = match validate_treatment(&form) {
        Ok(input) => input,
        Err(errors) => {
            let rejected =
                FormState::invalid("Missing/invalid fields. Failed to create treatment.", errors);
            let page = profile_html(&state, &viewer, &animal, &form, &rejected)?;
            return Ok(unprocessable(page));
        }
    };

    match state.store.create_treatment(&input, viewer.id, Timestamp::now()) {
        Ok(treatment) => {
            info!(treatment = treatment.id.0, animal = id, by = viewer.id.0, "treatment recorded");
            Ok(see_other(&format!("/home/animals/{id}")))
        }
        Err(err) => {
            let rejected = FormState::from_store_error(
                &err,
                "Missing/invalid fields. Failed to create treatment.",
                "Database Error: Failed to create treatment!",
            );
            let page = profile_html(&state, &viewer, &animal, &form, &rejected)?;
            Ok(store_rejection(&err, page))
        }
    }
}

pub(super) async fn delete_treatment(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    RecordPath((id, treatment_id)): RecordPath<(u64, u64)>,
) -> AppResult<Response> {
    require(&viewer, Action::DeleteTreatment)?;
    let treatment = state.store.get_treatment(TreatmentId(treatment_id))?;
    if treatment.animal_id != AnimalId(id) {
        return Err(AppError::NotFound);
    }
    if !can_delete_treatment(viewer.id, viewer.role, &treatment) {
        return Err(AppError::Forbidden(
            "You can only delete your own treatments.".to_string(),
        ));
    }
    state.store.delete_treatment(treatment.id)?;
    info!(treatment = treatment_id, animal = id, by = viewer.id.0, "treatment deleted");
    Ok(see_other(&format!("/home/animals/{id}")))
}
