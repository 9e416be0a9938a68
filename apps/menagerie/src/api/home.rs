//! Dashboard cards on `/home`.

use super::session::CurrentUser;
use super::{AppState, html};
use crate::error::AppResult;
use axum::extract::State;
use axum::response::Html;
use menagerie_core::dashboard::DashboardStats;
use menagerie_core::{TaskFilter, Timestamp};
use std::fmt::Write as _;

fn stat_card(title: &str, main_label: &str, main: usize, extra: &[(&str, usize)], href: &str, cta: &str) -> String {
    let mut body = format!(
        "<p class=\"muted\">{}</p><p class=\"stat\">{main}</p>",
        html::escape(main_label)
    );
    for (label, value) in extra {
        let _ = write!(body, "<p>{}: <strong>{value}</strong></p>", html::escape(label));
    }
    body.push_str(&html::link_button(href, cta));
    html::card(title, &body)
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let tasks = state.store.list_tasks(TaskFilter::AssignedTo(user.id))?;
    let animals = state.store.list_animals()?;
    let habitats = state.store.list_habitats()?;
    let stats = DashboardStats::compute(&user, Timestamp::now(), &tasks, &animals, &habitats);

    let mut content = String::from("<div class=\"cards\">");
    content.push_str(&stat_card(
        "Tasks",
        "Active tasks",
        stats.active_tasks,
        &[("Urgent", stats.urgent_tasks), ("Due today", stats.due_today)],
        "/home/tasks",
        "Go to Tasks",
    ));
    content.push_str(&stat_card(
        "Animals",
        "Total animals",
        stats.animals_total,
        &[
            ("Unhealthy", stats.animals_unhealthy),
            ("New this month", stats.animals_new_this_month),
        ],
        "/home/animals",
        "Go to Animals",
    ));
    content.push_str(&stat_card(
        "Habitats",
        "Total habitats",
        stats.habitats_total,
        &[("Closed", stats.habitats_closed), ("Full", stats.habitats_full)],
        "/home/habitats",
        "Go to Habitats",
    ));
    content.push_str("</div>");

    let title = format!("Welcome, {}", user.label());
    Ok(Html(html::page(&title, &user, "/home", &content)))
}
