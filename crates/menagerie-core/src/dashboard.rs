//! # Dashboard
//!
//! Summary cards on `/home`. Pure computation over already-loaded rows, so
//! the handler decides what to load and the numbers stay testable.

use crate::model::{Animal, Habitat, HealthStatus, Task, TaskPriority, User};
use crate::{HabitatId, SECONDS_PER_DAY, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;

/// Numbers shown on the home page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Tasks assigned to the viewer that still need work.
    pub active_tasks: usize,
    /// Active tasks marked urgent.
    pub urgent_tasks: usize,
    /// Active tasks due today (UTC).
    pub due_today: usize,
    pub animals_total: usize,
    pub animals_unhealthy: usize,
    /// Animals that arrived this calendar month (UTC).
    pub animals_new_this_month: usize,
    pub habitats_total: usize,
    pub habitats_closed: usize,
    /// Habitats at or over capacity.
    pub habitats_full: usize,
}

impl DashboardStats {
    #[must_use]
    pub fn compute(
        user: &User,
        now: Timestamp,
        tasks: &[Task],
        animals: &[Animal],
        habitats: &[Habitat],
    ) -> Self {
        let day_start = Timestamp(now.0.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY);
        let day_end = day_start.plus_days(1);
        let month_start = month_start(now);

        let mine: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.assigned_to == Some(user.id) && t.status.is_active())
            .collect();

        let mut residents: BTreeMap<HabitatId, u32> = BTreeMap::new();
        for animal in animals {
            if let Some(habitat) = animal.habitat_id {
                *residents.entry(habitat).or_insert(0) += 1;
            }
        }

        Self {
            active_tasks: mine.len(),
            urgent_tasks: mine
                .iter()
                .filter(|t| t.priority == TaskPriority::Urgent)
                .count(),
            due_today: mine
                .iter()
                .filter(|t| t.due_date.is_some_and(|d| d >= day_start && d < day_end))
                .count(),
            animals_total: animals.len(),
            animals_unhealthy: animals
                .iter()
                .filter(|a| a.health_status == HealthStatus::Unhealthy)
                .count(),
            animals_new_this_month: month_start.map_or(0, |start| {
                animals.iter().filter(|a| a.arrival_date >= start).count()
            }),
            habitats_total: habitats.len(),
            habitats_closed: habitats.iter().filter(|h| h.closed).count(),
            habitats_full: habitats
                .iter()
                .filter(|h| residents.get(&h.id).copied().unwrap_or(0) >= h.capacity)
                .count(),
        }
    }
}

fn month_start(now: Timestamp) -> Option<Timestamp> {
    let date = now.date()?;
    let first = date.replace_day(1).ok()?;
    Some(Timestamp::from_date(first))
}
