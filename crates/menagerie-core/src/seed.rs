//! # Seeding
//!
//! Fills an empty store with a demo zoo: three fixed accounts, the fixed
//! habitat layout, then random staff, animals, treatments and tasks.
//!
//! All randomness flows through the caller's [`Rng`], so a fixed seed
//! reproduces the same zoo (password salts aside).
//!
//! Records that collide with an existing row (duplicate email, duplicate
//! animal name and species) are skipped and counted, never fatal.

use crate::model::{Animal, HealthStatus, Role, Sex, Task, TaskPriority, TaskStatus, TaskType};
use crate::storage::ZooStore;
use crate::validation::{HabitatInput, NewUser, TreatmentInput};
use crate::{
    AnimalId, HabitatId, Result, SECONDS_PER_DAY, TaskId, Timestamp, TreatmentId, UserId, ZooError,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use serde::Serialize;

// =============================================================================
// PLAN
// =============================================================================

/// How many random records to generate on top of the fixed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPlan {
    pub users: usize,
    pub animals: usize,
    pub treatments: usize,
    pub tasks: usize,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            users: 10,
            animals: 30,
            treatments: 50,
            tasks: 120,
        }
    }
}

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub habitats: usize,
    pub animals: usize,
    pub treatments: usize,
    pub tasks: usize,
    /// Rows dropped because they collided with existing ones.
    pub skipped: usize,
}

// =============================================================================
// FIXED DATA
// =============================================================================

/// Demo accounts: `(name, email, password, role)`.
pub const FIXED_USERS: [(&str, &str, &str, Role); 3] = [
    ("SUPER_ADMIN", "superadmin@zoo.com", "sadmin123", Role::SuperAdmin),
    ("Admin", "admin@zoo.com", "admin123", Role::Admin),
    ("Staff Member", "staff@zoo.com", "staff123", Role::Staff),
];

/// A habitat in the fixed map layout.
#[derive(Debug, Clone, Copy)]
pub struct HabitatTemplate {
    pub number: u32,
    pub name: &'static str,
    pub kind: &'static str,
    pub capacity: u32,
    pub coordinates: &'static [i32],
    pub color: &'static str,
    pub closed: bool,
}

/// Enclosures inside the perimeter fence.
pub const FIXED_HABITATS: &[HabitatTemplate] = &[
    HabitatTemplate {
        number: 1,
        name: "Lion Savanna",
        kind: "savanna",
        capacity: 6,
        coordinates: &[30, 30, 90, 25, 100, 70, 40, 80],
        color: "#F5DEB3",
        closed: false,
    },
    HabitatTemplate {
        number: 2,
        name: "Tropical Jungle",
        kind: "jungle",
        capacity: 12,
        coordinates: &[110, 20, 180, 15, 185, 60, 115, 65],
        color: "#86EFAC",
        closed: false,
    },
    HabitatTemplate {
        number: 3,
        name: "Polar Ice",
        kind: "ice",
        capacity: 4,
        coordinates: &[195, 25, 260, 40, 255, 85, 200, 75],
        color: "#E0F2FE",
        closed: false,
    },
    HabitatTemplate {
        number: 4,
        name: "Reptile Desert",
        kind: "desert",
        capacity: 8,
        coordinates: &[40, 95, 95, 90, 100, 140, 45, 145],
        color: "#FDE68A",
        closed: false,
    },
    HabitatTemplate {
        number: 5,
        name: "Flamingo Lagoon",
        kind: "water",
        capacity: 10,
        coordinates: &[110, 80, 170, 78, 175, 125, 115, 130],
        color: "#93C5FD",
        closed: false,
    },
    HabitatTemplate {
        number: 6,
        name: "Mountain Ridge",
        kind: "mountain",
        capacity: 5,
        coordinates: &[185, 95, 250, 95, 240, 150, 190, 145],
        color: "#CBD5E1",
        closed: false,
    },
    HabitatTemplate {
        number: 7,
        name: "Bamboo Forest",
        kind: "forest",
        capacity: 4,
        coordinates: &[110, 140, 170, 140, 165, 190, 115, 195],
        color: "#BBF7D0",
        closed: false,
    },
    HabitatTemplate {
        number: 8,
        name: "Swamp House",
        kind: "swamp",
        capacity: 3,
        coordinates: &[185, 160, 235, 160, 230, 195, 190, 200],
        color: "#A7F3D0",
        closed: true,
    },
];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Mihai", "Elena", "Andrei", "Ioana", "Radu", "Maria", "Vlad", "Sofia", "Luca", "Irina",
    "Dan", "Clara", "Paul", "Nora", "Tudor",
];

const LAST_NAMES: &[&str] = &[
    "Popescu", "Ionescu", "Stan", "Dumitru", "Marin", "Rusu", "Munteanu", "Stoica", "Matei",
    "Florea", "Barbu", "Lazar",
];

const PET_NAMES: &[&str] = &[
    "Simba", "Nala", "Kiara", "Zuri", "Bongo", "Tango", "Luna", "Pip", "Koda", "Mango", "Olive",
    "Rocky", "Sunny", "Pearl", "Ziggy", "Bruno", "Maple", "Echo", "Juniper", "Kovu",
];

const COMMON_NAMES: &[&str] = &[
    "Lion", "Zebra", "Red Panda", "Penguin", "Giraffe", "Flamingo", "Snow Leopard", "Otter",
    "Komodo Dragon", "Lemur", "Tapir", "Meerkat",
];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
];

const TREATMENT_TITLES: &[&str] = &["Vaccination", "Checkup", "Dental", "Blood test"];

const STATUS_WEIGHTS: &[(TaskStatus, u32)] = &[
    (TaskStatus::Todo, 45),
    (TaskStatus::InProgress, 25),
    (TaskStatus::Blocked, 10),
    (TaskStatus::Done, 18),
    (TaskStatus::Canceled, 2),
];

// =============================================================================
// TASK HEURISTICS
// =============================================================================

/// Records a generated task points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskLinks {
    pub animal_id: Option<AnimalId>,
    pub habitat_id: Option<HabitatId>,
    pub treatment_id: Option<TreatmentId>,
}

/// Decide what a generated task of `kind` is about.
///
/// `treatments` pairs each treatment with its animal so a medical task
/// linked to a treatment also names the treated animal.
pub fn link_task<R: Rng>(
    rng: &mut R,
    kind: TaskType,
    animals: &[AnimalId],
    habitats: &[HabitatId],
    treatments: &[(TreatmentId, AnimalId)],
) -> TaskLinks {
    let mut links = TaskLinks::default();
    match kind {
        TaskType::Medical => {
            if !treatments.is_empty() && rng.gen_bool(0.8) {
                if let Some(&(treatment, animal)) = treatments.choose(rng) {
                    links.treatment_id = Some(treatment);
                    links.animal_id = Some(animal);
                }
            } else {
                links.animal_id = animals.choose(rng).copied();
            }
        }
        TaskType::Feeding => {
            links.animal_id = animals.choose(rng).copied();
        }
        TaskType::Transfer => {
            links.animal_id = animals.choose(rng).copied();
            if rng.gen_bool(0.6) {
                links.habitat_id = habitats.choose(rng).copied();
            }
        }
        TaskType::Cleaning | TaskType::Maintenance => {
            links.habitat_id = habitats.choose(rng).copied();
            if rng.gen_bool(0.25) {
                links.animal_id = animals.choose(rng).copied();
            }
        }
        TaskType::Inventory => {
            if rng.gen_bool(0.15) {
                links.habitat_id = habitats.choose(rng).copied();
            }
        }
        TaskType::General => {
            if rng.gen_bool(0.2) {
                links.animal_id = animals.choose(rng).copied();
            }
            if rng.gen_bool(0.2) {
                links.habitat_id = habitats.choose(rng).copied();
            }
        }
    }
    links
}

/// Draw a status: mostly open work, few cancellations.
pub fn pick_status<R: Rng>(rng: &mut R) -> TaskStatus {
    STATUS_WEIGHTS
        .choose_weighted(rng, |(_, weight)| *weight)
        .map_or(TaskStatus::Todo, |(status, _)| *status)
}

/// Title pool per category.
#[must_use]
pub fn titles_for(kind: TaskType) -> &'static [&'static str] {
    match kind {
        TaskType::General => &["General check", "Staff briefing", "Update records"],
        TaskType::Feeding => &["Prepare feeding", "Feed animal", "Check feeding schedule"],
        TaskType::Cleaning => &["Clean habitat", "Disinfect enclosure", "Replace bedding"],
        TaskType::Medical => &["Medical follow-up", "Vet check", "Administer treatment"],
        TaskType::Maintenance => &["Fix gate", "Inspect fence", "Repair water system"],
        TaskType::Transfer => &["Prepare transfer", "Move animal", "Habitat reassignment"],
        TaskType::Inventory => &["Count supplies", "Order food", "Check medical stock"],
    }
}

// =============================================================================
// GENERATORS
// =============================================================================

fn pick<'a, R: Rng>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn words<R: Rng>(rng: &mut R, count: usize) -> String {
    (0..count).map(|_| pick(rng, LOREM)).collect::<Vec<_>>().join(" ")
}

fn sentence<R: Rng>(rng: &mut R) -> String {
    let count = rng.gen_range(6..=10);
    let mut text = words(rng, count);
    if let Some(first) = text.get(..1) {
        let upper = first.to_uppercase();
        text.replace_range(..1, &upper);
    }
    text.push('.');
    text
}

/// Midnight UTC `days` days before `now`.
fn days_ago(now: Timestamp, days: i64) -> Timestamp {
    let midnight = now.0.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
    Timestamp(midnight).plus_days(-days)
}

fn random_user<R: Rng>(rng: &mut R) -> NewUser {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let suffix: u32 = rng.gen_range(1..1000);
    let password: String = (0..12)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    NewUser {
        name: format!("{first} {last}"),
        email: format!("{}.{}{suffix}@zoo.com", first.to_lowercase(), last.to_lowercase()),
        password,
        role: if rng.gen_bool(0.5) { Role::Staff } else { Role::Admin },
    }
}

fn random_animal<R: Rng>(
    rng: &mut R,
    index: usize,
    habitats: &[HabitatId],
    now: Timestamp,
) -> Animal {
    let weight_tenths: u32 = rng.gen_range(50..=5000);
    let arrival = now.plus_seconds(-rng.gen_range(0..3 * 365 * SECONDS_PER_DAY));
    Animal {
        id: AnimalId(0),
        name: pick(rng, PET_NAMES).to_string(),
        species: words(rng, 3),
        common_name: pick(rng, COMMON_NAMES).to_string(),
        age: rng.gen_range(1..=15),
        sex: Sex::ALL.choose(rng).copied().unwrap_or(Sex::Unknown),
        weight: Some(f64::from(weight_tenths) / 10.0),
        image_url: Some(format!("https://picsum.photos/400/400?random={index}")),
        health_status: HealthStatus::ALL
            .choose(rng)
            .copied()
            .unwrap_or(HealthStatus::Healthy),
        habitat_id: habitats.choose(rng).copied(),
        arrival_date: arrival,
        created_at: now,
        updated_at: now,
    }
}

struct TaskPools<'a> {
    users: &'a [UserId],
    animals: &'a [AnimalId],
    habitats: &'a [HabitatId],
    treatments: &'a [(TreatmentId, AnimalId)],
}

fn random_task<R: Rng>(rng: &mut R, pools: &TaskPools<'_>, now: Timestamp) -> Option<Task> {
    let kind = TaskType::ALL.choose(rng).copied()?;
    let priority = TaskPriority::ALL.choose(rng).copied()?;
    let status = pick_status(rng);
    let created_by = pools.users.choose(rng).copied()?;
    let assigned_to = if rng.gen_bool(0.75) {
        pools.users.choose(rng).copied()
    } else {
        None
    };

    let due_date = if status == TaskStatus::Done {
        days_ago(now, rng.gen_range(0..30))
    } else {
        days_ago(now, -rng.gen_range(1..=30_i64))
    };
    let start_at = matches!(status, TaskStatus::InProgress | TaskStatus::Done)
        .then(|| now.plus_seconds(-rng.gen_range(0..14 * SECONDS_PER_DAY)));
    let completed_at = match (status, start_at) {
        (TaskStatus::Done, Some(start)) => Some(Timestamp(rng.gen_range(start.0..=now.0))),
        _ => None,
    };

    let links = link_task(rng, kind, pools.animals, pools.habitats, pools.treatments);
    let title = pick(rng, titles_for(kind)).to_string();

    Some(Task {
        id: TaskId(0),
        title,
        description: Some(sentence(rng)),
        kind,
        status,
        priority,
        due_date: Some(due_date),
        start_at,
        completed_at,
        assigned_to,
        created_by,
        animal_id: links.animal_id,
        habitat_id: links.habitat_id,
        treatment_id: links.treatment_id,
        created_at: start_at.unwrap_or(now),
        updated_at: completed_at.or(start_at).unwrap_or(now),
    })
}

// =============================================================================
// RUN
// =============================================================================

/// Count a uniqueness collision as skipped; propagate anything else.
fn skip_conflicts<T>(result: Result<T>, skipped: &mut usize) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ZooError::Conflict { .. }) => {
            *skipped += 1;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Seed `store` according to `plan`.
pub fn run<R: Rng>(
    store: &ZooStore,
    plan: &SeedPlan,
    rng: &mut R,
    now: Timestamp,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (name, email, password, role) in FIXED_USERS {
        let input = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        };
        if skip_conflicts(store.create_user(&input, now), &mut report.skipped)?.is_some() {
            report.users += 1;
        }
    }
    for _ in 0..plan.users {
        let input = random_user(rng);
        if skip_conflicts(store.create_user(&input, now), &mut report.skipped)?.is_some() {
            report.users += 1;
        }
    }

    for template in FIXED_HABITATS {
        let input = HabitatInput {
            number: template.number,
            name: template.name.to_string(),
            kind: template.kind.to_string(),
            capacity: template.capacity,
            color: Some(template.color.to_string()),
            closed: template.closed,
        };
        let inserted = store.insert_habitat(&input, template.coordinates.to_vec(), now);
        if skip_conflicts(inserted, &mut report.skipped)?.is_some() {
            report.habitats += 1;
        }
    }

    let users: Vec<UserId> = store.list_users()?.iter().map(|u| u.id).collect();
    let habitats: Vec<HabitatId> = store.list_habitats()?.iter().map(|h| h.id).collect();

    for index in 0..plan.animals {
        let animal = random_animal(rng, index, &habitats, now);
        if skip_conflicts(store.insert_animal(animal), &mut report.skipped)?.is_some() {
            report.animals += 1;
        }
    }
    let animals: Vec<AnimalId> = store.list_animals()?.iter().map(|a| a.id).collect();

    if !animals.is_empty() {
        for _ in 0..plan.treatments {
            let (Some(&animal_id), Some(&created_by)) = (animals.choose(rng), users.choose(rng))
            else {
                break;
            };
            let input = TreatmentInput {
                animal_id,
                title: pick(rng, TREATMENT_TITLES).to_string(),
                notes: Some(sentence(rng)),
                date: days_ago(now, rng.gen_range(0..365)),
            };
            store.create_treatment(&input, created_by, now)?;
            report.treatments += 1;
        }
    }
    let treatments: Vec<(TreatmentId, AnimalId)> = store
        .list_treatments()?
        .iter()
        .map(|t| (t.id, t.animal_id))
        .collect();

    let pools = TaskPools {
        users: &users,
        animals: &animals,
        habitats: &habitats,
        treatments: &treatments,
    };
    for _ in 0..plan.tasks {
        let Some(task) = random_task(rng, &pools, now) else {
            break;
        };
        store.insert_task(task)?;
        report.tasks += 1;
    }

    Ok(report)
}

// =============================================================================
// TESTS
// =============================================================================
