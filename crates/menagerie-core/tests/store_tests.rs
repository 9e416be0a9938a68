//! Integration tests for the redb store and the seeding run.

#![allow(clippy::unwrap_used, clippy::panic)]

use menagerie_core::model::{HealthStatus, Role, Sex, TaskPriority, TaskStatus, TaskType};
use menagerie_core::seed::{self, FIXED_HABITATS, SeedPlan};
use menagerie_core::validation::{
    AnimalInput, HabitatInput, NewUser, TaskInput, TreatmentInput, UserUpdate,
};
use menagerie_core::{
    AnimalId, HabitatId, TaskFilter, Timestamp, UserId, ZooError, ZooStore,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

// =============================================================================
// HELPERS
// =============================================================================

fn create_store() -> (TempDir, ZooStore) {
    let dir = TempDir::new().unwrap();
    let store = ZooStore::open(dir.path().join("zoo.redb")).unwrap();
    (dir, store)
}

fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        name: "Test Keeper".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        role,
    }
}

fn animal(name: &str, habitat: Option<HabitatId>) -> AnimalInput {
    AnimalInput {
        name: name.to_string(),
        species: "Ailurus fulgens".to_string(),
        common_name: "Red Panda".to_string(),
        age: 3,
        sex: Sex::Female,
        health_status: HealthStatus::Healthy,
        weight: Some(5.2),
        image_url: None,
        habitat_id: habitat,
    }
}

fn habitat(number: u32) -> HabitatInput {
    HabitatInput {
        number,
        name: format!("Habitat {number}"),
        kind: "forest".to_string(),
        capacity: 4,
        color: None,
        closed: false,
    }
}

fn task(kind: TaskType) -> TaskInput {
    TaskInput {
        title: "Morning round".to_string(),
        description: None,
        kind,
        priority: TaskPriority::Medium,
        due_date: None,
        assigned_to: None,
        animal_id: None,
        habitat_id: None,
        treatment_id: None,
    }
}

// =============================================================================
// USERS
// =============================================================================

#[test]
fn test_create_user_lowercases_and_indexes_email() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("Keeper@Zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    assert_eq!(user.email, "keeper@zoo.com");

    let found = store.find_user_by_email("KEEPER@zoo.com").unwrap().unwrap();
    assert_eq!(found.id, user.id);
}

#[test]
fn test_duplicate_email_is_conflict() {
    let (_dir, store) = create_store();
    store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    let err = store
        .create_user(&new_user("keeper@zoo.com", Role::Admin), Timestamp(2))
        .unwrap_err();
    assert!(matches!(err, ZooError::Conflict { field: "email", .. }));
    assert_eq!(store.count_users().unwrap(), 1);
}

#[test]
fn test_authenticate_checks_password() {
    let (_dir, store) = create_store();
    store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();

    assert!(store.authenticate("keeper@zoo.com", "password123").unwrap().is_some());
    assert!(store.authenticate("keeper@zoo.com", "password124").unwrap().is_none());
    assert!(store.authenticate("nobody@zoo.com", "password123").unwrap().is_none());
}

#[test]
fn test_stored_password_is_argon2_phc() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    assert!(user.password_hash.starts_with("$argon2id$"), "{}", user.password_hash);
    assert!(!user.password_hash.contains("password123"));

    // Read back from redb, the string still verifies.
    let reloaded = store.find_user_by_email("keeper@zoo.com").unwrap().unwrap();
    assert_eq!(reloaded.password_hash, user.password_hash);
    assert!(store.authenticate("keeper@zoo.com", "password123").unwrap().is_some());
}

#[test]
fn test_unknown_email_costs_a_hash_verification() {
    use std::time::{Duration, Instant};

    let (_dir, store) = create_store();
    store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();

    // Warm the throwaway hash so its one-time creation is not measured.
    assert!(store.authenticate("nobody@zoo.com", "x").unwrap().is_none());

    let fastest = |email: &str| {
        (0..3)
            .map(|_| {
                let start = Instant::now();
                assert!(store.authenticate(email, "wrong-password").unwrap().is_none());
                start.elapsed()
            })
            .min()
            .unwrap_or(Duration::ZERO)
    };
    let known = fastest("keeper@zoo.com");
    let unknown = fastest("nobody@zoo.com");
    assert!(
        unknown * 4 >= known,
        "unknown email answered in {unknown:?}, known in {known:?}"
    );
}

#[test]
fn test_update_user_moves_email_index_and_keeps_password() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("old@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    let update = UserUpdate {
        name: "Renamed".to_string(),
        email: "new@zoo.com".to_string(),
        password: None,
        role: Role::Admin,
    };
    let updated = store.update_user(user.id, &update, Timestamp(2)).unwrap();

    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.password_hash, user.password_hash);
    assert!(store.find_user_by_email("old@zoo.com").unwrap().is_none());
    assert!(store.authenticate("new@zoo.com", "password123").unwrap().is_some());
}

#[test]
fn test_update_user_rejects_taken_email() {
    let (_dir, store) = create_store();
    store
        .create_user(&new_user("a@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    let b = store
        .create_user(&new_user("b@zoo.com", Role::Staff), Timestamp(1))
        .unwrap();
    let update = UserUpdate {
        name: "B".to_string(),
        email: "a@zoo.com".to_string(),
        password: None,
        role: Role::Staff,
    };
    let err = store.update_user(b.id, &update, Timestamp(2)).unwrap_err();
    assert!(matches!(err, ZooError::Conflict { field: "email", .. }));
}

#[test]
fn test_role_change_reaches_cached_session() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    let session = store.create_session(user.id, 3_600, Timestamp(10)).unwrap();

    // Warm the cache.
    let active = store.resolve_session(&session.token, Timestamp(20)).unwrap().unwrap();
    assert_eq!(active.user.role, Role::Staff);

    let update = UserUpdate {
        name: user.name.clone(),
        email: user.email.clone(),
        password: None,
        role: Role::Admin,
    };
    store.update_user(user.id, &update, Timestamp(30)).unwrap();

    let active = store.resolve_session(&session.token, Timestamp(40)).unwrap().unwrap();
    assert_eq!(active.user.role, Role::Admin);
}

// =============================================================================
// SESSIONS
// =============================================================================

#[test]
fn test_logout_removes_session() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    let session = store.create_session(user.id, 3_600, Timestamp(0)).unwrap();
    assert!(store.resolve_session(&session.token, Timestamp(1)).unwrap().is_some());

    store.delete_session(&session.token).unwrap();
    assert!(store.resolve_session(&session.token, Timestamp(2)).unwrap().is_none());
}

#[test]
fn test_logout_wins_against_concurrent_lookups() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();

    for round in 0..20 {
        let session = store.create_session(user.id, 3_600, Timestamp(0)).unwrap();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(Ordering::Acquire) {
                        let _ = store.resolve_session(&session.token, Timestamp(1)).unwrap();
                    }
                });
            }
            store.delete_session(&session.token).unwrap();
            done.store(true, Ordering::Release);
        });

        assert!(
            store.resolve_session(&session.token, Timestamp(2)).unwrap().is_none(),
            "session revived after logout in round {round}"
        );
    }
    assert_eq!(store.stats().unwrap().sessions, 0);
}

#[test]
fn test_unknown_token_resolves_to_nothing() {
    let (_dir, store) = create_store();
    assert!(store.resolve_session("not-a-token", Timestamp(0)).unwrap().is_none());
}

#[test]
fn test_purge_expired_sessions() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    store.create_session(user.id, 10, Timestamp(0)).unwrap();
    store.create_session(user.id, 10, Timestamp(0)).unwrap();
    let live = store.create_session(user.id, 1_000, Timestamp(0)).unwrap();

    assert_eq!(store.purge_expired_sessions(Timestamp(100)).unwrap(), 2);
    assert_eq!(store.stats().unwrap().sessions, 1);
    assert!(store.resolve_session(&live.token, Timestamp(100)).unwrap().is_some());
}

#[test]
fn test_session_tokens_are_unique() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    let a = store.create_session(user.id, 60, Timestamp(0)).unwrap();
    let b = store.create_session(user.id, 60, Timestamp(0)).unwrap();
    assert_ne!(a.token, b.token);
    assert!(a.token.len() >= 43);
}

// =============================================================================
// ANIMALS, HABITATS, TREATMENTS
// =============================================================================

#[test]
fn test_animal_update_keeps_arrival() {
    let (_dir, store) = create_store();
    let created = store.create_animal(&animal("Mei", None), Timestamp(100)).unwrap();
    let mut input = animal("Mei", None);
    input.age = 4;
    let updated = store.update_animal(created.id, &input, Timestamp(200)).unwrap();

    assert_eq!(updated.age, 4);
    assert_eq!(updated.arrival_date, Timestamp(100));
    assert_eq!(updated.updated_at, Timestamp(200));
}

#[test]
fn test_animal_update_can_keep_its_own_name() {
    let (_dir, store) = create_store();
    let a = store.create_animal(&animal("Mei", None), Timestamp(1)).unwrap();
    let b = store.create_animal(&animal("Lin", None), Timestamp(1)).unwrap();

    assert!(store.update_animal(a.id, &animal("Mei", None), Timestamp(2)).is_ok());
    let err = store.update_animal(b.id, &animal("Mei", None), Timestamp(2)).unwrap_err();
    assert!(matches!(err, ZooError::Conflict { field: "name", .. }));
}

#[test]
fn test_habitat_numbers_are_unique() {
    let (_dir, store) = create_store();
    let one = store.insert_habitat(&habitat(1), vec![0, 0, 5, 0, 5, 5], Timestamp(0)).unwrap();
    store.insert_habitat(&habitat(2), vec![], Timestamp(0)).unwrap();

    let err = store.insert_habitat(&habitat(2), vec![], Timestamp(0)).unwrap_err();
    assert!(matches!(err, ZooError::Conflict { field: "number", .. }));

    let err = store.update_habitat(one.id, &habitat(2), Timestamp(1)).unwrap_err();
    assert!(matches!(err, ZooError::Conflict { field: "number", .. }));

    let moved = store.update_habitat(one.id, &habitat(9), Timestamp(1)).unwrap();
    assert_eq!(moved.number, 9);
    assert_eq!(moved.coordinates, vec![0, 0, 5, 0, 5, 5]);
    // Number 1 is free again.
    assert!(store.insert_habitat(&habitat(1), vec![], Timestamp(2)).is_ok());
}

#[test]
fn test_habitats_list_by_number_with_residents() {
    let (_dir, store) = create_store();
    let h3 = store.insert_habitat(&habitat(3), vec![], Timestamp(0)).unwrap();
    let h1 = store.insert_habitat(&habitat(1), vec![], Timestamp(0)).unwrap();
    store.create_animal(&animal("A", Some(h3.id)), Timestamp(0)).unwrap();
    store.create_animal(&animal("B", Some(h3.id)), Timestamp(0)).unwrap();

    let numbers: Vec<u32> = store.list_habitats().unwrap().iter().map(|h| h.number).collect();
    assert_eq!(numbers, vec![1, 3]);

    let residents = store.habitat_residents().unwrap();
    assert_eq!(residents.get(&h3.id), Some(&2));
    assert_eq!(residents.get(&h1.id), None);
}

#[test]
fn test_delete_animal_cascades() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let mei = store.create_animal(&animal("Mei", None), Timestamp(0)).unwrap();
    let lin = store.create_animal(&animal("Lin", None), Timestamp(0)).unwrap();

    let checkup = TreatmentInput {
        animal_id: mei.id,
        title: "Checkup".to_string(),
        notes: None,
        date: Timestamp(0),
    };
    let treatment = store.create_treatment(&checkup, admin.id, Timestamp(0)).unwrap();
    let other = store
        .create_treatment(
            &TreatmentInput {
                animal_id: lin.id,
                ..checkup.clone()
            },
            admin.id,
            Timestamp(0),
        )
        .unwrap();

    let mut medical = task(TaskType::Medical);
    medical.animal_id = Some(mei.id);
    medical.treatment_id = Some(treatment.id);
    let medical = store.create_task(&medical, admin.id, Timestamp(1)).unwrap();

    store.delete_animal(mei.id).unwrap();

    assert!(matches!(
        store.get_animal(mei.id),
        Err(ZooError::NotFound { entity: "animal", .. })
    ));
    let remaining: Vec<_> = store.list_treatments().unwrap().iter().map(|t| t.id).collect();
    assert_eq!(remaining, vec![other.id]);

    let kept = store.get_task(medical.id).unwrap();
    assert_eq!(kept.animal_id, None);
    assert_eq!(kept.treatment_id, None);
}

#[test]
fn test_delete_missing_animal_is_not_found() {
    let (_dir, store) = create_store();
    let err = store.delete_animal(AnimalId(42)).unwrap_err();
    assert!(matches!(err, ZooError::NotFound { entity: "animal", id: 42 }));
}

#[test]
fn test_treatment_requires_animal_and_sorts_by_date() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let missing = TreatmentInput {
        animal_id: AnimalId(7),
        title: "Dental".to_string(),
        notes: None,
        date: Timestamp(0),
    };
    assert!(matches!(
        store.create_treatment(&missing, admin.id, Timestamp(0)),
        Err(ZooError::NotFound { entity: "animal", id: 7 })
    ));

    let mei = store.create_animal(&animal("Mei", None), Timestamp(0)).unwrap();
    for (title, date) in [("Old", "2024-01-01"), ("New", "2025-01-01")] {
        let input = TreatmentInput {
            animal_id: mei.id,
            title: title.to_string(),
            notes: None,
            date: Timestamp::parse_date(date).unwrap(),
        };
        store.create_treatment(&input, admin.id, Timestamp(0)).unwrap();
    }
    let titles: Vec<String> = store
        .treatments_for_animal(mei.id)
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["New", "Old"]);
}

#[test]
fn test_delete_treatment_unlinks_tasks() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let mei = store.create_animal(&animal("Mei", None), Timestamp(0)).unwrap();
    let treatment = store
        .create_treatment(
            &TreatmentInput {
                animal_id: mei.id,
                title: "Vaccination".to_string(),
                notes: Some("Annual".to_string()),
                date: Timestamp(0),
            },
            admin.id,
            Timestamp(0),
        )
        .unwrap();
    let mut input = task(TaskType::Medical);
    input.animal_id = Some(mei.id);
    input.treatment_id = Some(treatment.id);
    let linked = store.create_task(&input, admin.id, Timestamp(0)).unwrap();

    store.delete_treatment(treatment.id).unwrap();

    let kept = store.get_task(linked.id).unwrap();
    assert_eq!(kept.treatment_id, None);
    assert_eq!(kept.animal_id, Some(mei.id));
}

// =============================================================================
// TASKS
// =============================================================================

#[test]
fn test_task_filters_and_order() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let keeper = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    let other_admin = store
        .create_user(&new_user("other@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();

    let mut assigned = task(TaskType::General);
    assigned.assigned_to = Some(keeper.id);
    let first = store.create_task(&assigned, admin.id, Timestamp(10)).unwrap();
    let second = store.create_task(&task(TaskType::General), admin.id, Timestamp(20)).unwrap();
    let third = store.create_task(&assigned, other_admin.id, Timestamp(30)).unwrap();

    let all: Vec<_> = store.list_tasks(TaskFilter::All).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(all, vec![third.id, second.id, first.id]);

    let created: Vec<_> = store
        .list_tasks(TaskFilter::CreatedBy(admin.id))
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(created, vec![second.id, first.id]);

    let mine: Vec<_> = store
        .list_tasks(TaskFilter::AssignedTo(keeper.id))
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(mine, vec![third.id, first.id]);

    // Touching a task moves it to the top.
    store.set_task_status(first.id, TaskStatus::InProgress, Timestamp(40)).unwrap();
    let all: Vec<_> = store.list_tasks(TaskFilter::All).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(all[0], first.id);
}

#[test]
fn test_task_status_lifecycle() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let created = store.create_task(&task(TaskType::General), admin.id, Timestamp(0)).unwrap();
    assert_eq!(created.status, TaskStatus::Todo);

    let started = store.set_task_status(created.id, TaskStatus::InProgress, Timestamp(5)).unwrap();
    assert_eq!(started.start_at, Some(Timestamp(5)));

    let done = store.set_task_status(created.id, TaskStatus::Done, Timestamp(9)).unwrap();
    assert_eq!(done.completed_at, Some(Timestamp(9)));

    let reopened = store.set_task_status(created.id, TaskStatus::Todo, Timestamp(12)).unwrap();
    assert_eq!(reopened.completed_at, None);
    assert_eq!(reopened.start_at, Some(Timestamp(5)));
}

#[test]
fn test_update_task_keeps_status() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let created = store.create_task(&task(TaskType::General), admin.id, Timestamp(0)).unwrap();
    store.set_task_status(created.id, TaskStatus::Blocked, Timestamp(1)).unwrap();

    let mut edit = task(TaskType::Inventory);
    edit.title = "Count supplies".to_string();
    edit.priority = TaskPriority::Urgent;
    let updated = store.update_task(created.id, &edit, Timestamp(2)).unwrap();

    assert_eq!(updated.status, TaskStatus::Blocked);
    assert_eq!(updated.kind, TaskType::Inventory);
    assert_eq!(updated.created_by, admin.id);
}

#[test]
fn test_delete_task() {
    let (_dir, store) = create_store();
    let admin = store
        .create_user(&new_user("admin@zoo.com", Role::Admin), Timestamp(0))
        .unwrap();
    let created = store.create_task(&task(TaskType::General), admin.id, Timestamp(0)).unwrap();
    store.delete_task(created.id).unwrap();
    assert!(store.get_task(created.id).is_err());
    assert!(store.delete_task(created.id).is_err());
}

// =============================================================================
// PERSISTENCE & MAINTENANCE
// =============================================================================

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zoo.redb");
    {
        let store = ZooStore::open(&path).unwrap();
        store
            .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
            .unwrap();
        store.create_animal(&animal("Mei", None), Timestamp(0)).unwrap();
    }
    let store = ZooStore::open(&path).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.users, 1);
    assert_eq!(stats.animals, 1);
    // Counters persist too.
    let next = store.create_animal(&animal("Lin", None), Timestamp(1)).unwrap();
    assert_eq!(next.id, AnimalId(2));
}

#[test]
fn test_clear_all_resets_everything() {
    let (_dir, store) = create_store();
    let user = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(0))
        .unwrap();
    let session = store.create_session(user.id, 60, Timestamp(0)).unwrap();
    store.create_animal(&animal("Mei", None), Timestamp(0)).unwrap();

    store.clear_all().unwrap();

    assert!(store.stats().unwrap().is_empty());
    assert!(store.resolve_session(&session.token, Timestamp(1)).unwrap().is_none());
    let again = store
        .create_user(&new_user("keeper@zoo.com", Role::Staff), Timestamp(2))
        .unwrap();
    assert_eq!(again.id, UserId(1));
}

// =============================================================================
// SEEDING
// =============================================================================

#[test]
fn test_seed_small_zoo() {
    let (_dir, store) = create_store();
    let plan = SeedPlan {
        users: 2,
        animals: 6,
        treatments: 5,
        tasks: 20,
    };
    let mut rng = StdRng::seed_from_u64(42);
    let now = Timestamp::parse_date("2025-06-01").unwrap();
    let report = seed::run(&store, &plan, &mut rng, now).unwrap();

    assert_eq!(report.habitats, FIXED_HABITATS.len());
    assert!((3..=5).contains(&report.users));
    assert_eq!(report.treatments, 5);
    assert_eq!(report.tasks, 20);

    let stats = store.stats().unwrap();
    assert_eq!(stats.users as usize, report.users);
    assert_eq!(stats.animals as usize, report.animals);
    assert_eq!(stats.tasks, 20);

    assert_eq!(
        store.authenticate("superadmin@zoo.com", "sadmin123").unwrap().map(|u| u.role),
        Some(Role::SuperAdmin)
    );
    assert_eq!(
        store.authenticate("staff@zoo.com", "staff123").unwrap().map(|u| u.role),
        Some(Role::Staff)
    );
}

#[test]
fn test_seed_twice_skips_fixed_rows() {
    let (_dir, store) = create_store();
    let plan = SeedPlan {
        users: 0,
        animals: 0,
        treatments: 0,
        tasks: 0,
    };
    let now = Timestamp(1_700_000_000);
    let first = seed::run(&store, &plan, &mut StdRng::seed_from_u64(1), now).unwrap();
    assert_eq!(first.users, 3);
    assert_eq!(first.skipped, 0);

    let second = seed::run(&store, &plan, &mut StdRng::seed_from_u64(1), now).unwrap();
    assert_eq!(second.users, 0);
    assert_eq!(second.habitats, 0);
    assert_eq!(second.skipped, 3 + FIXED_HABITATS.len());
}
