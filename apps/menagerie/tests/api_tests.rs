//! Integration tests for the Menagerie HTTP server.
//!
//! Each test builds the full router (guard included) over a fresh redb file.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::body::{Body, to_bytes};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, Request, StatusCode};
use axum_test::{TestResponse, TestServer};
use menagerie::api::session::SESSION_COOKIE;
use menagerie::api::{AppState, ServerConfig, create_router};
use menagerie_core::model::{Animal, HealthStatus, Sex};
use menagerie_core::validation::{
    AnimalInput, HabitatInput, NewUser, TaskForm, TreatmentInput, validate_task,
};
use menagerie_core::{Role, TaskFilter, TaskStatus, Timestamp, TreatmentId, User, ZooStore};
use tempfile::TempDir;
use tower::ServiceExt;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct Harness {
    state: AppState,
    server: TestServer,
    _dir: TempDir,
}

fn create_harness_with(config: ServerConfig) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = ZooStore::open(dir.path().join("zoo.redb")).unwrap();
    let state = AppState::new(store, config);
    let server = TestServer::new(create_router(state.clone())).unwrap();
    Harness {
        state,
        server,
        _dir: dir,
    }
}

fn create_harness() -> Harness {
    create_harness_with(ServerConfig::default())
}

impl Harness {
    fn add_user(&self, name: &str, email: &str, role: Role) -> User {
        let input = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            role,
        };
        self.state.store.create_user(&input, Timestamp::now()).unwrap()
    }

    /// Cookie header for a fresh session of `user`.
    fn cookie_for(&self, user: &User) -> HeaderValue {
        let session = self
            .state
            .store
            .create_session(user.id, 3600, Timestamp::now())
            .unwrap();
        HeaderValue::from_str(&format!("{SESSION_COOKIE}={}", session.token)).unwrap()
    }

    fn add_animal(&self, name: &str) -> Animal {
        let input = AnimalInput {
            name: name.to_string(),
            species: "Lutra lutra".to_string(),
            common_name: "Otter".to_string(),
            age: 2,
            sex: Sex::Male,
            health_status: HealthStatus::Healthy,
            weight: None,
            image_url: None,
            habitat_id: None,
        };
        self.state.store.create_animal(&input, Timestamp::now()).unwrap()
    }

    fn add_treatment(&self, animal: &Animal, by: &User) -> TreatmentId {
        let input = TreatmentInput {
            animal_id: animal.id,
            title: "Dental check".to_string(),
            notes: None,
            date: Timestamp::now(),
        };
        self.state
            .store
            .create_treatment(&input, by.id, Timestamp::now())
            .unwrap()
            .id
    }

    fn add_task(&self, title: &str, creator: &User, assignee: &User) {
        let input = validate_task(&TaskForm {
            title: title.to_string(),
            kind: "GENERAL".to_string(),
            priority: "LOW".to_string(),
            assigned_to: assignee.id.0.to_string(),
            ..TaskForm::default()
        })
        .unwrap();
        self.state
            .store
            .create_task(&input, creator.id, Timestamp::now())
            .unwrap();
    }
}

fn location(response: &TestResponse) -> String {
    response
        .header(LOCATION)
        .to_str()
        .unwrap()
        .to_string()
}

fn login_form(email: &str, password: &str) -> Vec<(&'static str, String)> {
    vec![("email", email.to_string()), ("password", password.to_string())]
}

// =============================================================================
// PUBLIC ROUTES
// =============================================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let h = create_harness();
    let response = h.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_through_bare_router() {
    let h = create_harness();
    let app = create_router(h.state.clone());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_root_redirects_anonymous_to_login() {
    let h = create_harness();
    let response = h.server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_root_redirects_signed_in_to_home() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h.server.get("/").add_header(COOKIE, h.cookie_for(&staff)).await;
    assert_eq!(location(&response), "/home");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let h = create_harness();
    let response = h.server.get("/nowhere").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_record_id_shows_404_page() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let cookie = h.cookie_for(&admin);

    for path in ["/home/animals/abc", "/home/tasks/1x", "/home/users/-1/edit"] {
        let response = h.server.get(path).add_header(COOKIE, cookie.clone()).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND, "{path}");
        assert!(response.text().contains("Could not find the requested page."), "{path}");
    }

    let response = h
        .server
        .post("/home/animals/1/treatments/nope/delete")
        .add_header(COOKIE, cookie)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// =============================================================================
// SESSIONS
// =============================================================================

#[tokio::test]
async fn test_anonymous_home_redirects_to_login() {
    let h = create_harness();
    let response = h.server.get("/home").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let h = create_harness();
    h.add_user("Sam", "sam@zoo.com", Role::Staff);

    let response = h
        .server
        .post("/login")
        .form(&login_form("SAM@zoo.com", "password123"))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/home");
    let cookie = response.header(SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(h.state.store.stats().unwrap().sessions, 1);
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let h = create_harness();
    h.add_user("Sam", "sam@zoo.com", Role::Staff);

    let response = h
        .server
        .post("/login")
        .form(&login_form("sam@zoo.com", "wrong-password"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("Invalid credentials."));
}

#[tokio::test]
async fn test_login_attempts_are_rate_limited() {
    let h = create_harness_with(ServerConfig {
        login_attempts_per_minute: 1,
        ..ServerConfig::default()
    });
    h.add_user("Sam", "sam@zoo.com", Role::Staff);

    let first = h
        .server
        .post("/login")
        .form(&login_form("sam@zoo.com", "wrong-password"))
        .await;
    assert_eq!(first.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let second = h
        .server
        .post("/login")
        .form(&login_form("sam@zoo.com", "password123"))
        .await;
    assert_eq!(second.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.text().contains("Too many login attempts"));
}

#[tokio::test]
async fn test_signed_in_user_skips_login_page() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h
        .server
        .get("/login")
        .add_header(COOKIE, h.cookie_for(&staff))
        .await;
    assert_eq!(location(&response), "/home");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let cookie = h.cookie_for(&staff);

    let response = h.server.post("/logout").add_header(COOKIE, cookie.clone()).await;
    assert_eq!(location(&response), "/login");

    let after = h.server.get("/home").add_header(COOKIE, cookie).await;
    assert_eq!(location(&after), "/login");
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[tokio::test]
async fn test_staff_cannot_open_user_management() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h
        .server
        .get("/home/users/create")
        .add_header(COOKIE, h.cookie_for(&staff))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized");
}

#[tokio::test]
async fn test_staff_sees_dashboard_without_users_link() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h
        .server
        .get("/home")
        .add_header(COOKIE, h.cookie_for(&staff))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Welcome"));
    assert!(!body.contains("href=\"/home/users\""));
}

#[tokio::test]
async fn test_admin_sees_users_list() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let response = h
        .server
        .get("/home/users")
        .add_header(COOKIE, h.cookie_for(&admin))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("ada@zoo.com"));
}

// =============================================================================
// FORMS
// =============================================================================

#[tokio::test]
async fn test_invalid_animal_form_is_unprocessable() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let response = h
        .server
        .post("/home/animals/create")
        .add_header(COOKIE, h.cookie_for(&admin))
        .form(&[("name", ""), ("species", "")])
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("Missing Fields. Failed to Create Animal."));
}

#[tokio::test]
async fn test_admin_creates_user_through_form() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let response = h
        .server
        .post("/home/users/create")
        .add_header(COOKIE, h.cookie_for(&admin))
        .form(&[
            ("name", "Kim Keeper"),
            ("email", "kim@zoo.com"),
            ("password", "keeper123"),
            ("role", "STAFF"),
        ])
        .await;
    assert_eq!(location(&response), "/home/users");
    assert!(h.state.store.authenticate("kim@zoo.com", "keeper123").unwrap().is_some());
}

#[tokio::test]
async fn test_form_cannot_create_super_admin() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let response = h
        .server
        .post("/home/users/create")
        .add_header(COOKIE, h.cookie_for(&admin))
        .form(&[
            ("name", "Mallory"),
            ("email", "mallory@zoo.com"),
            ("password", "owner1234"),
            ("role", "SUPER_ADMIN"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.state.store.authenticate("mallory@zoo.com", "owner1234").unwrap().is_none());
}

// =============================================================================
// TASK STATUS
// =============================================================================

#[tokio::test]
async fn test_only_assignee_changes_task_status() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let other = h.add_user("Olu", "olu@zoo.com", Role::Staff);

    let input = validate_task(&TaskForm {
        title: "Refill water".to_string(),
        kind: "GENERAL".to_string(),
        priority: "HIGH".to_string(),
        assigned_to: staff.id.0.to_string(),
        ..TaskForm::default()
    })
    .unwrap();
    let task = h
        .state
        .store
        .create_task(&input, admin.id, Timestamp::now())
        .unwrap();
    let url = format!("/home/tasks/{}/status", task.id.0);

    let denied = h
        .server
        .post(&url)
        .add_header(COOKIE, h.cookie_for(&other))
        .form(&[("status", "DONE")])
        .await;
    assert_eq!(location(&denied), "/unauthorized");

    let allowed = h
        .server
        .post(&url)
        .add_header(COOKIE, h.cookie_for(&staff))
        .form(&[("status", "IN_PROGRESS")])
        .await;
    assert_eq!(location(&allowed), format!("/home/tasks/{}", task.id.0));

    let stored = h.state.store.get_task(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert!(stored.start_at.is_some());
    assert_eq!(
        h.state.store.list_tasks(TaskFilter::AssignedTo(staff.id)).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_unknown_task_status_is_bad_request() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h
        .server
        .post("/home/tasks/1/status")
        .add_header(COOKIE, h.cookie_for(&staff))
        .form(&[("status", "PAUSED")])
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// MAP
// =============================================================================

#[tokio::test]
async fn test_map_renders_svg_with_clamped_viewport() {
    let h = create_harness();
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let response = h
        .server
        .get("/home/map?scale=50&x=99999&y=-99999&action=in")
        .add_header(COOKIE, h.cookie_for(&staff))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("<svg"));
    assert!(body.contains("scale(1.0000)"));
}

// =============================================================================
// RECORD RULES
// =============================================================================

#[tokio::test]
async fn test_only_creating_manager_deletes_treatment() {
    let h = create_harness();
    let creator = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let other_admin = h.add_user("Ben", "ben@zoo.com", Role::Admin);
    let owner = h.add_user("Owner", "owner@zoo.com", Role::SuperAdmin);
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let animal = h.add_animal("Otto");
    let treatment = h.add_treatment(&animal, &creator);
    let url = format!("/home/animals/{}/treatments/{}/delete", animal.id.0, treatment.0);

    for user in [&staff, &other_admin, &owner] {
        let denied = h.server.post(&url).add_header(COOKIE, h.cookie_for(user)).await;
        assert_eq!(location(&denied), "/unauthorized", "{}", user.email);
        assert!(h.state.store.get_treatment(treatment).is_ok());
    }

    let allowed = h.server.post(&url).add_header(COOKIE, h.cookie_for(&creator)).await;
    assert_eq!(location(&allowed), format!("/home/animals/{}", animal.id.0));
    assert!(h.state.store.get_treatment(treatment).is_err());
}

#[tokio::test]
async fn test_animal_delete_cascades_over_http() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let animal = h.add_animal("Otto");
    let treatment = h.add_treatment(&animal, &admin);

    let input = validate_task(&TaskForm {
        title: "Give antibiotics".to_string(),
        kind: "MEDICAL".to_string(),
        priority: "HIGH".to_string(),
        animal_id: animal.id.0.to_string(),
        treatment_id: treatment.0.to_string(),
        ..TaskForm::default()
    })
    .unwrap();
    let task = h
        .state
        .store
        .create_task(&input, admin.id, Timestamp::now())
        .unwrap();

    let response = h
        .server
        .post(&format!("/home/animals/{}/delete", animal.id.0))
        .add_header(COOKIE, h.cookie_for(&admin))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

    assert!(h.state.store.get_animal(animal.id).is_err());
    assert!(h.state.store.get_treatment(treatment).is_err());
    let task = h.state.store.get_task(task.id).unwrap();
    assert_eq!(task.animal_id, None);
    assert_eq!(task.treatment_id, None);
}

#[tokio::test]
async fn test_super_admin_account_is_not_editable() {
    let h = create_harness();
    let owner = h.add_user("Owner", "owner@zoo.com", Role::SuperAdmin);
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let url = format!("/home/users/{}/edit", owner.id.0);

    for user in [&admin, &owner] {
        let page = h.server.get(&url).add_header(COOKIE, h.cookie_for(user)).await;
        assert_eq!(location(&page), "/unauthorized", "{}", user.email);
    }

    let update = h
        .server
        .post(&url)
        .add_header(COOKIE, h.cookie_for(&admin))
        .form(&[
            ("name", "Demoted"),
            ("email", "owner@zoo.com"),
            ("password", ""),
            ("role", "STAFF"),
        ])
        .await;
    assert_eq!(location(&update), "/unauthorized");
    let stored = h.state.store.get_user(owner.id).unwrap();
    assert_eq!(stored.role, Role::SuperAdmin);
    assert_eq!(stored.name, "Owner");
}

#[tokio::test]
async fn test_staff_task_list_shows_only_assigned_tasks() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let other = h.add_user("Olu", "olu@zoo.com", Role::Staff);
    h.add_task("Feed otters", &admin, &staff);
    h.add_task("Sweep aviary", &admin, &other);

    let response = h
        .server
        .get("/home/tasks")
        .add_header(COOKIE, h.cookie_for(&staff))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Feed otters"));
    assert!(!body.contains("Sweep aviary"));
    assert!(!body.contains("All Tasks"));
    assert!(!body.contains("Created By Me"));
}

#[tokio::test]
async fn test_staff_cannot_edit_habitat() {
    let h = create_harness();
    let admin = h.add_user("Ada", "ada@zoo.com", Role::Admin);
    let staff = h.add_user("Sam", "sam@zoo.com", Role::Staff);
    let input = HabitatInput {
        number: 1,
        name: "Otter Creek".to_string(),
        kind: "aquatic".to_string(),
        capacity: 6,
        color: None,
        closed: false,
    };
    let habitat = h
        .state
        .store
        .insert_habitat(&input, vec![0, 0, 100, 0, 100, 100], Timestamp::now())
        .unwrap();
    let url = format!("/home/habitats/{}/edit", habitat.id.0);

    let denied = h.server.get(&url).add_header(COOKIE, h.cookie_for(&staff)).await;
    assert_eq!(location(&denied), "/unauthorized");

    let allowed = h.server.get(&url).add_header(COOKIE, h.cookie_for(&admin)).await;
    assert_eq!(allowed.status_code(), StatusCode::OK);
}
