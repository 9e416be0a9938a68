//! # HTTP Server
//!
//! axum server rendering the zoo pages and handling their form posts.
//!
//! Every request passes through [`session::guard`], which applies the route
//! rules before any handler runs. Handlers then re-check the action they are
//! about to perform (`Role::can`) and any record-level rule.
//!
//! Store calls are synchronous redb transactions made directly from the
//! handlers.

mod animals;
mod auth;
mod habitats;
mod home;
pub mod html;
mod map;
pub mod session;
mod tasks;
mod users;

use crate::error::{AppError, AppResult};
use axum::Router;
use axum::extract::{FromRequestParts, Path};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use menagerie_core::primitives::{DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE, DEFAULT_SESSION_TTL_SECS};
use menagerie_core::{Action, Timestamp, User, ZooError, ZooStore};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

/// How often expired sessions and idle rate-limit keys are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

// =============================================================================
// STATE
// =============================================================================

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Login attempts allowed per email per minute.
    pub login_attempts_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            login_attempts_per_minute: DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ZooStore>,
    pub config: Arc<ServerConfig>,
    /// Keyed by lowercased email.
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl AppState {
    #[must_use]
    pub fn new(store: ZooStore, config: ServerConfig) -> Self {
        let per_minute =
            NonZeroU32::new(config.login_attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::root))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/unauthorized", get(unauthorized))
        .route("/health", get(health))
        .route("/home", get(home::dashboard))
        // Users
        .route("/home/users", get(users::list))
        .route("/home/users/create", get(users::create_page).post(users::create))
        .route("/home/users/{id}/edit", get(users::edit_page).post(users::update))
        // Animals & treatments
        .route("/home/animals", get(animals::list))
        .route("/home/animals/create", get(animals::create_page).post(animals::create))
        .route("/home/animals/{id}", get(animals::profile))
        .route("/home/animals/{id}/edit", get(animals::edit_page).post(animals::update))
        .route("/home/animals/{id}/delete", post(animals::delete))
        .route("/home/animals/{id}/treatments", post(animals::add_treatment))
        .route(
            "/home/animals/{id}/treatments/{treatment_id}/delete",
            post(animals::delete_treatment),
        )
        // Habitats
        .route("/home/habitats", get(habitats::list))
        .route("/home/habitats/{id}/edit", get(habitats::edit_page).post(habitats::update))
        // Tasks
        .route("/home/tasks", get(tasks::list))
        .route("/home/tasks/create", get(tasks::create_page).post(tasks::create))
        .route("/home/tasks/{id}", get(tasks::detail))
        .route("/home/tasks/{id}/edit", get(tasks::edit_page).post(tasks::update))
        .route("/home/tasks/{id}/delete", post(tasks::delete))
        .route("/home/tasks/{id}/status", post(tasks::set_status))
        // Map
        .route("/home/map", get(map::page))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), session::guard)),
        )
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run_server(store: ZooStore, config: ServerConfig) -> AppResult<()> {
    let bind = config.bind;
    let purged = store.purge_expired_sessions(Timestamp::now())?;
    let state = AppState::new(store, config);
    spawn_sweeper(state.clone());

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, purged_sessions = purged, "Menagerie server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Menagerie server stopped");
    Ok(())
}

fn spawn_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match state.store.purge_expired_sessions(Timestamp::now()) {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired sessions removed"),
                Err(err) => error!(error = %err, "session sweep failed"),
            }
            state.login_limiter.retain_recent();
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}

// =============================================================================
// SHARED HANDLERS & HELPERS
// =============================================================================

async fn health() -> Response {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

async fn unauthorized() -> Html<String> {
    Html(html::unauthorized_page())
}

async fn not_found() -> Response {
    AppError::NotFound.into_response()
}

/// Record ids taken from the URL.
///
/// Wraps [`Path`] so an id that does not parse (`/home/animals/abc`) shows the
/// 404 page instead of axum's plain-text 400.
pub struct RecordPath<T>(pub T);

impl<S, T> FromRequestParts<S> for RecordPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(path = %parts.uri.path(), %rejection, "unparseable record id");
                Err(AppError::NotFound)
            }
        }
    }
}

/// Fail with a redirect to `/unauthorized` unless `user` may perform `action`.
fn require(user: &User, action: Action) -> AppResult<()> {
    if user.role.can(action) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} may not {action:?}",
            user.role
        )))
    }
}

/// Re-rendered form after a rejected submission.
fn unprocessable(page: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
}

/// Form re-rendered after the store refused a write. Rejections the user can
/// fix keep 422; anything else is logged and reported as a 500.
fn store_rejection(err: &ZooError, page: String) -> Response {
    let status = match err {
        ZooError::Conflict { .. } | ZooError::NotFound { .. } | ZooError::Invalid(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ZooError::Forbidden(_) => StatusCode::FORBIDDEN,
        ZooError::Storage(_) | ZooError::Serialization(_) | ZooError::Hashing(_) => {
            error!(error = %err, "store write failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Html(page)).into_response()
}

/// Post/redirect/get.
fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}
