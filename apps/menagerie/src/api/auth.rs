//! Sign-in, sign-out and the site root.

use super::session::{clear_cookie, session_cookie, session_token};
use super::{AppState, html, see_other, unprocessable};
use crate::error::AppResult;
use axum::Form;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use menagerie_core::validation::{INVALID_CREDENTIALS, LoginForm, validate_login};
use menagerie_core::{FormState, Timestamp};
use tracing::{info, warn};

/// Shown once an email exhausts its login quota.
pub const TOO_MANY_ATTEMPTS: &str = "Too many login attempts. Try again later.";

fn login_html(email: &str, state: &FormState) -> String {
    let mut fields = html::form_message(state);
    fields.push_str(&html::input("Email", "email", "email", email, state));
    fields.push_str(&html::input("Password", "password", "password", "", state));
    html::public_page("Log in", &html::form("/login", &fields, "Log in"))
}

/// `GET /`. The guard always redirects first; this only covers a missing rule.
pub(super) async fn root() -> Redirect {
    Redirect::to("/login")
}

pub(super) async fn login_page() -> Html<String> {
    Html(login_html("", &FormState::new()))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let credentials = match validate_login(&form) {
        Ok(credentials) => credentials,
        Err(rejected) => return Ok(unprocessable(login_html(&form.email, &rejected))),
    };

    if state.login_limiter.check_key(&credentials.email).is_err() {
        warn!(email = %credentials.email, "login rate limited");
        let page = login_html(&form.email, &FormState::with_message(TOO_MANY_ATTEMPTS));
        return Ok((StatusCode::TOO_MANY_REQUESTS, Html(page)).into_response());
    }

    let Some(user) = state
        .store
        .authenticate(&credentials.email, &credentials.password)?
    else {
        warn!(email = %credentials.email, "login rejected");
        let page = login_html(&form.email, &FormState::with_message(INVALID_CREDENTIALS));
        return Ok(unprocessable(page));
    };

    let ttl = state.config.session_ttl_secs;
    let session = state.store.create_session(user.id, ttl, Timestamp::now())?;
    info!(user = user.id.0, role = %user.role, "signed in");
    Ok((
        [(SET_COOKIE, session_cookie(&session.token, ttl))],
        Redirect::to("/home"),
    )
        .into_response())
}

pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers) {
        state.store.delete_session(&token)?;
        info!("signed out");
    }
    let mut response = see_other("/login");
    if let Ok(value) = clear_cookie().parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}
