//! `/rest/*` REST handlers (spec.md §6). Mirrors the teacher's
//! `build_router`/`AppState` skeleton (`rootsignal-server/src/routes.rs`):
//! one `Router` built from `AppState`, CORS layered on top, a liveness
//! `/health` endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::auth::{clear_session_cookie, session_cookie, AuthedUser};
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rest/user/register", post(register))
        .route("/rest/user/login", post(login))
        .route("/rest/user/logout", post(logout))
        .route("/rest/user/delete", post(delete_account))
        .route("/rest/user/update-password", post(update_password))
        .route("/rest/user/profile", get(get_profile).post(post_profile))
        .route("/rest/publications", get(publications))
        .route("/rest/metrics", get(metrics))
        .route("/rest/force-merge", post(force_merge))
        .route("/rest/takeout", get(takeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn error_json(status: StatusCode, reason: &str) -> Response {
    (status, Json(serde_json::json!({ "error": reason }))).into_response()
}

fn validate_username(username: &str) -> Result<(), Response> {
    let valid = !username.is_empty()
        && username.len() <= 128
        && username.chars().all(|c| c.is_ascii_lowercase());
    if valid {
        Ok(())
    } else {
        Err(error_json(StatusCode::BAD_REQUEST, "username must match ^[a-z]+$ and be at most 128 characters"))
    }
}

fn validate_password(password: &str) -> Result<(), Response> {
    if (5..=128).contains(&password.len()) {
        Ok(())
    } else {
        Err(error_json(StatusCode::BAD_REQUEST, "password must be between 5 and 128 characters"))
    }
}

fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing with a freshly generated salt cannot fail")
        .to_string()
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

/// spec.md §6 "Registration additionally checks an optional
/// comma-separated whitelist and applies per-remote-address rate limiting
/// ...; rate-limited requests return HTTP 429, whitelist misses return HTTP
/// 500 (intentional obfuscation)."
async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<Credentials>,
) -> Response {
    if !state.rate_limiter.check(&addr.ip().to_string()) {
        return error_json(StatusCode::TOO_MANY_REQUESTS, "too many requests, try again later");
    }
    if let Err(resp) = validate_username(&body.username) {
        return resp;
    }
    if let Err(resp) = validate_password(&body.password) {
        return resp;
    }
    if let Some(whitelist) = &state.whitelist {
        if !whitelist.iter().any(|w| w == &body.username) {
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    }

    let password_hash = hash_password(&body.password);
    match state.store.create_user(&body.username, &password_hash).await {
        Ok(user) => {
            state.scheduler_waker.notify_one();
            respond_with_session(&state, user.id, user.token_version)
        }
        Err(_) => error_json(StatusCode::BAD_REQUEST, "username already registered"),
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<Credentials>,
) -> Response {
    if !state.rate_limiter.check(&addr.ip().to_string()) {
        return error_json(StatusCode::TOO_MANY_REQUESTS, "too many requests, try again later");
    }

    let user = match state.store.find_user_by_username(&body.username).await {
        Ok(Some(user)) => user,
        // Non-existent user and wrong password return the same 400 with an
        // identical reason (spec.md §8 "Boundary behaviors").
        _ => return error_json(StatusCode::BAD_REQUEST, "invalid username or password"),
    };
    if !verify_password(&body.password, &user.password_hash) {
        return error_json(StatusCode::BAD_REQUEST, "invalid username or password");
    }

    respond_with_session(&state, user.id, user.token_version)
}

fn respond_with_session(state: &AppState, user_id: i64, token_version: i32) -> Response {
    let cookie = session_cookie(user_id, token_version, &state.session_secret, state.secure_cookies);
    (StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response()
}

async fn logout(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    if let Err(err) = state.store.bump_token_version(user.user_id).await {
        tracing::warn!(error = %err, "failed to bump token version on logout");
    }
    (StatusCode::OK, [(header::SET_COOKIE, clear_session_cookie())]).into_response()
}

async fn delete_account(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    match state.store.delete_user(user.user_id).await {
        Ok(()) => (StatusCode::OK, [(header::SET_COOKIE, clear_session_cookie())]).into_response(),
        Err(err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

#[derive(Deserialize)]
struct UpdatePasswordBody {
    old_password: String,
    new_password: String,
}

async fn update_password(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(body): Json<UpdatePasswordBody>,
) -> Response {
    let Ok(Some(row)) = state.store.find_user_by_id(user.user_id).await else {
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    };
    if !verify_password(&body.old_password, &row.password_hash) {
        return error_json(StatusCode::BAD_REQUEST, "invalid username or password");
    }
    if let Err(resp) = validate_password(&body.new_password) {
        return resp;
    }
    let new_hash = hash_password(&body.new_password);
    match state.store.update_password(user.user_id, &new_hash).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

#[derive(Serialize)]
struct FieldView {
    description: &'static str,
    value: String,
}

#[derive(Serialize)]
struct ProfileResponse {
    username: String,
    sources: HashMap<String, HashMap<String, FieldView>>,
}

async fn get_profile(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    let Ok(Some(row)) = state.store.find_user_by_id(user.user_id).await else {
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    };

    let mut sources = HashMap::new();
    for adapter in state.registry.iter() {
        let existing = state
            .store
            .get_source_values(user.user_id, adapter.namespace())
            .await
            .unwrap_or_default()
            .unwrap_or_default();

        let fields = adapter
            .fields()
            .iter()
            .map(|field| {
                let value = existing.get(field.key).cloned().unwrap_or_default();
                (field.key.to_string(), FieldView { description: field.description, value })
            })
            .collect();
        sources.insert(adapter.namespace().to_string(), fields);
    }

    Json(ProfileResponse { username: row.username, sources }).into_response()
}

async fn post_profile(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(body): Json<HashMap<String, HashMap<String, String>>>,
) -> Response {
    let mut errors = Vec::new();

    for (namespace, fields) in &body {
        let Some(adapter) = state.registry.get(namespace) else {
            errors.push(format!("unknown source: {namespace}"));
            continue;
        };

        let mut source_errors = Vec::new();
        for (key, value) in fields {
            if let Err(err) = adapter.validate_field(key, value) {
                source_errors.push(err.to_string());
            }
        }
        if !source_errors.is_empty() {
            errors.extend(source_errors);
            continue;
        }

        let values: HashMap<String, String> = fields.clone();
        if let Err(err) = state
            .store
            .update_source_values(user.user_id, namespace, &values, &adapter.initial_stage())
            .await
        {
            errors.push(err.to_string());
        }
    }

    if errors.is_empty() {
        state.scheduler_waker.notify_one();
    }

    Json(serde_json::json!({ "errors": errors })).into_response()
}

async fn publications(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    match state.store.merged_publications(user.user_id).await {
        Ok(publications) => Json(publications).into_response(),
        Err(err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn metrics(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    match state.store.metrics_for_user(user.user_id).await {
        Ok(metrics) => Json(metrics).into_response(),
        Err(err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn force_merge(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    let ok = state.merger.merge_user(user.user_id).await;
    Json(serde_json::json!({ "ok": ok })).into_response()
}

async fn takeout(State(state): State<Arc<AppState>>, user: AuthedUser) -> Response {
    match state.store.export_data_as_zip(user.user_id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"citescope-export.zip\""),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}
