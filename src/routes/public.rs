use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: login, registration and the published
/// (admin-approved) article feed.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // POST /jwt
        // Login. Issues a session token for the posted identity.
        .route("/jwt", post(handlers::issue_session_token))
        // POST /users
        // Registration. Never grants a role.
        .route("/users", post(handlers::register_user))
        .route("/approved-data", get(handlers::get_approved_data))
        .route("/approved/{id}", get(handlers::get_approved))
        .route("/user-articles/{email}", get(handlers::get_user_articles))
}
