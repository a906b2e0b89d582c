use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// Moderation endpoints. The whole router sits behind a session token *and* a fresh
/// `role = "admin"` lookup; handlers receive the admin's record via `AdminUser`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /articles
        // Every submitted article, for the review queue.
        .route("/articles", get(handlers::get_articles))
        .route("/articles/{id}", delete(handlers::delete_article))
        .route("/userDataDelete/{id}", delete(handlers::delete_user_article))
        .route("/add-publisher", post(handlers::add_publisher))
        // POST /articles-decline, /admin-approved
        // Review outcomes: a decline reason or the published copy.
        .route("/articles-decline", post(handlers::decline_article))
        .route("/admin-approved", post(handlers::approve_article))
        .route("/users", get(handlers::list_users))
        // POST /premium/{id}/approve
        // Grants the period requested by a subscription record.
        .route("/premium/{id}/approve", post(handlers::approve_premium))
        // POST /jwt/elevate
        // Exchanges the admin's session for a short-lived elevation token.
        .route("/jwt/elevate", post(handlers::issue_elevation_token))
}

/// Elevated Admin Router Module
///
/// User-management writes. Requires an elevation token (not a session token) and the admin
/// role, re-checked at request time.
pub fn elevated_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", delete(handlers::delete_user))
        // PATCH /users/admin/{id}
        // Role promotion: the only write path that sets role = "admin". The segment is
        // named `key` because the session tier serves GET on the same path with an email.
        .route("/users/admin/{key}", patch(handlers::promote_user))
}
