use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Session Router Module
///
/// Endpoints for any caller holding a valid session token. Handlers read the caller's
/// identity through the `AuthUser` extractor.
pub fn session_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/publisher", get(handlers::get_publishers))
        .route("/add-articles", post(handlers::add_article))
        .route("/userapproved/{id}", get(handlers::get_user_approved))
        // GET/POST /premium
        // Subscriptions. POST stamps the caller's email and may start a premium period.
        .route(
            "/premium",
            get(handlers::get_premiums).post(handlers::create_premium),
        )
        .route("/premium/{id}", get(handlers::get_premium))
        // GET /users/admin/{email}, /users/premium/{email}
        // Self-only role queries used by client UIs. `key` matches the elevated PATCH route
        // on the same path.
        .route("/users/admin/{key}", get(handlers::check_admin))
        .route("/users/premium/{email}", get(handlers::check_premium))
}

/// Premium Router Module
///
/// Content for callers whose user record is currently premium (admins included).
pub fn premium_routes() -> Router<AppState> {
    Router::<AppState>::new().route("/premium-articles", get(handlers::get_premium_articles))
}
