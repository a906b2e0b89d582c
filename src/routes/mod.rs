use crate::{AppState, auth};
use axum::{Router, middleware::from_fn_with_state};

/// Router Module Index
///
/// Routes are grouped by the gate that protects them. Each group is wrapped in its gate with
/// `guard` before being merged into the application router, so a route can only be reached
/// through the pipeline of its group.

/// Routes open to anonymous callers.
pub mod public;

/// Routes behind a session token, plus the premium tier.
pub mod authenticated;

/// Routes behind a session token and the admin role, plus the elevated tier.
pub mod admin;

/// Gate
///
/// The access pipelines. Stages run in the listed order and the first failing stage ends
/// the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// No stages.
    Public,
    /// verify(session)
    Session,
    /// verify(session) → require_admin
    Admin,
    /// verify(elevation) → require_admin
    ElevatedAdmin,
    /// verify(session) → require_premium
    Premium,
}

/// guard
///
/// Wraps every route of `router` in the pipeline for `gate`. `route_layer` wraps outward,
/// so the stage added last runs first.
pub fn guard(router: Router<AppState>, state: &AppState, gate: Gate) -> Router<AppState> {
    match gate {
        Gate::Public => router,
        Gate::Session => {
            router.route_layer(from_fn_with_state(state.clone(), auth::verify_session))
        }
        Gate::Admin => router
            .route_layer(from_fn_with_state(state.clone(), auth::require_admin))
            .route_layer(from_fn_with_state(state.clone(), auth::verify_session)),
        Gate::ElevatedAdmin => router
            .route_layer(from_fn_with_state(state.clone(), auth::require_admin))
            .route_layer(from_fn_with_state(state.clone(), auth::verify_elevation)),
        Gate::Premium => router
            .route_layer(from_fn_with_state(state.clone(), auth::require_premium))
            .route_layer(from_fn_with_state(state.clone(), auth::verify_session)),
    }
}
