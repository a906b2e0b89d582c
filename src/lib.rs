use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services: the access gate, the store and the request/response types.
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing grouped by access tier (Public, Session, Premium, Admin, Elevated Admin).
pub mod routes;
use routes::{Gate, admin, authenticated, guard, public};

// --- Public Re-exports ---

// Entry points for main.rs and the integration tests.
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // Every handler, grouped by tier in the same order as the routers.
    paths(
        handlers::root, handlers::health, handlers::issue_session_token,
        handlers::register_user, handlers::get_approved_data, handlers::get_approved,
        handlers::get_user_articles, handlers::get_publishers, handlers::add_article,
        handlers::get_user_approved, handlers::create_premium, handlers::get_premiums,
        handlers::get_premium, handlers::check_admin, handlers::check_premium,
        handlers::get_articles, handlers::delete_article, handlers::delete_user_article,
        handlers::add_publisher, handlers::decline_article, handlers::approve_article, handlers::approve_premium,
        handlers::list_users, handlers::issue_elevation_token, handlers::delete_user,
        handlers::promote_user, handlers::get_premium_articles
    ),
    // Request and response bodies.
    components(
        schemas(
            models::UserRecord, models::Role, models::RegisterUserRequest,
            models::TokenResponse, models::AdminStatus, models::PremiumStatus,
            models::InsertResult, models::DeleteResult, models::UpdateResult,
            models::ErrorBody, auth::TokenPurpose,
        )
    ),
    tags(
        (name = "news-orbit", description = "News Orbit article submission and approval API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for the store handle and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Gate stages take only the part of the state they need: the store for role checks, the
// configuration for token verification.
impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route group behind its gate, then applies the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name used for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Swagger UI and the raw OpenAPI document.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public: no stages.
        .merge(guard(public::public_routes(), &state, Gate::Public))
        // Session and premium tiers: a session token, plus a premium lookup for the latter.
        .merge(guard(authenticated::session_routes(), &state, Gate::Session))
        .merge(guard(authenticated::premium_routes(), &state, Gate::Premium))
        // Admin tiers: the role is re-read from the store on every request. User-management
        // writes additionally demand an elevation token.
        .merge(guard(admin::admin_routes(), &state, Gate::Admin))
        .merge(guard(admin::elevated_admin_routes(), &state, Gate::ElevatedAdmin))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. A UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS, outermost.
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, path and the `x-request-id`. The query string and
/// headers are left out so tokens never reach the logs.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
