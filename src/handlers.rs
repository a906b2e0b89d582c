use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser, IdentityRequest, PremiumUser, TokenPurpose},
    error::AppError,
    extractors::{ApiJson, ApiPath},
    models::{
        AdminStatus, Collection, DeleteResult, InsertResult, PremiumStatus, RegisterUserRequest,
        TokenResponse, UpdateResult, UserRecord,
    },
};
use axum::{
    Json,
    extract::State,
};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Upper bound for a single premium purchase.
const MAX_PREMIUM_DAYS: u64 = 365;

async fn insert_into(
    state: &AppState,
    collection: Collection,
    body: Map<String, Value>,
) -> Result<Json<InsertResult>, AppError> {
    let id = state.repo.insert_document(collection, body).await?;
    tracing::debug!(collection = collection.as_str(), %id, "document inserted");
    Ok(Json(InsertResult::inserted(id)))
}

async fn find_in(
    state: &AppState,
    collection: Collection,
    id: Uuid,
) -> Result<Json<Value>, AppError> {
    state
        .repo
        .find_document(collection, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn remove_article(
    state: &AppState,
    admin: &UserRecord,
    id: Uuid,
) -> Result<Json<DeleteResult>, AppError> {
    let deleted = state.repo.delete_document(Collection::Articles, id).await?;
    tracing::info!(admin = %admin.email, article_id = %id, deleted, "article deleted");
    Ok(Json(DeleteResult::new(deleted)))
}

// --- Public ---

/// [Public Route] Liveness banner.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Banner", body = String)))]
pub async fn root() -> &'static str {
    "news orbit server is running"
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Healthy", body = String)))]
pub async fn health() -> &'static str {
    "ok"
}

/// issue_session_token
///
/// [Public Route] Login. Signs a session token for the posted identity. The body must carry
/// an `email`; any other fields are embedded in the token as-is.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Missing email", body = crate::models::ErrorBody)
    )
)]
pub async fn issue_session_token(
    State(state): State<AppState>,
    ApiJson(identity): ApiJson<IdentityRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = auth::issue_token(
        identity,
        TokenPurpose::Session,
        &state.config.jwt_secret,
        Utc::now(),
    )?;
    Ok(Json(TokenResponse { token }))
}

/// register_user
///
/// [Public Route] Creates a user record. Registering an existing email is not an error:
/// the response carries a null `insertedId` and an explanatory message.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserRequest,
    responses((status = 200, description = "Registered or already present", body = InsertResult))
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterUserRequest>,
) -> Result<Json<InsertResult>, AppError> {
    payload.email = payload.email.trim().to_string();
    if payload.email.is_empty() {
        return Err(AppError::InvalidInput("email is required".to_string()));
    }

    match state.repo.create_user(payload).await? {
        Some(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(Json(InsertResult::inserted(user.id)))
        }
        None => Ok(Json(InsertResult::skipped("user already exists"))),
    }
}

/// [Public Route] All admin-approved articles.
#[utoipa::path(
    get,
    path = "/approved-data",
    responses((status = 200, description = "Approved articles", body = [serde_json::Value]))
)]
pub async fn get_approved_data(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.repo.list_documents(Collection::Approved).await?))
}

#[utoipa::path(
    get,
    path = "/approved/{id}",
    params(("id" = Uuid, Path, description = "Approved article ID")),
    responses(
        (status = 200, description = "Found", body = serde_json::Value),
        (status = 404, description = "Not found", body = crate::models::ErrorBody)
    )
)]
pub async fn get_approved(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_in(&state, Collection::Approved, id).await
}

/// get_user_articles
///
/// [Public Route] Articles submitted by the given author, matched on `userData.email`.
#[utoipa::path(
    get,
    path = "/user-articles/{email}",
    params(("email" = String, Path, description = "Author email")),
    responses((status = 200, description = "Author's articles", body = [serde_json::Value]))
)]
pub async fn get_user_articles(
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let articles = state
        .repo
        .find_documents_matching(Collection::Articles, &["userData", "email"], &Value::String(email))
        .await?;
    Ok(Json(articles))
}

// --- Session ---

#[utoipa::path(
    get,
    path = "/publisher",
    responses((status = 200, description = "Publishers", body = [serde_json::Value]))
)]
pub async fn get_publishers(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.repo.list_documents(Collection::Publishers).await?))
}

/// [Session Route] Submits an article for review.
#[utoipa::path(
    post,
    path = "/add-articles",
    request_body = serde_json::Value,
    responses((status = 200, description = "Inserted", body = InsertResult))
)]
pub async fn add_article(
    AuthUser { email, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<Json<InsertResult>, AppError> {
    tracing::debug!(%email, "article submitted");
    insert_into(&state, Collection::Articles, body).await
}

#[utoipa::path(
    get,
    path = "/userapproved/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses((status = 200, description = "Article", body = serde_json::Value))
)]
pub async fn get_user_approved(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_in(&state, Collection::Articles, id).await
}

/// create_premium
///
/// [Session Route] Records a premium subscription request for the caller. The record is
/// stamped with the caller's verified email regardless of what the body claims. `days`, if
/// present, must lie in 1..=365. Nothing is granted until an admin approves the record.
#[utoipa::path(
    post,
    path = "/premium",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Inserted", body = InsertResult),
        (status = 400, description = "Invalid period", body = crate::models::ErrorBody)
    )
)]
pub async fn create_premium(
    AuthUser { email, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<Map<String, Value>>,
) -> Result<Json<InsertResult>, AppError> {
    if let Some(value) = body.get("days") {
        premium_days(value)?;
    }

    body.insert("email".to_string(), Value::String(email));
    insert_into(&state, Collection::Premiums, body).await
}

fn premium_days(value: &Value) -> Result<u64, AppError> {
    value
        .as_u64()
        .filter(|days| (1..=MAX_PREMIUM_DAYS).contains(days))
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "days must be an integer between 1 and {MAX_PREMIUM_DAYS}"
            ))
        })
}

#[utoipa::path(
    get,
    path = "/premium",
    responses((status = 200, description = "Subscriptions", body = [serde_json::Value]))
)]
pub async fn get_premiums(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.repo.list_documents(Collection::Premiums).await?))
}

#[utoipa::path(
    get,
    path = "/premium/{id}",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses((status = 200, description = "Subscription", body = serde_json::Value))
)]
pub async fn get_premium(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_in(&state, Collection::Premiums, id).await
}

/// check_admin
///
/// [Session Route] "Am I admin?" for client UIs. Asking about any email other than the
/// caller's own is refused with 403.
#[utoipa::path(
    get,
    path = "/users/admin/{email}",
    params(("email" = String, Path, description = "Caller's own email")),
    responses(
        (status = 200, description = "Admin flag", body = AdminStatus),
        (status = 403, description = "Not the caller's email", body = crate::models::ErrorBody)
    )
)]
pub async fn check_admin(
    AuthUser { claims, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<AdminStatus>, AppError> {
    let status = auth::is_admin(state.repo.as_ref(), &claims, &email, Utc::now()).await?;
    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/users/premium/{email}",
    params(("email" = String, Path, description = "Caller's own email")),
    responses(
        (status = 200, description = "Premium flag", body = PremiumStatus),
        (status = 403, description = "Not the caller's email", body = crate::models::ErrorBody)
    )
)]
pub async fn check_premium(
    AuthUser { claims, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<PremiumStatus>, AppError> {
    let status = auth::is_premium(state.repo.as_ref(), &claims, &email, Utc::now()).await?;
    Ok(Json(status))
}

// --- Admin ---

/// [Admin Route] Every submitted article, approved or not.
#[utoipa::path(
    get,
    path = "/articles",
    responses((status = 200, description = "Articles", body = [serde_json::Value]))
)]
pub async fn get_articles(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.repo.list_documents(Collection::Articles).await?))
}

#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses((status = 200, description = "Delete result", body = DeleteResult))
)]
pub async fn delete_article(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeleteResult>, AppError> {
    remove_article(&state, &admin, id).await
}

/// [Admin Route] Removes an article from a user's submission list.
#[utoipa::path(
    delete,
    path = "/userDataDelete/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses((status = 200, description = "Delete result", body = DeleteResult))
)]
pub async fn delete_user_article(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeleteResult>, AppError> {
    remove_article(&state, &admin, id).await
}

#[utoipa::path(
    post,
    path = "/add-publisher",
    request_body = serde_json::Value,
    responses((status = 200, description = "Inserted", body = InsertResult))
)]
pub async fn add_publisher(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<Json<InsertResult>, AppError> {
    insert_into(&state, Collection::Publishers, body).await
}

/// [Admin Route] Stores the reason an article was declined.
#[utoipa::path(
    post,
    path = "/articles-decline",
    request_body = serde_json::Value,
    responses((status = 200, description = "Inserted", body = InsertResult))
)]
pub async fn decline_article(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<Json<InsertResult>, AppError> {
    insert_into(&state, Collection::Declined, body).await
}

/// [Admin Route] Publishes an article by copying it into the approved collection.
#[utoipa::path(
    post,
    path = "/admin-approved",
    request_body = serde_json::Value,
    responses((status = 200, description = "Inserted", body = InsertResult))
)]
pub async fn approve_article(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<Json<InsertResult>, AppError> {
    insert_into(&state, Collection::Approved, body).await
}

/// approve_premium
///
/// [Admin Route] Grants the premium period requested by a subscription record to the user
/// named on it. The grant is the only write, so a failure leaves nothing behind.
#[utoipa::path(
    post,
    path = "/premium/{id}/approve",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Premium granted", body = UpdateResult),
        (status = 400, description = "Record has no valid period", body = crate::models::ErrorBody),
        (status = 404, description = "No such record or user", body = crate::models::ErrorBody)
    )
)]
pub async fn approve_premium(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UpdateResult>, AppError> {
    let subscription = state
        .repo
        .find_document(Collection::Premiums, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let email = subscription
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidInput("subscription has no email".to_string()))?;
    let days = subscription
        .get("days")
        .ok_or_else(|| AppError::InvalidInput("subscription has no days".to_string()))
        .and_then(premium_days)?;

    let until = Utc::now() + Duration::days(days as i64);
    let updated = state.repo.grant_premium(email, until).await?;
    if updated == 0 {
        tracing::debug!(%email, subscription_id = %id, "premium approval for unknown user");
        return Err(AppError::NotFound);
    }

    tracing::info!(admin = %admin.email, %email, %until, "premium granted");
    Ok(Json(UpdateResult {
        acknowledged: true,
        matched_count: updated,
        modified_count: updated,
    }))
}

#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [UserRecord]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserRecord>>, AppError> {
    Ok(Json(state.repo.list_users().await?))
}

/// issue_elevation_token
///
/// [Admin Route] Exchanges a session for a short-lived elevation token, which the
/// user-management routes require instead of a session token.
#[utoipa::path(
    post,
    path = "/jwt/elevate",
    responses((status = 200, description = "Elevation token", body = TokenResponse))
)]
pub async fn issue_elevation_token(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = auth::issue_token(
        IdentityRequest::for_email(admin.email.clone()),
        TokenPurpose::Elevation,
        &state.config.jwt_secret,
        Utc::now(),
    )?;
    tracing::info!(admin = %admin.email, "elevation token issued");
    Ok(Json(TokenResponse { token }))
}

// --- Elevated Admin ---

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Delete result", body = DeleteResult))
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeleteResult>, AppError> {
    let deleted = state.repo.delete_user(id).await?;
    tracing::info!(admin = %admin.email, user_id = %id, deleted, "user deleted");
    Ok(Json(DeleteResult::new(deleted)))
}

/// promote_user
///
/// [Elevated Admin Route] The privileged write path that sets `role = "admin"`.
#[utoipa::path(
    patch,
    path = "/users/admin/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Update result", body = UpdateResult))
)]
pub async fn promote_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UpdateResult>, AppError> {
    let result = state.repo.promote_to_admin(id).await?;
    tracing::info!(
        admin = %admin.email,
        user_id = %id,
        modified = result.modified_count,
        "user promoted to admin"
    );
    Ok(Json(result))
}

// --- Premium ---

/// [Premium Route] Approved articles flagged `isPremium`.
#[utoipa::path(
    get,
    path = "/premium-articles",
    responses((status = 200, description = "Premium articles", body = [serde_json::Value]))
)]
pub async fn get_premium_articles(
    PremiumUser(reader): PremiumUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Value>>, AppError> {
    tracing::debug!(reader = %reader.email, "premium articles requested");
    let articles = state
        .repo
        .find_documents_matching(Collection::Approved, &["isPremium"], &Value::Bool(true))
        .await?;
    Ok(Json(articles))
}
