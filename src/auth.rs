use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{AdminStatus, PremiumStatus, Role, UserRecord},
    repository::{Repository, RepositoryState},
};

/// Claim names the gate writes itself; passthrough fields may not shadow them.
const RESERVED_CLAIMS: [&str; 4] = ["email", "purpose", "iat", "exp"];

/// TokenPurpose
///
/// What a token is allowed to be used for. Each purpose has exactly one lifetime, and a
/// token minted for one purpose is rejected wherever another is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TokenPurpose {
    /// Normal login session.
    Session,
    /// Short-lived proof of a fresh admin decision, required for user-management writes.
    Elevation,
}

impl TokenPurpose {
    pub fn lifetime(self) -> Duration {
        match self {
            TokenPurpose::Session => Duration::hours(1),
            TokenPurpose::Elevation => Duration::minutes(5),
        }
    }
}

/// IdentityRequest
///
/// Body of an issuance request. `email` is mandatory; every other field is carried into the
/// token unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRequest {
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityRequest {
    pub fn for_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            extra: Map::new(),
        }
    }
}

/// Claims
///
/// The signed payload. Carries identity only; roles are never encoded here and are always
/// re-read from the user store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub email: String,
    pub purpose: TokenPurpose,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- Issuance & Verification ---

/// Signs a token for `identity` valid for `purpose.lifetime()` starting at `now`.
pub fn issue_token(
    identity: IdentityRequest,
    purpose: TokenPurpose,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let email = identity
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::InvalidInput("email is required".to_string()))?;

    let mut extra = identity.extra;
    for reserved in RESERVED_CLAIMS {
        extra.remove(reserved);
    }

    let claims = Claims {
        email,
        purpose,
        iat: now.timestamp(),
        exp: (now + purpose.lifetime()).timestamp(),
        extra,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Checks signature, expiry and purpose of a raw token.
pub fn decode_token(
    token: &str,
    secret: &str,
    expected: TokenPurpose,
) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("rejected token: expired"),
            ErrorKind::InvalidSignature => tracing::debug!("rejected token: bad signature"),
            other => tracing::debug!(reason = ?other, "rejected token: malformed"),
        }
        AppError::Unauthorized
    })?
    .claims;

    if claims.purpose != expected {
        tracing::debug!(
            got = ?claims.purpose,
            expected = ?expected,
            "rejected token: wrong purpose"
        );
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let (scheme, token) = value.split_once(' ').ok_or(AppError::Unauthorized)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

/// verify
///
/// The authentication step: header extraction plus token validation.
pub fn verify(
    headers: &HeaderMap,
    secret: &str,
    expected: TokenPurpose,
) -> Result<Claims, AppError> {
    let token = bearer_token(headers)?;
    decode_token(token, secret, expected)
}

// --- Role Derivation ---

/// authorize_admin
///
/// Re-reads the caller's user record and requires `role == "admin"`. A missing record is
/// `Forbidden`, a store failure is not.
pub async fn authorize_admin(
    repo: &dyn Repository,
    claims: &Claims,
) -> Result<UserRecord, AppError> {
    match repo.find_user_by_email(&claims.email).await? {
        Some(user) if user.is_admin() => Ok(user),
        _ => {
            tracing::debug!(email = %claims.email, "admin check failed");
            Err(AppError::Forbidden)
        }
    }
}

/// Admins always pass; everyone else needs an unexpired premium period.
pub async fn authorize_premium(
    repo: &dyn Repository,
    claims: &Claims,
    now: DateTime<Utc>,
) -> Result<UserRecord, AppError> {
    match repo.find_user_by_email(&claims.email).await? {
        Some(user) if user.is_admin() || user.is_premium_at(now) => Ok(user),
        _ => {
            tracing::debug!(email = %claims.email, "premium check failed");
            Err(AppError::Forbidden)
        }
    }
}

async fn own_record(
    repo: &dyn Repository,
    caller: &Claims,
    email: &str,
) -> Result<Option<UserRecord>, AppError> {
    if caller.email != email {
        tracing::debug!(caller = %caller.email, "role query for another user refused");
        return Err(AppError::Forbidden);
    }
    Ok(repo.find_user_by_email(email).await?)
}

fn role_of(user: Option<&UserRecord>, now: DateTime<Utc>) -> Role {
    user.map_or(Role::Member, |user| user.role_at(now))
}

/// is_admin
///
/// Answers "am I admin". Callers may only ask about their own email; an unknown email is
/// simply not admin.
pub async fn is_admin(
    repo: &dyn Repository,
    caller: &Claims,
    email: &str,
    now: DateTime<Utc>,
) -> Result<AdminStatus, AppError> {
    let user = own_record(repo, caller, email).await?;
    Ok(AdminStatus {
        admin: user.as_ref().is_some_and(UserRecord::is_admin),
        role: role_of(user.as_ref(), now),
    })
}

/// `premium` reflects the paid period only; admins report their admin role alongside it.
pub async fn is_premium(
    repo: &dyn Repository,
    caller: &Claims,
    email: &str,
    now: DateTime<Utc>,
) -> Result<PremiumStatus, AppError> {
    let user = own_record(repo, caller, email).await?;
    Ok(PremiumStatus {
        premium: user.as_ref().is_some_and(|user| user.is_premium_at(now)),
        role: role_of(user.as_ref(), now),
    })
}

// --- Pipeline Stages ---
//
// Each stage either forwards the request to `next` or terminates it with a typed error.
// Verification stages attach `Claims`; role stages read them and attach the `UserRecord`.

async fn verify_stage(
    config: &AppConfig,
    expected: TokenPurpose,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify(request.headers(), &config.jwt_secret, expected)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Requires a valid session token.
pub async fn verify_session(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    verify_stage(&config, TokenPurpose::Session, request, next).await
}

/// Requires a valid elevation token.
pub async fn verify_elevation(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    verify_stage(&config, TokenPurpose::Elevation, request, next).await
}

fn attached_claims(request: &Request) -> Result<Claims, AppError> {
    request
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(AppError::Unauthorized)
}

/// Must be layered inside a verification stage.
pub async fn require_admin(
    State(repo): State<RepositoryState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = attached_claims(&request)?;
    let user = authorize_admin(repo.as_ref(), &claims).await?;
    request.extensions_mut().insert(AdminUser(user));
    Ok(next.run(request).await)
}

pub async fn require_premium(
    State(repo): State<RepositoryState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = attached_claims(&request)?;
    let user = authorize_premium(repo.as_ref(), &claims, Utc::now()).await?;
    request.extensions_mut().insert(PremiumUser(user));
    Ok(next.run(request).await)
}

// --- Extractors ---

/// AuthUser
///
/// The verified identity of the caller, as attached by a verification stage. Rejects with
/// 401 if no stage ran.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            email: claims.email.clone(),
            claims,
        })
    }
}

/// The caller's user record, present only behind `require_admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminUser>()
            .cloned()
            .ok_or(AppError::Forbidden)
    }
}

/// The caller's user record, present only behind `require_premium`.
#[derive(Debug, Clone)]
pub struct PremiumUser(pub UserRecord);

impl<S> FromRequestParts<S> for PremiumUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PremiumUser>()
            .cloned()
            .ok_or(AppError::Forbidden)
    }
}
