use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// The only persisted role value that grants admin rights.
pub const ADMIN_ROLE: &str = "admin";

// --- Core Records ---

/// UserRecord
///
/// A row of the `users` table. Keyed by a unique email; `role` is absent for ordinary users
/// and `"admin"` for administrators. The access gate reads this record on every
/// role-gated request and never writes it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
    /// End of the paid premium period, if the user ever subscribed.
    #[ts(type = "string | null")]
    pub premium_until: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    pub fn is_premium_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.is_some_and(|until| until > now)
    }

    /// Coarse role at `now`. Admin outranks premium.
    pub fn role_at(&self, now: DateTime<Utc>) -> Role {
        if self.is_admin() {
            Role::Admin
        } else if self.is_premium_at(now) {
            Role::Premium
        } else {
            Role::Member
        }
    }
}

/// Role
///
/// Derived, never stored: computed from a `UserRecord` at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Premium,
    Member,
}

/// Collection
///
/// The schemaless document collections. Users live in their own typed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Publishers,
    Articles,
    Approved,
    Declined,
    Premiums,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Publishers => "publishers",
            Collection::Articles => "articles",
            Collection::Approved => "approved",
            Collection::Declined => "decline",
            Collection::Premiums => "premiums",
        }
    }
}

/// Merges the store-assigned id into a document body as `_id`.
pub fn document_with_id(id: Uuid, body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("_id".to_string(), Value::String(id.to_string()));
            Value::Object(map)
        }
        other => serde_json::json!({ "_id": id, "value": other }),
    }
}

// --- Request Payloads ---

/// RegisterUserRequest
///
/// Input payload for POST /users. Registration never grants a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub photo: Option<String>,
}

// --- Response Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminStatus {
    pub admin: bool,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PremiumStatus {
    pub premium: bool,
    pub role: Role,
}

/// InsertResult
///
/// Mirrors the document-store insert acknowledgement. `inserted_id` is null when the
/// write was skipped, in which case `message` says why.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
}

impl InsertResult {
    pub fn inserted(id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id: Some(id),
            message: None,
        }
    }

    pub fn skipped(reason: &str) -> Self {
        Self {
            acknowledged: true,
            inserted_id: None,
            message: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResult {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateResult {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub matched_count: u64,
    #[ts(type = "number")]
    pub modified_count: u64,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub message: String,
}
