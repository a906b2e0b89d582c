use crate::models::{Collection, RegisterUserRequest, UpdateResult, UserRecord, document_with_id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{PgPool, types::Json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// StoreError
///
/// Anything that goes wrong below the repository boundary. Surfaces to clients as a 500.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// The pool could not hand out a connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers and the access gate only
/// see `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// The single capability the access gate depends on.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    /// Returns `None` when a user with the same email already exists.
    async fn create_user(&self, req: RegisterUserRequest) -> StoreResult<Option<UserRecord>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<u64>;
    /// Sets `role = "admin"`. Privileged write path, reachable only through an elevated gate.
    async fn promote_to_admin(&self, id: Uuid) -> StoreResult<UpdateResult>;
    async fn grant_premium(&self, email: &str, until: DateTime<Utc>) -> StoreResult<u64>;

    // --- Documents ---
    async fn insert_document(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> StoreResult<Uuid>;
    async fn list_documents(&self, collection: Collection) -> StoreResult<Vec<Value>>;
    async fn find_document(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>>;
    async fn delete_document(&self, collection: Collection, id: Uuid) -> StoreResult<u64>;
    /// Documents whose value at the nested key `path` equals `value`.
    async fn find_documents_matching(
        &self,
        collection: Collection,
        path: &[&str],
        value: &Value,
    ) -> StoreResult<Vec<Value>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

/// PostgresRepository
///
/// Users live in a typed table; every other collection is a JSONB document in `documents`
/// tagged by its collection name.
pub struct PostgresRepository {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, email, name, photo, role, premium_until, created_at";

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` keeps registration idempotent per email; an empty
    /// `RETURNING` set means the user already existed.
    async fn create_user(&self, req: RegisterUserRequest) -> StoreResult<Option<UserRecord>> {
        let sql = format!(
            "INSERT INTO users (id, email, name, photo) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&req.email)
            .bind(&req.name)
            .bind(&req.photo)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn promote_to_admin(&self, id: Uuid) -> StoreResult<UpdateResult> {
        let current: Option<(Option<String>,)> =
            sqlx::query_as("SELECT role FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((role,)) = current else {
            return Ok(UpdateResult {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
            });
        };

        let modified_count = if role.as_deref() == Some(crate::models::ADMIN_ROLE) {
            0
        } else {
            sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
                .bind(id)
                .bind(crate::models::ADMIN_ROLE)
                .execute(&self.pool)
                .await?
                .rows_affected()
        };

        Ok(UpdateResult {
            acknowledged: true,
            matched_count: 1,
            modified_count,
        })
    }

    async fn grant_premium(&self, email: &str, until: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE users SET premium_until = $2 WHERE email = $1")
            .bind(email)
            .bind(until)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_document(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(collection.as_str())
            .bind(Json(Value::Object(body)))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_documents(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let rows: Vec<(Uuid, Json<Value>)> = sqlx::query_as(
            "SELECT id, body FROM documents WHERE collection = $1 ORDER BY created_at ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, Json(body))| document_with_id(id, body))
            .collect())
    }

    async fn find_document(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let row: Option<(Uuid, Json<Value>)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, Json(body))| document_with_id(id, body)))
    }

    async fn delete_document(&self, collection: Collection, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_documents_matching(
        &self,
        collection: Collection,
        path: &[&str],
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let path: Vec<String> = path.iter().map(|segment| segment.to_string()).collect();
        let rows: Vec<(Uuid, Json<Value>)> = sqlx::query_as(
            "SELECT id, body FROM documents \
             WHERE collection = $1 AND body #> $2 = $3 \
             ORDER BY created_at ASC",
        )
        .bind(collection.as_str())
        .bind(path)
        .bind(Json(value.clone()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, Json(body))| document_with_id(id, body))
            .collect())
    }
}

// --- In-memory ---

/// MemoryRepository
///
/// A process-local store with the same semantics as `PostgresRepository`. Used by the test
/// suite and handy for running the API without a database.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<Vec<UserRecord>>,
    documents: RwLock<HashMap<Collection, Vec<(Uuid, Map<String, Value>)>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user record as-is, bypassing registration. Replaces any record with the
    /// same email.
    pub async fn put_user(&self, user: UserRecord) {
        let mut users = self.users.write().await;
        users.retain(|existing| existing.email != user.email);
        users.push(user);
    }
}

fn value_at<'a>(body: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(body.get(*first)?, |current, segment| current.get(*segment))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.users.read().await.clone())
    }

    async fn create_user(&self, req: RegisterUserRequest) -> StoreResult<Option<UserRecord>> {
        let mut users = self.users.write().await;
        if users.iter().any(|user| user.email == req.email) {
            return Ok(None);
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: req.email,
            name: req.name,
            photo: req.photo,
            role: None,
            premium_until: None,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<u64> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|user| user.id != id);
        Ok((before - users.len()) as u64)
    }

    async fn promote_to_admin(&self, id: Uuid) -> StoreResult<UpdateResult> {
        let mut users = self.users.write().await;
        let mut result = UpdateResult {
            acknowledged: true,
            ..UpdateResult::default()
        };
        if let Some(user) = users.iter_mut().find(|user| user.id == id) {
            result.matched_count = 1;
            if !user.is_admin() {
                user.role = Some(crate::models::ADMIN_ROLE.to_string());
                result.modified_count = 1;
            }
        }
        Ok(result)
    }

    async fn grant_premium(&self, email: &str, until: DateTime<Utc>) -> StoreResult<u64> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|user| user.email == email) {
            Some(user) => {
                user.premium_until = Some(until);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn insert_document(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.documents
            .write()
            .await
            .entry(collection)
            .or_default()
            .push((id, body));
        Ok(id)
    }

    async fn list_documents(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| document_with_id(*id, Value::Object(body.clone())))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_document(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&collection).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| *doc_id == id)
                .map(|(doc_id, body)| document_with_id(*doc_id, Value::Object(body.clone())))
        }))
    }

    async fn delete_document(&self, collection: Collection, id: Uuid) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let Some(docs) = documents.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|(doc_id, _)| *doc_id != id);
        Ok((before - docs.len()) as u64)
    }

    async fn find_documents_matching(
        &self,
        collection: Collection,
        path: &[&str],
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| value_at(body, path) == Some(value))
                    .map(|(id, body)| document_with_id(*id, Value::Object(body.clone())))
                    .collect()
            })
            .unwrap_or_default())
    }
}
