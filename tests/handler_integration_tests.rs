use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use news_orbit::{
    AppConfig, AppState, MemoryRepository, create_router,
    auth::{IdentityRequest, TokenPurpose, issue_token},
    models::UserRecord,
    repository::Repository,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Harness ---

const ADMIN: &str = "editor@newsorbit.dev";
const WRITER: &str = "writer@newsorbit.dev";

struct TestApp {
    router: Router,
    repo: Arc<MemoryRepository>,
}

async fn test_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    repo.put_user(UserRecord {
        id: Uuid::new_v4(),
        email: ADMIN.to_string(),
        role: Some("admin".to_string()),
        ..UserRecord::default()
    })
    .await;

    let router = create_router(AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    });
    TestApp { router, repo }
}

fn session(email: &str) -> String {
    issue_token(
        IdentityRequest::for_email(email),
        TokenPurpose::Session,
        &AppConfig::default().jwt_secret,
        Utc::now(),
    )
    .unwrap()
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = as_user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", session(email)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, json)
    }
}

// --- Public ---

#[tokio::test]
async fn test_root_banner_and_health() {
    let app = test_app().await;

    let (status, body) = app.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("news orbit server is running"));

    let (status, _) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_is_idempotent_per_email() {
    let app = test_app().await;
    let payload = json!({ "email": WRITER, "name": "Writer", "photo": null });

    let (status, body) = app.call(Method::POST, "/users", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], json!(true));
    assert!(body["insertedId"].is_string());

    let (status, body) = app.call(Method::POST, "/users", None, Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "acknowledged": true, "insertedId": null, "message": "user already exists" })
    );

    let stored = app.repo.list_users().await.unwrap();
    assert_eq!(stored.iter().filter(|u| u.email == WRITER).count(), 1);
    assert!(stored.iter().all(|u| u.email != WRITER || u.role.is_none()));
}

#[tokio::test]
async fn test_registration_requires_email() {
    let app = test_app().await;
    let (status, body) = app
        .call(Method::POST, "/users", None, Some(json!({ "email": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "email is required" }));
}

// --- Review Workflow ---

#[tokio::test]
async fn test_article_review_workflow() {
    let app = test_app().await;

    // Writer submits.
    let article = json!({
        "title": "Harbour reopens",
        "userData": { "email": WRITER, "name": "Writer" }
    });
    let (status, body) = app
        .call(Method::POST, "/add-articles", Some(WRITER), Some(article.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let article_id = body["insertedId"].as_str().unwrap().to_string();

    // Writer sees their own submission, by email and by id.
    let (_, mine) = app
        .call(Method::GET, &format!("/user-articles/{WRITER}"), None, None)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["_id"], json!(article_id));

    let (status, single) = app
        .call(Method::GET, &format!("/userapproved/{article_id}"), Some(WRITER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single["title"], json!("Harbour reopens"));

    // Only the admin may see the review queue or approve.
    let (status, _) = app.call(Method::GET, "/articles", Some(WRITER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, queue) = app.call(Method::GET, "/articles", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(Method::POST, "/admin-approved", Some(WRITER), Some(article.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, approved) = app
        .call(Method::POST, "/admin-approved", Some(ADMIN), Some(article))
        .await;
    assert_eq!(status, StatusCode::OK);
    let approved_id = approved["insertedId"].as_str().unwrap().to_string();

    // Approved copy is public.
    let (status, published) = app
        .call(Method::GET, &format!("/approved/{approved_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["title"], json!("Harbour reopens"));
    let (_, feed) = app.call(Method::GET, "/approved-data", None, None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);

    // Admin clears the original submission.
    let (status, deleted) = app
        .call(Method::DELETE, &format!("/articles/{article_id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({ "acknowledged": true, "deletedCount": 1 }));

    let (_, deleted_again) = app
        .call(Method::DELETE, &format!("/userDataDelete/{article_id}"), Some(ADMIN), None)
        .await;
    assert_eq!(deleted_again["deletedCount"], json!(0));
}

#[tokio::test]
async fn test_decline_reasons_and_publishers_are_admin_writes() {
    let app = test_app().await;

    let decline = json!({ "articleId": "abc", "reason": "Unsourced claims" });
    let (status, _) = app
        .call(Method::POST, "/articles-decline", Some(WRITER), Some(decline.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::POST, "/articles-decline", Some(ADMIN), Some(decline))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(Method::POST, "/add-publisher", None, Some(json!({ "name": "Daily" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(Method::POST, "/add-publisher", Some(ADMIN), Some(json!({ "name": "Daily" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, publishers) = app.call(Method::GET, "/publisher", Some(WRITER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(publishers[0]["name"], json!("Daily"));
}

#[tokio::test]
async fn test_missing_documents_are_not_found() {
    let app = test_app().await;
    let missing = Uuid::new_v4();

    let (status, body) = app
        .call(Method::GET, &format!("/approved/{missing}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "not found" }));

    let (status, _) = app
        .call(Method::GET, &format!("/premium/{missing}"), Some(WRITER), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_app().await;
    let (status, doc) = app.call(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/jwt").is_some());
    assert!(doc["paths"].get("/users/admin/{id}").is_some());
    assert!(doc["paths"].get("/premium/{id}/approve").is_some());
}
