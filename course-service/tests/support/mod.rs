#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use common_auth::{JwtConfig, Role};
use course_service::config::CorsOrigins;
use course_service::gateway::StubGateway;
use course_service::models::{ClassOffering, ClassStatus, ProfileUpdate, Selection};
use course_service::store::{ClassStore, IdentityStore, MemoryStore, SelectionStore, Stores};
use course_service::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "course-test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            Stores::memory(store.clone()),
            JwtConfig::new(TEST_SECRET),
            Arc::new(StubGateway::new()),
            "usd",
        )
        .expect("state builds");
        let router = build_router(state.clone(), &CorsOrigins::Any);
        Self {
            router,
            state,
            store,
        }
    }

    pub fn token_for(&self, email: &str) -> String {
        self.state
            .token_issuer
            .issue(serde_json::json!({ "email": email }))
            .expect("token issued")
            .token
    }

    /// Creates the identity and stores `role` on it.
    pub async fn seed_identity(&self, email: &str, role: Option<Role>) -> Uuid {
        let identity = self
            .store
            .upsert_by_email(email, ProfileUpdate::default())
            .await
            .expect("identity stored");
        if let Some(role) = role {
            self.store
                .update_role_by_id(identity.id, role)
                .await
                .expect("role stored");
        }
        identity.id
    }

    pub async fn seed_class(&self, instructor: &str, available_seats: i32, enrolled: i32) -> ClassOffering {
        ClassStore::insert(
            self.store.as_ref(),
            ClassOffering {
                id: Uuid::new_v4(),
                name: "Figure Drawing".into(),
                image_url: None,
                instructor_name: Some("Instructor".into()),
                instructor_email: instructor.into(),
                price: 49.99,
                available_seats,
                enrolled,
                status: ClassStatus::Approved.as_str().into(),
                feedback: None,
                created_at: Utc::now(),
            },
        )
        .await
        .expect("class stored")
    }

    pub async fn seed_selection(&self, email: &str, class: &ClassOffering) -> Selection {
        SelectionStore::insert(
            self.store.as_ref(),
            Selection {
                id: Uuid::new_v4(),
                email: email.into(),
                class_id: class.id,
                class_name: Some(class.name.clone()),
                price: Some(class.price),
                created_at: Utc::now(),
            },
        )
        .await
        .expect("selection stored")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");
        send_request(&self.router, request).await
    }
}

pub async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}
