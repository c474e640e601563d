mod support;

use axum::http::{Method, StatusCode};
use common_auth::Role;
use serde_json::json;
use support::TestApp;

#[tokio::test]
async fn admin_routes_reject_other_roles() {
    let app = TestApp::new();
    app.seed_identity("teach@example.com", Some(Role::Instructor)).await;
    app.seed_identity("ana@example.com", None).await;

    for email in ["teach@example.com", "ana@example.com", "ghost@example.com"] {
        let token = app.token_for(email);
        let (status, body) = app.send(Method::GET, "/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{email}");
        assert_eq!(body["message"], "forbidden message");
    }
}

#[tokio::test]
async fn admin_can_list_and_promote() {
    let app = TestApp::new();
    app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let ana = app.seed_identity("ana@example.com", None).await;
    let admin = app.token_for("admin@example.com");

    let (status, body) = app.send(Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/users/{ana}/role"),
            Some(&admin),
            Some(json!({"role": "instructor"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"matchedCount": 1, "modifiedCount": 1}));

    // The promotion is visible to the very next request; no new token needed.
    let ana_token = app.token_for("ana@example.com");
    let (status, _) = app
        .send(
            Method::POST,
            "/classes",
            Some(&ana_token),
            Some(json!({"name": "Ceramics", "price": 30.0, "availableSeats": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn zero_match_admin_writes_report_zero() {
    let app = TestApp::new();
    app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let admin = app.token_for("admin@example.com");
    let missing = uuid::Uuid::new_v4();

    let (status, body) = app
        .send(Method::PATCH, &format!("/users/{missing}/role"), Some(&admin), Some(json!({"role": "admin"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], 0);

    let (status, body) = app
        .send(Method::DELETE, &format!("/users/{missing}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deletedCount": 0}));
}

#[tokio::test]
async fn demotion_revokes_access_immediately() {
    let app = TestApp::new();
    let id = app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let token = app.token_for("admin@example.com");

    let (status, _) = app.send(Method::GET, "/classes/manage", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    use course_service::store::IdentityStore;
    app.store.update_role_by_id(id, Role::Student).await.unwrap();
    let (status, _) = app.send(Method::GET, "/classes/manage", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn instructor_routes_need_instructor_role() {
    let app = TestApp::new();
    app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let token = app.token_for("admin@example.com");
    let (status, body) = app
        .send(
            Method::POST,
            "/classes",
            Some(&token),
            Some(json!({"name": "Ceramics", "price": 30.0, "availableSeats": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden_role");
}

#[tokio::test]
async fn role_guard_still_requires_authentication() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/classes/manage", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized Access");
}

#[tokio::test]
async fn store_outage_during_role_lookup_is_503() {
    let app = TestApp::new();
    app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let token = app.token_for("admin@example.com");
    app.store.simulate_outage(true);

    let (status, body) = app.send(Method::GET, "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "store_unavailable");
}
