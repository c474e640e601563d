mod support;

use axum::http::{Method, StatusCode};
use common_auth::Role;
use serde_json::json;
use support::TestApp;

#[tokio::test]
async fn foreign_email_is_forbidden_regardless_of_role() {
    let app = TestApp::new();
    app.seed_identity("admin@example.com", Some(Role::Admin)).await;
    let token = app.token_for("admin@example.com");

    for uri in [
        "/payments?email=ana@example.com",
        "/selectedclasses?email=ana@example.com",
        "/enrolled?email=ana@example.com",
        "/myclasses?email=ana@example.com",
        "/users/role/ana@example.com",
    ] {
        let (status, body) = app.send(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["message"], "Forbidden Access", "{uri}");
    }
}

#[tokio::test]
async fn missing_email_query_yields_empty_list() {
    let app = TestApp::new();
    let token = app.token_for("ana@example.com");
    for uri in ["/payments", "/selectedclasses", "/enrolled", "/myclasses"] {
        let (status, body) = app.send(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!([]), "{uri}");
    }
}

#[tokio::test]
async fn profile_upsert_is_self_only_and_ignores_role() {
    let app = TestApp::new();
    let token = app.token_for("ana@example.com");

    let (status, body) = app
        .send(
            Method::PUT,
            "/users/bob@example.com",
            Some(&token),
            Some(json!({"name": "Bob"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden Access");

    let (status, body) = app
        .send(
            Method::PUT,
            "/users/ana@example.com",
            Some(&token),
            Some(json!({"name": "Ana", "photoUrl": "https://img/ana.png", "role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ana");
    assert!(body["role"].is_null());

    let (status, body) = app
        .send(Method::GET, "/users/role/ana@example.com", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"email": "ana@example.com", "role": "student", "admin": false, "instructor": false})
    );
}

#[tokio::test]
async fn role_view_reports_stored_role() {
    let app = TestApp::new();
    app.seed_identity("teach@example.com", Some(Role::Instructor)).await;
    let token = app.token_for("teach@example.com");
    let (status, body) = app
        .send(Method::GET, "/users/role/teach@example.com", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "instructor");
    assert_eq!(body["instructor"], true);
    assert_eq!(body["admin"], false);
}

#[tokio::test]
async fn payment_confirmation_for_someone_else_is_forbidden() {
    let app = TestApp::new();
    let class = app.seed_class("teach@example.com", 5, 0).await;
    let selection = app.seed_selection("ana@example.com", &class).await;
    let token = app.token_for("bob@example.com");

    let (status, body) = app
        .send(
            Method::POST,
            "/payments",
            Some(&token),
            Some(json!({
                "email": "ana@example.com",
                "amount": 49.99,
                "enrolledClassId": class.id,
                "deletedSelectionId": selection.id
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden Access");
}

#[tokio::test]
async fn deleting_another_students_selection_is_forbidden() {
    let app = TestApp::new();
    let class = app.seed_class("teach@example.com", 5, 0).await;
    let selection = app.seed_selection("ana@example.com", &class).await;
    let bob = app.token_for("bob@example.com");

    let (status, _) = app
        .send(Method::DELETE, &format!("/selectedclasses/{}", selection.id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let ana = app.token_for("ana@example.com");
    let (status, body) = app
        .send(Method::DELETE, &format!("/selectedclasses/{}", selection.id), Some(&ana), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deletedCount": 1}));

    let (_, body) = app
        .send(Method::DELETE, &format!("/selectedclasses/{}", selection.id), Some(&ana), None)
        .await;
    assert_eq!(body, json!({"deletedCount": 0}));
}
