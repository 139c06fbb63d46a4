//! 用户管理 API 集成测试

use axum::http::StatusCode;
use library_service::models::Role;
use serde_json::json;

mod common;
use common::{body_json, empty_request, json_request, TestApp, DEFAULT_PASSWORD};

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let app = TestApp::new();
    let admin = app.create_user("admin@b.com", DEFAULT_PASSWORD, Role::Admin).await;
    app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let session = app.login("reader@b.com", DEFAULT_PASSWORD).await;
    let cookie = session.access_only();

    let requests = vec![
        empty_request("GET", "/users", Some(&cookie)),
        empty_request("GET", &format!("/users/{}", admin.id), Some(&cookie)),
        empty_request("DELETE", &format!("/users/{}", admin.id), Some(&cookie)),
        json_request(
            "PATCH",
            &format!("/users/{}/role", admin.id),
            &json!({ "role": "user" }),
            Some(&cookie),
        ),
    ];

    for request in requests {
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Forbidden!");
    }
}

#[tokio::test]
async fn test_admin_lists_and_fetches_users() {
    let app = TestApp::new();
    app.create_user("admin@b.com", DEFAULT_PASSWORD, Role::Admin).await;
    let reader = app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let session = app.login("admin@b.com", DEFAULT_PASSWORD).await;

    let response = app
        .send(empty_request("GET", "/users?limit=1", Some(&session.access_only())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["users"].as_array().unwrap().len(), 1);

    let response = app
        .send(empty_request(
            "GET",
            &format!("/users/{}", reader.id),
            Some(&session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], "reader@b.com");

    let response = app
        .send(empty_request(
            "GET",
            &format!("/users/{}", uuid::Uuid::new_v4()),
            Some(&session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_change_applies_on_next_request() {
    let app = TestApp::new();
    app.create_user("admin@b.com", DEFAULT_PASSWORD, Role::Admin).await;
    let reader = app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let admin_session = app.login("admin@b.com", DEFAULT_PASSWORD).await;
    let reader_session = app.login("reader@b.com", DEFAULT_PASSWORD).await;

    let response = app
        .send(empty_request("GET", "/users", Some(&reader_session.access_only())))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(json_request(
            "PATCH",
            &format!("/users/{}/role", reader.id),
            &json!({ "role": "admin" }),
            Some(&admin_session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Role updated.");
    assert_eq!(json["user"]["role"], "admin");

    // 同一个访问令牌，角色从账户记录重新读取
    let response = app
        .send(empty_request("GET", "/users", Some(&reader_session.access_only())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_role_is_rejected() {
    let app = TestApp::new();
    app.create_user("admin@b.com", DEFAULT_PASSWORD, Role::Admin).await;
    let reader = app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let session = app.login("admin@b.com", DEFAULT_PASSWORD).await;

    let response = app
        .send(json_request(
            "PATCH",
            &format!("/users/{}/role", reader.id),
            &json!({ "role": "superuser" }),
            Some(&session.access_only()),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user_invalidates_their_session() {
    let app = TestApp::new();
    let admin = app.create_user("admin@b.com", DEFAULT_PASSWORD, Role::Admin).await;
    let reader = app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let admin_session = app.login("admin@b.com", DEFAULT_PASSWORD).await;
    let reader_session = app.login("reader@b.com", DEFAULT_PASSWORD).await;

    // 不能删除自己
    let response = app
        .send(empty_request(
            "DELETE",
            &format!("/users/{}", admin.id),
            Some(&admin_session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(empty_request(
            "DELETE",
            &format!("/users/{}", reader.id),
            Some(&admin_session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "User deleted.");

    let response = app
        .send(empty_request("GET", "/auth/me", Some(&reader_session.access_only())))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(empty_request(
            "DELETE",
            &format!("/users/{}", reader.id),
            Some(&admin_session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new();
    app.create_user("reader@b.com", DEFAULT_PASSWORD, Role::User).await;
    let session = app.login("reader@b.com", DEFAULT_PASSWORD).await;

    let response = app
        .send(json_request(
            "PUT",
            "/users/me/password",
            &json!({ "old_password": "Wrong1!@", "new_password": "Newpass1!" }),
            Some(&session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "PUT",
            "/users/me/password",
            &json!({ "old_password": DEFAULT_PASSWORD, "new_password": "short" }),
            Some(&session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "PUT",
            "/users/me/password",
            &json!({ "old_password": DEFAULT_PASSWORD, "new_password": "Newpass1!" }),
            Some(&session.access_only()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Password changed.");

    app.login("reader@b.com", "Newpass1!").await;
}
