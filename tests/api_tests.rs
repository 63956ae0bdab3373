use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use keystone::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn spawn_app() -> Router {
    let db_path =
        std::env::temp_dir().join(format!("keystone-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.secure_cookies = false;

    let state = keystone::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");
    keystone::api::router(state)
        .await
        .expect("failed to build router")
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Session cookie from a login response, trimmed to `name=value`.
fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value, Option<String>) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap();

    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|_| session_cookie(&response));
    let body = body_json(response).await;
    (status, body, cookie)
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = spawn_app().await;

    for uri in [
        "/api/system/status",
        "/api/users",
        "/api/auth/me",
        "/api/admin/credentials",
    ] {
        let response = app.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn login_with_default_password_establishes_session() {
    let app = spawn_app().await;

    let (status, body, cookie) = login(&app, "kmb", "woaini96!!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "kim-mu-bin");
    // Profile only: the response never carries a credential field.
    assert!(body["data"].get("default_password").is_none());
    assert!(body["data"].get("password").is_none());

    let cookie = cookie.expect("login should set a session cookie");

    // Restore is non-destructive: reading the identity twice yields the same user.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get_request("/api/auth/me", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["id"], "kim-mu-bin");
        assert_eq!(body["data"]["username"], "kmb");
    }
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;

    let (wrong_status, wrong_body, _) = login(&app, "kmb", "wrong").await;
    let (unknown_status, unknown_body, _) = login(&app, "nonexistent", "anything").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["error"], unknown_body["error"]);
    assert_eq!(wrong_body["error"], "Username or password incorrect");
}

#[tokio::test]
async fn login_requires_both_fields() {
    let app = spawn_app().await;

    let (status, _, _) = login(&app, "", "x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = login(&app, "kmb", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_forgets_the_identity() {
    let app = spawn_app().await;

    let (_, _, cookie) = login(&app, "skn", "seowon2026").await;
    let cookie = cookie.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/logout",
            Some(&cookie),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/api/auth/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_validation_order_and_forced_relogin() {
    let app = spawn_app().await;

    let (_, _, cookie) = login(&app, "skn", "seowon2026").await;
    let cookie = cookie.unwrap();

    // Mismatch and too-short at once: the mismatch is reported.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/auth/password",
            Some(&cookie),
            &json!({
                "current_password": "seowon2026",
                "new_password": "abc",
                "confirm_password": "abd",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "New passwords do not match");

    // Valid change succeeds and tears the session down.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/auth/password",
            Some(&cookie),
            &json!({
                "current_password": "seowon2026",
                "new_password": "rotated-pw-1",
                "confirm_password": "rotated-pw-1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["synced_remote"], false);

    let response = app
        .clone()
        .oneshot(get_request("/api/auth/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Old password no longer works; the new one does.
    let (status, _, _) = login(&app, "skn", "seowon2026").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = login(&app, "skn", "rotated-pw-1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_reset_is_gated_to_the_designated_user() {
    let app = spawn_app().await;

    // A leader who is not the designated admin is rejected without effect.
    let (_, _, cookie) = login(&app, "cjy", "seowon2026").await;
    let cookie = cookie.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/credentials/song-kyu-nam/reset",
            Some(&cookie),
            &json!({ "new_password": "hijacked-pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request("/api/admin/credentials", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // No effect: the target still logs in with the default.
    let (status, _, _) = login(&app, "skn", "seowon2026").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_resets_and_sees_the_credential_overview() {
    let app = spawn_app().await;

    let (_, _, cookie) = login(&app, "kmb", "woaini96!!").await;
    let cookie = cookie.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/credentials/song-kyu-nam/reset",
            Some(&cookie),
            &json!({ "new_password": "issued-pw-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The target's old password is gone, the issued one works.
    let (status, _, _) = login(&app, "skn", "seowon2026").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = login(&app, "skn", "issued-pw-1").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/api/admin/credentials", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let entries = body["data"].as_array().unwrap();
    let target = entries
        .iter()
        .find(|e| e["user_id"] == "song-kyu-nam")
        .unwrap();
    assert_eq!(target["current_password"], "issued-pw-1");
    assert_eq!(target["changed"], true);
    assert_eq!(target["changed_by"], "김무빈");

    let untouched = entries
        .iter()
        .find(|e| e["user_id"] == "chun-ji-yeon")
        .unwrap();
    assert_eq!(untouched["changed"], false);
}

#[tokio::test]
async fn directory_listing_is_profile_only() {
    let app = spawn_app().await;

    let (_, _, cookie) = login(&app, "psml", "1111").await;
    let cookie = cookie.unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/api/users", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 14);
    for user in users {
        assert!(user.get("default_password").is_none());
        assert!(user.get("password").is_none());
    }

    // Observer role is read-only.
    let observer = users
        .iter()
        .find(|u| u["id"] == "external-observer-psml")
        .unwrap();
    assert_eq!(observer["can_write"], false);
}

#[tokio::test]
async fn system_status_reports_store_health() {
    let app = spawn_app().await;

    let (_, _, cookie) = login(&app, "lkb", "seowon2030").await;
    let cookie = cookie.unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/api/system/status", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["data"]["database_ok"], true);
    assert_eq!(body["data"]["remote_store_configured"], false);
}
