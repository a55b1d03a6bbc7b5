//! HTTP surface tests driving the full router.

mod common;

use axum::http::StatusCode;
use common::{
    RecordingMailer, build_app, get_authed, lenient_rate_limits, post_json,
    post_json_with_headers, refresh_cookie_value, test_auth_config,
};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());

    let (status, _, body) = get_authed(&app, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_returns_tokens_and_cookie() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());

    let (status, headers, body) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["expires_at"].as_u64().unwrap() > 0);
    assert_eq!(body["user"]["email"], "a@b.com");
    assert_eq!(body["user"]["role"], "USER");

    let refresh = refresh_cookie_value(&headers).expect("refresh cookie set");
    assert!(!refresh.is_empty());
    assert_ne!(refresh, body["access_token"].as_str().unwrap());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    let payload = json!({"email": "a@b.com", "password": "pw123456"});

    let (status, _, _) = post_json(&app, "/api/auth/register", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = post_json(&app, "/api/auth/register", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already registered"));
}

#[tokio::test]
async fn test_register_validates_body() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());

    let (status, _, _) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "short"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "", "password": "pw123456"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;

    let (status, headers, body) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(refresh_cookie_value(&headers).is_some());

    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@b.com", "password": "wrong-password"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    // Unknown identity looks identical.
    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "ghost@b.com", "password": "pw123456"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_lockout_via_http() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;

    for _ in 0..5 {
        let (status, _, _) = post_json(
            &app,
            "/api/auth/login",
            json!({"email": "a@b.com", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _, _) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_me_requires_valid_token() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    let (_, _, body) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let (status, _, body) = get_authed(&app, "/api/auth/me", Some(&access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["role"], "USER");

    let (status, _, _) = get_authed(&app, "/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = get_authed(&app, "/api/auth/me", Some("garbage.token.here")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_cookie() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    let (_, headers, _) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    let old_refresh = refresh_cookie_value(&headers).unwrap();

    let (status, headers, body) = post_json_with_headers(
        &app,
        "/api/auth/refresh",
        json!({}),
        &[("cookie", &format!("refresh_token={}", old_refresh))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    let new_refresh = refresh_cookie_value(&headers).unwrap();
    assert_ne!(new_refresh, old_refresh);

    // Replaying the rotated-out cookie fails.
    let (status, _, _) = post_json_with_headers(
        &app,
        "/api/auth/refresh",
        json!({}),
        &[("cookie", &format!("refresh_token={}", old_refresh))],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The rotated-in cookie works.
    let (status, _, _) = post_json_with_headers(
        &app,
        "/api/auth/refresh",
        json!({}),
        &[("cookie", &format!("refresh_token={}", new_refresh))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_cookie_rejected() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());

    let (status, _, body) = post_json(&app, "/api/auth/refresh", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing refresh token");
}

#[tokio::test]
async fn test_logout_clears_cookie_and_revokes() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    let (_, headers, _) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    let refresh = refresh_cookie_value(&headers).unwrap();

    let (status, headers, body) = post_json_with_headers(
        &app,
        "/api/auth/logout",
        json!({}),
        &[("cookie", &format!("refresh_token={}", refresh))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Cookie cleared: empty value, immediate expiry.
    let set_cookie = headers
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .find_map(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.starts_with("refresh_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    // The revoked token no longer refreshes.
    let (status, _, _) = post_json_with_headers(
        &app,
        "/api/auth/refresh",
        json!({}),
        &[("cookie", &format!("refresh_token={}", refresh))],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logout without a cookie still succeeds.
    let (status, _, _) = post_json(&app, "/api/auth/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_is_silent_for_unknown_identity() {
    let mailer = RecordingMailer::new();
    let app = build_app(
        Some(mailer.clone()),
        test_auth_config(),
        lenient_rate_limits(),
    );

    let (status, _, body) = post_json(
        &app,
        "/api/auth/forgot-password",
        json!({"email": "ghost@b.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], true);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_forgot_password_without_mailer_is_unavailable() {
    let app = build_app(None, test_auth_config(), lenient_rate_limits());
    post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;

    let (status, _, _) = post_json(
        &app,
        "/api/auth/forgot-password",
        json!({"email": "a@b.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_password_reset_flow_via_http() {
    let mailer = RecordingMailer::new();
    let app = build_app(
        Some(mailer.clone()),
        test_auth_config(),
        lenient_rate_limits(),
    );
    post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;

    let (status, _, _) = post_json(
        &app,
        "/api/auth/forgot-password",
        json!({"email": "a@b.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = common::token_from_mail(&mailer.sent().last().unwrap().text_body);

    let (status, _, body) = post_json(
        &app,
        "/api/auth/reset-password",
        json!({"token": token, "password": "newpass99"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], true);

    // Old password rejected, new one accepted.
    let (status, _, _) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "a@b.com", "password": "newpass99"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The token is spent.
    let (status, _, _) = post_json(
        &app,
        "/api/auth/reset-password",
        json!({"token": token, "password": "anotherpw1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_email_flow_via_http() {
    let mailer = RecordingMailer::new();
    let app = build_app(
        Some(mailer.clone()),
        test_auth_config(),
        lenient_rate_limits(),
    );
    let (_, _, body) = post_json(
        &app,
        "/api/auth/register",
        json!({"email": "a@b.com", "password": "pw123456"}),
    )
    .await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let token = common::token_from_mail(&mailer.sent()[0].text_body);
    let (status, _, body) = post_json(
        &app,
        "/api/auth/verify-email",
        json!({"token": token}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let (_, _, body) = get_authed(&app, "/api/auth/me", Some(&access_token)).await;
    assert_eq!(body["email_verified"], true);
}
