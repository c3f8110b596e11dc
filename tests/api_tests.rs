use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;
use tribune::config::Config;

/// Credentials seeded by the initial migration.
const OWNER_USERNAME: &str = "owner";
const OWNER_PASSWORD: &str = "password";

const BOUNDARY: &str = "tribune-test-boundary";

static TEST_ID: AtomicUsize = AtomicUsize::new(0);

async fn spawn_app() -> (Router, PathBuf) {
    let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
    let root = std::env::temp_dir().join(format!("tribune-test-{}-{id}", std::process::id()));

    tokio::fs::create_dir_all(&root).await.unwrap();
    tokio::fs::write(root.join("default-avatar.jpg"), b"default avatar bytes")
        .await
        .unwrap();

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;
    config.observability.metrics_enabled = false;
    config.uploads.posts_path = root.join("posts").display().to_string();
    config.uploads.avatars_path = root.join("avatars").display().to_string();
    config.uploads.default_avatar = root.join("default-avatar.jpg").display().to_string();

    let state = tribune::api::create_app_state(config, None)
        .await
        .expect("Failed to create app state");

    (tribune::api::router(state), root)
}

async fn files_in(path: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(path).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }
    count
}

async fn into_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    into_json(response).await
}

async fn send_empty(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    into_json(response).await
}

async fn send_raw(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((name, filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_multipart(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(multipart_body(fields, file))).unwrap())
        .await
        .unwrap();

    into_json(response).await
}

async fn register(app: &Router, username: &str, email: &str, password: &str) {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/auth/register",
        None,
        json!({
            "username": username,
            "email": email,
            "password": password,
            "confirm_password": password,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "registration failed: {body}");
    assert_eq!(body["success"], true);
}

/// Logs in and returns the session cookie.
async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"username": username, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "login failed for {username}");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login did not set a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    cookie
}

async fn create_post(app: &Router, cookie: &str, title: &str, content: &str) -> i64 {
    let (status, body) = send_multipart(
        app,
        "POST",
        "/api/posts",
        Some(cookie),
        &[("title", title), ("content", content)],
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "create post failed: {body}");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_and_login_flow() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "sup3rsecret").await;

    // same email, different username: rejected on the second attempt
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/auth/register",
        None,
        json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "sup3rsecret",
            "confirm_password": "sup3rsecret",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "A user with that username or email already exists."
    );

    // wrong password and unknown username produce the same message
    let (status_wrong, wrong) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        json!({"username": "alice", "password": "not-the-password"}),
    )
    .await;
    let (status_unknown, unknown) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        json!({"username": "nobody", "password": "whatever"}),
    )
    .await;
    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["error"], unknown["error"]);
    assert_eq!(wrong["error"], "Invalid username or password.");

    // no session yet
    let (status, _) = send_empty(&app, "GET", "/api/auth/session", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "alice", "sup3rsecret").await;

    let (status, body) = send_empty(&app, "GET", "/api/auth/session", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logged_in"], true);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["role"], "user");

    // logout drops the session
    let (status, _) = send_empty(&app, "POST", "/api/auth/logout", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_empty(&app, "GET", "/api/auth/session", Some(&cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_validation() {
    let (app, _root) = spawn_app().await;

    let cases = [
        (
            json!({"username": "u", "email": "u@e.co", "password": "12345", "confirm_password": "12345"}),
            "The password must contain at least 6 characters.",
        ),
        (
            json!({"username": "u", "email": "not-an-email", "password": "123456", "confirm_password": "123456"}),
            "Email format is invalid.",
        ),
        (
            json!({"username": "u", "email": "u@e.co", "password": "123456", "confirm_password": "654321"}),
            "Passwords do not match.",
        ),
        (
            json!({"username": "", "email": "u@e.co", "password": "123456", "confirm_password": "123456"}),
            "Username cannot be empty.",
        ),
    ];

    for (payload, message) in cases {
        let (status, body) = send_json(&app, "POST", "/api/auth/register", None, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], message);
    }
}

#[tokio::test]
async fn test_password_update_rules() {
    let (app, _root) = spawn_app().await;

    register(&app, "carol", "carol@example.com", "original-pass").await;
    let cookie = login(&app, "carol", "original-pass").await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/password",
        Some(&cookie),
        json!({
            "current_password": "wrong",
            "new_password": "brand-new-pass",
            "confirm_password": "brand-new-pass",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect.");

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/password",
        Some(&cookie),
        json!({
            "current_password": "original-pass",
            "new_password": "original-pass",
            "confirm_password": "original-pass",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "New password must be different from the current password."
    );

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/password",
        Some(&cookie),
        json!({
            "current_password": "original-pass",
            "new_password": "short",
            "confirm_password": "short",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "New password must contain at least 6 characters.");

    let (status, _) = send_json(
        &app,
        "PUT",
        "/api/users/password",
        Some(&cookie),
        json!({
            "current_password": "original-pass",
            "new_password": "brand-new-pass",
            "confirm_password": "brand-new-pass",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // old password no longer works, new one does
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        json!({"username": "carol", "password": "original-pass"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "carol", "brand-new-pass").await;
}

#[tokio::test]
async fn test_profile_update_collisions() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    register(&app, "bob", "bob@example.com", "password2").await;
    let cookie = login(&app, "bob", "password2").await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/profile",
        Some(&cookie),
        json!({"username": "alice", "email": "bob@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username or email already exists.");

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/profile",
        Some(&cookie),
        json!({"username": "robert", "email": "bob@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "robert");

    // the session picked up the rename without a fresh login
    let (status, body) = send_empty(&app, "GET", "/api/auth/session", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "robert");
}

#[tokio::test]
async fn test_post_authorization_and_updated_at() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    register(&app, "bob", "bob@example.com", "password2").await;
    let alice = login(&app, "alice", "password1").await;
    let bob = login(&app, "bob", "password2").await;

    let post_id = create_post(&app, &alice, "First post", "Hello forum").await;

    // an authenticated non-owner, non-admin caller is denied
    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/posts/{post_id}"),
        Some(&bob),
        &[("title", "Hijacked"), ("content", "by bob")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not allowed to modify this resource.");

    // the owner succeeds and updated_at moves past created_at
    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/posts/{post_id}"),
        Some(&alice),
        &[("title", "First post, edited"), ("content", "Hello again")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "owner edit failed: {body}");
    assert_eq!(body["data"]["title"], "First post, edited");
    assert_ne!(body["data"]["updated_at"], body["data"]["created_at"]);

    // deletion follows the same rule
    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/posts/{post_id}"),
        Some(&bob),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/posts/{post_id}"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_empty(&app, "GET", &format!("/api/posts/{post_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_image_lifecycle() {
    let (app, root) = spawn_app().await;
    let posts_dir = root.join("posts");

    register(&app, "alice", "alice@example.com", "password1").await;
    let cookie = login(&app, "alice", "password1").await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/posts",
        Some(&cookie),
        &[("title", "With image"), ("content", "look at this")],
        Some(("image", "cat.png", "image/png", b"png bytes here")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    let post_id = body["data"]["id"].as_i64().unwrap();
    let filename = body["data"]["image"].as_str().unwrap().to_string();
    assert!(tokio::fs::try_exists(posts_dir.join(&filename)).await.unwrap());

    // replacing the image deletes the superseded file
    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/posts/{post_id}"),
        Some(&cookie),
        &[("title", "With image"), ("content", "new image")],
        Some(("new_image", "dog.gif", "image/gif", b"gif bytes here")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let replacement = body["data"]["image"].as_str().unwrap().to_string();
    assert_ne!(replacement, filename);
    assert!(!tokio::fs::try_exists(posts_dir.join(&filename)).await.unwrap());
    assert!(tokio::fs::try_exists(posts_dir.join(&replacement)).await.unwrap());

    // explicit removal clears the reference and the file
    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/posts/{post_id}"),
        Some(&cookie),
        &[
            ("title", "With image"),
            ("content", "no image"),
            ("delete_image", "1"),
        ],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["image"].is_null());
    assert!(!tokio::fs::try_exists(posts_dir.join(&replacement)).await.unwrap());

    // deleting a post removes its stored image as well
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/posts",
        Some(&cookie),
        &[("title", "Short lived"), ("content", "bye")],
        Some(("image", "x.jpg", "image/jpeg", b"jpeg bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let doomed_id = body["data"]["id"].as_i64().unwrap();
    let doomed_image = body["data"]["image"].as_str().unwrap().to_string();

    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/posts/{doomed_id}"),
        Some(&cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!tokio::fs::try_exists(posts_dir.join(&doomed_image)).await.unwrap());

    let (status, _) = send_empty(&app, "GET", &format!("/api/posts/{doomed_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_limits() {
    let (app, root) = spawn_app().await;
    let posts_dir = root.join("posts");

    register(&app, "alice", "alice@example.com", "password1").await;
    let cookie = login(&app, "alice", "password1").await;

    // 3MB is over the 2MB cap: no file, no row
    let oversized = vec![0u8; 3 * 1024 * 1024];
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/posts",
        Some(&cookie),
        &[("title", "Big"), ("content", "big image")],
        Some(("image", "big.jpg", "image/jpeg", &oversized)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Max file size is 2MB.");
    assert_eq!(files_in(&posts_dir).await, 0);

    let (status, body) = send_empty(&app, "GET", "/api/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total_count"], 0);

    // disallowed MIME type
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/posts",
        Some(&cookie),
        &[("title", "Bad type"), ("content", "text file")],
        Some(("image", "notes.txt", "text/plain", b"plain text")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only JPG, PNG, GIF allowed.");
    assert_eq!(files_in(&posts_dir).await, 0);

    // the same limits protect avatars
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/users/avatar",
        Some(&cookie),
        &[],
        Some(("avatar", "big.png", "image/png", &oversized)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Max file size is 2MB.");
    assert_eq!(files_in(&root.join("avatars")).await, 0);
}

#[tokio::test]
async fn test_post_pagination() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    let cookie = login(&app, "alice", "password1").await;

    for i in 1..=12 {
        create_post(&app, &cookie, &format!("Post {i}"), "content").await;
    }

    let (status, body) = send_empty(&app, "GET", "/api/posts?page=2&per_page=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 5);
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["total_count"], 12);
    assert_eq!(pagination["total_pages"], 3);
    assert_eq!(pagination["has_previous"], true);
    assert_eq!(pagination["has_next"], true);

    // a page beyond the end is an empty window, not an error
    let (status, body) = send_empty(&app, "GET", "/api/posts?page=9&per_page=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["pagination"]["has_next"], false);

    // "mine" requires a session
    let (status, _) = send_empty(&app, "GET", "/api/posts?mode=mine", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_empty(&app, "GET", "/api/posts?mode=mine", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total_count"], 12);
}

#[tokio::test]
async fn test_comment_flow_and_pagination() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    register(&app, "bob", "bob@example.com", "password2").await;
    let alice = login(&app, "alice", "password1").await;
    let bob = login(&app, "bob", "password2").await;

    let post_id = create_post(&app, &alice, "Discuss", "comment below").await;

    // an empty comment collection paginates to zero pages
    let (status, body) = send_empty(
        &app,
        "GET",
        &format!("/api/posts/{post_id}/comments"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total_pages"], 0);
    assert_eq!(body["data"]["pagination"]["has_next"], false);

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/comments"),
        Some(&bob),
        json!({"content": "nice post"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "comment failed: {body}");
    let comment_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["username"], "bob");

    // empty content is rejected
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/comments"),
        Some(&bob),
        json!({"content": "   "}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The comment cannot be empty.");

    // commenting on a missing post is a 404, not a constraint error
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/posts/99999/comments",
        Some(&bob),
        json!({"content": "into the void"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // alice owns the post but not the comment: she may not edit it
    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/comments/{comment_id}"),
        Some(&alice),
        json!({"content": "reworded"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not allowed to modify this resource.");

    // bob edits his own comment
    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/comments/{comment_id}"),
        Some(&bob),
        json!({"content": "nice post indeed"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "nice post indeed");

    // a moderator can delete anyone's comment
    let owner = login(&app, OWNER_USERNAME, OWNER_PASSWORD).await;
    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/comments/{comment_id}"),
        Some(&owner),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_empty(
        &app,
        "GET",
        &format!("/api/posts/{post_id}/comments"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total_count"], 0);
}

#[tokio::test]
async fn test_role_moderation_matrix() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    register(&app, "bob", "bob@example.com", "password2").await;
    let alice = login(&app, "alice", "password1").await;
    let owner = login(&app, OWNER_USERNAME, OWNER_PASSWORD).await;

    // regular users may not read the admin listing
    let (status, body) = send_empty(&app, "GET", "/api/users", Some(&alice)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "No permission.");

    let (status, body) = send_empty(&app, "GET", "/api/users", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[0]["username"], OWNER_USERNAME);
    assert_eq!(users[0]["role"], "owner");

    // find ids from the listing
    let id_of = |name: &str| {
        users
            .iter()
            .find(|u| u["username"] == name)
            .unwrap()["id"]
            .as_i64()
            .unwrap()
    };
    let alice_id = id_of("alice");
    let bob_id = id_of("bob");
    let owner_id = id_of(OWNER_USERNAME);

    // owner promotes alice; the session role is refreshed by a new login
    let (status, _) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{alice_id}/promote"),
        Some(&owner),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alice = login(&app, "alice", "password1").await;

    // admin promotes a regular user
    let (status, _) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{bob_id}/promote"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // admin may not promote another admin
    let (status, body) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{bob_id}/promote"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You cannot modify this user.");

    // admin may not promote the owner
    let (status, body) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{owner_id}/promote"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You cannot modify this user.");

    // demotion is owner-gated: an admin is refused outright
    let (status, body) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{bob_id}/demote"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Owner only.");

    // the owner cannot be demoted
    let (status, body) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{owner_id}/demote"),
        Some(&owner),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Cannot modify the owner.");

    // admin deleting another admin is refused
    let (status, body) = send_empty(
        &app,
        "DELETE",
        &format!("/api/users/{bob_id}"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admins can only delete regular users.");

    // nobody deletes themselves
    let (status, body) = send_empty(
        &app,
        "DELETE",
        &format!("/api/users/{alice_id}"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You cannot delete yourself.");

    // owner demotes bob back to a regular user, then the admin may delete him
    let (status, _) = send_empty(
        &app,
        "POST",
        &format!("/api/users/{bob_id}/demote"),
        Some(&owner),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/users/{bob_id}"),
        Some(&alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_empty(&app, "GET", "/api/users", Some(&owner)).await;
    assert!(
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u["username"] != "bob")
    );
}

#[tokio::test]
async fn test_admin_listing_includes_post_counts() {
    let (app, _root) = spawn_app().await;

    register(&app, "alice", "alice@example.com", "password1").await;
    let alice = login(&app, "alice", "password1").await;
    create_post(&app, &alice, "one", "content").await;
    create_post(&app, &alice, "two", "content").await;

    let owner = login(&app, OWNER_USERNAME, OWNER_PASSWORD).await;
    let (status, body) = send_empty(&app, "GET", "/api/users", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);

    let alice_row = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "alice")
        .unwrap();
    assert_eq!(alice_row["post_count"], 2);
}

#[tokio::test]
async fn test_avatar_endpoints() {
    let (app, root) = spawn_app().await;
    let avatars_dir = root.join("avatars");

    register(&app, "alice", "alice@example.com", "password1").await;
    let cookie = login(&app, "alice", "password1").await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/users/avatar",
        Some(&cookie),
        &[],
        Some(("avatar", "me.png", "image/png", b"avatar png bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "avatar upload failed: {body}");
    let filename = body["data"]["filename"].as_str().unwrap().to_string();
    assert!(tokio::fs::try_exists(avatars_dir.join(&filename)).await.unwrap());

    // served back with a content type from the extension
    let (status, headers, bytes) = send_raw(&app, &format!("/api/avatars/{filename}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(bytes, b"avatar png bytes");

    // uploading a replacement removes the old file
    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/users/avatar",
        Some(&cookie),
        &[],
        Some(("avatar", "me2.gif", "image/gif", b"avatar gif bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let replacement = body["data"]["filename"].as_str().unwrap().to_string();
    assert!(!tokio::fs::try_exists(avatars_dir.join(&filename)).await.unwrap());
    assert!(tokio::fs::try_exists(avatars_dir.join(&replacement)).await.unwrap());

    // a missing avatar falls back to the default image
    let (status, headers, bytes) = send_raw(&app, "/api/avatars/no-such-file.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(bytes, b"default avatar bytes");

    // removal clears the reference and the file
    let (status, _) = send_empty(&app, "DELETE", "/api/users/avatar", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!tokio::fs::try_exists(avatars_dir.join(&replacement)).await.unwrap());

    let (status, body) = send_empty(&app, "GET", "/api/users/profile", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["avatar"].is_null());
}

#[tokio::test]
async fn test_deleting_a_user_removes_their_content() {
    let (app, root) = spawn_app().await;
    let posts_dir = root.join("posts");

    register(&app, "mallory", "mallory@example.com", "password1").await;
    let mallory = login(&app, "mallory", "password1").await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/posts",
        Some(&mallory),
        &[("title", "Spam"), ("content", "spam spam")],
        Some(("image", "spam.jpg", "image/jpeg", b"spam image")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let post_id = body["data"]["id"].as_i64().unwrap();
    let image = body["data"]["image"].as_str().unwrap().to_string();

    let owner = login(&app, OWNER_USERNAME, OWNER_PASSWORD).await;
    let (_, body) = send_empty(&app, "GET", "/api/users", Some(&owner)).await;
    let mallory_id = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "mallory")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, _) = send_empty(
        &app,
        "DELETE",
        &format!("/api/users/{mallory_id}"),
        Some(&owner),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // posts cascade away and their image files are cleaned up
    let (status, _) = send_empty(&app, "GET", &format!("/api/posts/{post_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!tokio::fs::try_exists(posts_dir.join(&image)).await.unwrap());
}
