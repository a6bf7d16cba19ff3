use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use jobtrack_api::mail::MemoryMailer;
use jobtrack_server::config::{Config, IN_MEMORY};
use jobtrack_server::{build_router, build_state};

const BOUNDARY: &str = "jobtrack-test-boundary";

struct App {
    router: Router,
    mailer: Arc<MemoryMailer>,
    _media: TempDir,
}

async fn app() -> App {
    let media = TempDir::new().expect("temp media dir");
    let config = Config {
        jwt_secret: "http-test-secret".into(),
        db_path: IN_MEMORY.into(),
        host: "127.0.0.1".into(),
        port: 0,
        media_dir: media.path().to_path_buf(),
        public_url: "http://jobtrack.test".into(),
        max_upload_bytes: 1024 * 1024,
    };
    let mailer = Arc::new(MemoryMailer::new());
    let state = build_state(&config, mailer.clone()).await.expect("state builds");
    App {
        router: build_router(state, config.max_upload_bytes),
        mailer,
        _media: media,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                let text = format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                );
                body.extend_from_slice(text.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).expect("request builds")
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request builds")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

async fn send(app: &App, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn login(login: &str, password: &str) -> Request<Body> {
    json_request("POST", "/auth/login", None, json!({ "login": login, "password": password }))
}

/// Register, activate through the mailed link, log in. Returns the session token.
async fn signed_up(app: &App, username: &str) -> String {
    let email = format!("{username}@example.com");
    let (status, body) = send(
        app,
        multipart(
            "/auth/register",
            None,
            &[
                Part::Text("username", username),
                Part::Text("email", &email),
                Part::Text("password1", "correct-horse"),
                Part::Text("password2", "correct-horse"),
                Part::Text("first_name", "ola"),
                Part::Text("last_name", "nowak"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["is_active"], json!(false));

    let (status, _) = send(app, login(username, "correct-horse")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mail = app.mailer.last_to(&email).expect("activation mail sent");
    let link = mail
        .body
        .split_whitespace()
        .find(|word| word.starts_with("http://jobtrack.test/auth/activate/"))
        .expect("activation link in body");
    let path = link.trim_start_matches("http://jobtrack.test");

    let (status, body) = send(app, get(path, None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["activated"], json!(true));

    let (status, body) = send(app, login(username, "correct-horse")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let response = app
        .router
        .clone()
        .oneshot(get("/health", None))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn protected_routes_need_a_session_token() {
    let app = app().await;
    let (status, body) = send(&app, get("/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, get("/applications", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn account_must_be_activated_before_login() {
    let app = app().await;
    let token = signed_up(&app, "ola").await;

    let (status, body) = send(&app, get("/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account"]["first_name"], json!("Ola"));
    assert!(body["account"].get("password").is_none());
}

#[tokio::test]
async fn activation_link_cannot_be_forged() {
    let app = app().await;
    let (status, body) = send(&app, get("/auth/activate/garbage", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Activation link is invalid or has expired."));
}

#[tokio::test]
async fn duplicate_registration_is_a_field_error() {
    let app = app().await;
    signed_up(&app, "ola").await;

    let (status, body) = send(
        &app,
        multipart(
            "/auth/register",
            None,
            &[
                Part::Text("username", "OLA"),
                Part::Text("email", "someone@example.com"),
                Part::Text("password1", "correct-horse"),
                Part::Text("password2", "correct-horse"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["username"].is_array());
}

#[tokio::test]
async fn intake_through_the_form_endpoint() {
    let app = app().await;
    let token = signed_up(&app, "jan").await;

    let (status, body) = send(&app, get("/applications/form", Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["resume_choices"][0]["value"], json!("upload_new"));

    let (status, body) = send(
        &app,
        multipart(
            "/applications",
            Some(&token),
            &[
                Part::Text("job_name", "Rust Developer"),
                Part::Text("company", "Acme"),
                Part::Text("apply_date", "2025-05-02"),
                Part::Text("valid_to", "2099-06-01"),
                Part::Text("resume", "upload_new"),
                Part::File("new_resume", "cv.pdf", b"%PDF-1.4"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["application"]["status"], json!("applied"));
    assert_eq!(body["detail"]["resumes"].as_array().map(Vec::len), Some(1));
    let application_id = body["application"]["id"].as_i64().expect("id");

    let (status, body) = send(&app, get("/applications", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));

    let (status, body) = send(
        &app,
        multipart(
            "/applications",
            Some(&token),
            &[Part::Text("job_name", ""), Part::Text("company", "Acme")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["job_name"].is_array());
    assert!(body["errors"]["apply_date"].is_array());

    // Someone else cannot see it.
    let other = signed_up(&app, "marta").await;
    let uri = format!("/applications/{application_id}");
    let (status, _) = send(&app, get(&uri, Some(&other))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_rows_are_flat() {
    let app = app().await;
    let token = signed_up(&app, "ewa").await;

    let (status, resume) = send(
        &app,
        multipart(
            "/resumes",
            Some(&token),
            &[Part::Text("job_title", "Tester"), Part::File("file", "cv.pdf", b"%PDF")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{resume}");

    let (status, posting) = send(
        &app,
        json_request(
            "POST",
            "/postings",
            Some(&token),
            json!({
                "company_name": "Acme",
                "job_position": "QA",
                "work_mode": "remote",
                "work_location": "Wrocław",
                "termination_date": "2099-01-01",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{posting}");

    let apply_uri = format!("/postings/{}/apply", posting["id"]);
    let apply = json!({ "resume_id": resume["id"] });
    let (status, body) =
        send(&app, json_request("POST", &apply_uri, Some(&token), apply.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let (status, _) = send(&app, json_request("POST", &apply_uri, Some(&token), apply)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = send(&app, get("/report/applications", Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "{report}");
    let rows = report["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    let row = rows[0].as_object().expect("row object");
    assert!(row.values().all(|v| !v.is_object() && !v.is_array()));
    assert!(row.keys().all(|k| !k.contains("password")));
    assert_eq!(row["job_posting.company_name"], json!("Acme"));
    assert_eq!(row["application.resume.job_title"], json!("Tester"));
}

#[tokio::test]
async fn profile_update_keeps_omitted_fields() {
    let app = app().await;
    let token = signed_up(&app, "kasia").await;

    let update = json!({ "phone_number": "+48 600 100 200", "country": "Poland" });
    let (status, body) = send(&app, json_request("PUT", "/profile", Some(&token), update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["profile"]["phone_display"], json!("+48 600 100 200"));

    let update = json!({ "city": "Poznań" });
    let (status, body) = send(&app, json_request("PUT", "/profile", Some(&token), update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account"]["first_name"], json!("Ola"));
    assert_eq!(body["profile"]["phone_number"], json!("+48600100200"));
    assert_eq!(body["profile"]["country"], json!("Poland"));
    assert_eq!(body["profile"]["city"], json!("Poznań"));

    let update = json!({ "phone_number": "" });
    let (status, body) = send(&app, json_request("PUT", "/profile", Some(&token), update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["profile"]["phone_number"], Value::Null);
}
