#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `app.oneshot()`

use studyvault::{app, config::Config, db, services::auth_service, AppState};

pub const ADMIN_EMAIL: &str = "admin@slrtce.in";
pub const ADMIN_PASSWORD: &str = "admin-pass";
const BOUNDARY: &str = "studyvault-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn spawn() -> TestApp {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let config = Config {
        bcrypt_cost: 4,
        ..Config::default()
    };
    let state = AppState::new(pool, config);
    TestApp {
        router: app(state.clone()),
        state,
    }
}

pub fn upload_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn call(
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
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), None).await
    }

    /// Signs up a student and returns `(token, user id)`.
    pub async fn student(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({
                    "role": "student",
                    "username": username,
                    "email": format!("{username}@slrtce.in"),
                    "password": "secret1",
                    "confirm_password": "secret1",
                    "branch": "Computer Science",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["uid"].as_str().unwrap().to_string(),
        )
    }

    pub async fn admin(&self) -> String {
        auth_service::seed_admin(&self.state.pool, ADMIN_EMAIL, ADMIN_PASSWORD, 4)
            .await
            .unwrap();
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn upload_fields(&self, token: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/notes")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(upload_body(fields, Some(("notes.pdf", b"%PDF-1.4")))))
            .unwrap();
        self.send(req).await
    }

    /// Uploads a semester 6 Computer Science note and returns its id.
    pub async fn upload(&self, token: &str, title: &str, subject: &str) -> String {
        let (status, body) = self
            .upload_fields(
                token,
                &[
                    ("title", title),
                    ("resource_type", "notes"),
                    ("branch", "Computer Science"),
                    ("semester", "6"),
                    ("subject", subject),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn points(&self, token: &str) -> i64 {
        let (_, me) = self.get("/auth/me", token).await;
        me["points"].as_i64().unwrap()
    }
}
