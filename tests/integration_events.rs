mod common;

use std::time::Duration;

use axum::{
    body::{Body, BodyDataStream},
    http::{header, Method, Request, StatusCode},
};
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt; // for `app.oneshot()`

async fn subscribe(app: &common::TestApp, token: &str, query: &str) -> BodyDataStream {
    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("/events{query}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    response.into_body().into_data_stream()
}

/// Reads SSE frames until one with the wanted event type arrives and returns
/// every `data:` payload seen so far.
async fn read_until(stream: &mut BodyDataStream, event_type: &str) -> Vec<Value> {
    let needle = format!("\"type\":\"{event_type}\"");
    let mut raw = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !raw.contains(&needle) {
            match stream.next().await {
                Some(Ok(chunk)) => raw.push_str(&String::from_utf8_lossy(&chunk)),
                _ => break,
            }
        }
    })
    .await
    .expect("event did not arrive in time");

    raw.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn events_require_a_session() {
    let app = common::spawn().await;
    let (status, _) = app.call(Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pending_uploads_never_reach_other_students() {
    let app = common::spawn().await;
    let admin = app.admin().await;
    let (reader, _) = app.student("reader").await;
    let (author, _) = app.student("author").await;
    let mut stream = subscribe(&app, &reader, "").await;

    let id = app.upload(&author, "Secret pending draft", "OS").await;
    let (status, _) = app.get(&format!("/notes/{id}"), &reader).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.post(&format!("/admin/notes/{id}/approve"), &admin).await;
    let seen = read_until(&mut stream, "note_updated").await;

    assert!(seen.iter().all(|ev| ev["type"] != "note_created"), "{seen:?}");
    let update = seen.last().unwrap();
    assert_eq!(update["note_id"], id.as_str());
    assert_eq!(update["status"], "approved");
}

#[tokio::test]
async fn uploader_and_admin_see_their_pending_note() {
    let app = common::spawn().await;
    let admin = app.admin().await;
    let (author, _) = app.student("author").await;
    let mut own = subscribe(&app, &author, "").await;
    let mut staff = subscribe(&app, &admin, "").await;

    let id = app.upload(&author, "Draft", "OS").await;

    for stream in [&mut own, &mut staff] {
        let seen = read_until(stream, "note_created").await;
        let created = seen.last().unwrap();
        assert_eq!(created["note_id"], id.as_str());
        assert_eq!(created["title"], "Draft");
        assert_eq!(created["status"], "pending");
    }
}

#[tokio::test]
async fn note_id_narrows_the_stream() {
    let app = common::spawn().await;
    let admin = app.admin().await;
    let (reader, _) = app.student("reader").await;
    let watched = app.upload(&admin, "Watched", "OS").await;
    let other = app.upload(&admin, "Other", "OS").await;
    let mut stream = subscribe(&app, &reader, &format!("?note_id={watched}")).await;

    app.post(&format!("/notes/{other}/like"), &reader).await;
    app.post(&format!("/notes/{watched}/like"), &reader).await;

    let seen = read_until(&mut stream, "note_updated").await;
    assert_eq!(seen.len(), 1, "{seen:?}");
    assert_eq!(seen[0]["note_id"], watched.as_str());
    assert_eq!(seen[0]["upvotes"], 1);
    assert_eq!(seen[0]["downloads"], 0);
    assert_eq!(seen[0]["admin_verified"], false);
}

#[tokio::test]
async fn user_id_narrows_points_updates() {
    let app = common::spawn().await;
    let admin = app.admin().await;
    let (me, my_id) = app.student("me").await;
    let (_, other_id) = app.student("other").await;
    let mut stream = subscribe(&app, &me, &format!("?user_id={my_id}")).await;

    for uid in [&other_id, &my_id] {
        app.call(
            Method::POST,
            &format!("/admin/users/{uid}/points"),
            Some(&admin),
            Some(serde_json::json!({ "amount": 5 })),
        )
        .await;
    }

    let seen = read_until(&mut stream, "points_changed").await;
    assert_eq!(seen.len(), 1, "{seen:?}");
    assert_eq!(seen[0]["user_id"], my_id.as_str());
    assert_eq!(seen[0]["points"], 105);
}
