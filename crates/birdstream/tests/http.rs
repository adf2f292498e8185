//! REST calls and stream sessions against a local HTTP server.

mod common;

use std::{collections::BTreeMap, convert::Infallible, net::SocketAddr, time::Duration};

use axum::{
    Form, Json, Router,
    body::{Body, Bytes},
    extract::Query,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use birdstream::{
    ClientOptions, Error, Params, RestError, SessionState, StreamCategory, StreamError,
    TransportError, Twitter, params,
};
use futures::StreamExt;
use serde_json::{Value, json};

fn signed(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("OAuth ") && v.contains("oauth_signature="))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, r#"{"error":"not signed"}"#).into_response()
}

/// Two statuses and a keep-alive, cut mid-key and mid-character.
async fn filter(headers: HeaderMap, Query(query): Query<BTreeMap<String, String>>) -> Response {
    if !signed(&headers) || query.get("track").map(String::as_str) != Some("rust") {
        return unauthorized();
    }
    let body = "{\"id\":1,\"text\":\"caf\u{e9}\"}\r\n\r\n{\"id\":2}\r\n".as_bytes();
    let e_acute = body.iter().position(|&b| b == 0xc3).unwrap_or(0) + 1;
    let chunks = vec![
        Bytes::copy_from_slice(&body[..3]),
        Bytes::copy_from_slice(&body[3..e_acute]),
        Bytes::copy_from_slice(&body[e_acute..]),
    ];
    let stream = futures::stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Infallible>(chunk)
    });
    Body::from_stream(stream).into_response()
}

/// Sends one value and then holds the connection open.
async fn firehose() -> Response {
    let stream = futures::stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"{\"id\":1}\r\n")) })
        .chain(futures::stream::pending());
    Body::from_stream(stream).into_response()
}

async fn show_status(headers: HeaderMap) -> Response {
    if !signed(&headers) {
        return unauthorized();
    }
    Json(json!({"id": 7, "text": "hello"})).into_response()
}

async fn echo_form(headers: HeaderMap, Form(form): Form<BTreeMap<String, String>>) -> Response {
    if !signed(&headers) {
        return unauthorized();
    }
    Json(form).into_response()
}

async fn echo_query(Query(query): Query<BTreeMap<String, String>>) -> Json<BTreeMap<String, String>> {
    Json(query)
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/1/statuses/filter.json", get(filter))
        .route("/1/statuses/firehose.json", get(firehose))
        .route("/1/statuses/show/7.json", get(show_status))
        .route("/1/statuses/update.json", post(echo_form))
        .route("/search.json", get(echo_query));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn twitter() -> Twitter {
    common::init_tracing();
    let addr = serve().await;
    let options = ClientOptions {
        rest_base: format!("http://{addr}/1"),
        search_base: format!("http://{addr}"),
        stream_base: format!("http://{addr}/1"),
        ..ClientOptions::default()
    };
    Twitter::new(options).unwrap()
}

#[tokio::test]
async fn stream_over_http() {
    let twitter = twitter().await;
    let session = twitter
        .stream(
            StreamCategory::from_method("statuses/filter"),
            params! { "track" => "rust" },
        )
        .unwrap();
    let handle = session.handle();

    let values: Vec<Value> = session.map(Result::unwrap).collect().await;
    assert_eq!(
        values,
        vec![json!({"id": 1, "text": "caf\u{e9}"}), json!({"id": 2})]
    );
    assert_eq!(handle.state(), SessionState::Closed);
}

#[tokio::test]
async fn stream_rejected_with_status() {
    let twitter = twitter().await;
    let mut session = twitter
        .stream(StreamCategory::from_method("statuses/filter"), Params::new())
        .unwrap();

    match session.next().await {
        Some(Err(StreamError::Transport(TransportError::Status(err)))) => {
            assert_eq!(err.status, 401);
            assert_eq!(err.body, r#"{"error":"not signed"}"#);
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(session.next().await.is_none());
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn close_abandons_open_connection() {
    let twitter = twitter().await;
    let mut session = twitter
        .stream(StreamCategory::from_method("statuses/firehose"), Params::new())
        .unwrap();

    assert_eq!(session.next().await.unwrap().unwrap(), json!({"id": 1}));
    session.close();
    let state = tokio::time::timeout(Duration::from_secs(5), session.handle().closed())
        .await
        .unwrap();
    assert_eq!(state, SessionState::Closed);
    assert!(session.next().await.is_none());
}

#[tokio::test]
async fn catalog_get_fills_path() {
    let twitter = twitter().await;
    let status = twitter
        .call("show_status", params! { "id" => 7 }, Params::new())
        .await
        .unwrap();
    assert_eq!(status["text"], "hello");
}

#[tokio::test]
async fn catalog_post_sends_form_with_defaults() {
    let twitter = twitter().await;
    let echoed = twitter
        .call(
            "update_status",
            params! { "status" => "Hello Ladies + Gentlemen" },
            params! { "lat" => "37.7" },
        )
        .await
        .unwrap();
    assert_eq!(
        echoed,
        json!({"include_entities": "1", "lat": "37.7", "status": "Hello Ladies + Gentlemen"})
    );
}

#[tokio::test]
async fn search_merges_query() {
    let twitter = twitter().await;
    let echoed: BTreeMap<String, String> = twitter
        .search("rust lang", params! { "rpp" => 5, "q" => "ignored" })
        .await
        .unwrap();
    assert_eq!(echoed["q"], "rust lang");
    assert_eq!(echoed["rpp"], "5");
}

#[tokio::test]
async fn http_errors_carry_status_and_body() {
    let twitter = twitter().await;
    let err = twitter
        .get::<Value>("/statuses/missing.json", &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP Error 404: Not Found");
    match err {
        Error::Rest(RestError::Status(status)) => assert_eq!(status.status, 404),
        other => panic!("expected status error, got {other:?}"),
    }
}
