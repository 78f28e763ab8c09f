mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::TestServer;
use stage_router::config::ListenerConfig;
use stage_router::dispatch::Dispatcher;
use stage_router::http::response::{JsonResponse, PlaintextResponse};
use stage_router::http::{listen, HttpServer, RequestId, ServerError};
use stage_router::pipeline::{builtin, stage_fn, MethodMux, Step};
use stage_router::routing::PipelineRegistry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;

fn registry() -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    registry
        .register("^/$", "index", vec![builtin::respond(StatusCode::OK, "index")])
        .unwrap();
    registry
        .register(
            "^/echo$",
            "echo",
            vec![MethodMux::new()
                .post(stage_fn(|req| {
                    Box::pin(async move {
                        let value: serde_json::Value = req.json().await?;
                        Step::respond(JsonResponse::ok(value))
                    })
                }))
                .into_stage()],
        )
        .unwrap();
    registry
        .register(
            "^/old$",
            "old",
            vec![builtin::redirect("/", StatusCode::MOVED_PERMANENTLY)],
        )
        .unwrap();
    registry
        .register(
            "^/whoami$",
            "whoami",
            vec![stage_fn(|req| {
                Box::pin(async move {
                    if req.session().key().is_err() {
                        req.session().set("visits", 1)?;
                        return Step::respond(PlaintextResponse::ok("new"));
                    }
                    let visits: i64 = req.session().get("visits").await?.unwrap_or(0);
                    req.session().set("visits", visits + 1)?;
                    Step::respond(PlaintextResponse::ok(format!("visit {}", visits + 1)))
                })
            })],
        )
        .unwrap();
    registry
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn serves_pipelines_over_http() {
    let server = TestServer::start(Dispatcher::builder(registry()).build().unwrap()).await;
    let client = client();

    let resp = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let id = resp.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(id.len(), 24);
    assert!(id.parse::<RequestId>().is_ok());
    assert_eq!(resp.text().await.unwrap(), "index");

    let resp = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "404");

    let resp = client.get(server.url("/old")).send().await.unwrap();
    assert_eq!(resp.status(), 301);
    assert_eq!(resp.headers()["location"], "/");

    server.stop().await;
}

#[tokio::test]
async fn method_mux_and_json_body() {
    let server = TestServer::start(Dispatcher::builder(registry()).build().unwrap()).await;
    let client = client();

    let resp = client
        .post(server.url("/echo"))
        .json(&serde_json::json!({"name": "leeroy"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "leeroy");

    let resp = client.get(server.url("/echo")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.text().await.unwrap(), "unsupported http method");

    let resp = client
        .post(server.url("/echo"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server.stop().await;
}

#[tokio::test]
async fn session_cookie_round_trips() {
    let server = TestServer::start(Dispatcher::builder(registry()).build().unwrap()).await;
    let client = client();

    let resp = client.get(server.url("/whoami")).send().await.unwrap();
    let cookie = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("_din_session="));
    assert_eq!(resp.text().await.unwrap(), "new");

    let pair = cookie.split(';').next().unwrap().to_string();
    for expected in ["visit 2", "visit 3"] {
        let resp = client
            .get(server.url("/whoami"))
            .header("cookie", &pair)
            .send()
            .await
            .unwrap();
        assert!(resp.headers().get("set-cookie").is_none());
        assert_eq!(resp.text().await.unwrap(), expected);
    }

    server.stop().await;
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let dispatcher = Arc::new(Dispatcher::builder(registry()).build().unwrap());
    let config = ListenerConfig {
        max_body_bytes: 16,
        ..Default::default()
    };
    let router = HttpServer::new(dispatcher, &config).router();

    let req = axum::http::Request::post("/echo")
        .header("content-type", "application/json")
        .header("content-length", "64")
        .body(Body::from(format!("{{\"pad\":\"{}\"}}", "x".repeat(54))))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn listen_reports_an_address_in_use() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = taken.local_addr().unwrap().to_string();
    let dispatcher = Arc::new(Dispatcher::builder(registry()).build().unwrap());
    let (_tx, rx) = broadcast::channel(1);

    let err = listen(&address, dispatcher, &ListenerConfig::default(), rx)
        .await
        .unwrap_err();
    match err {
        ServerError::Bind { address: reported, .. } => assert_eq!(reported, address),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn listen_returns_after_shutdown() {
    let dispatcher = Arc::new(Dispatcher::builder(registry()).build().unwrap());
    let (tx, rx) = broadcast::channel(1);
    tx.send(()).unwrap();

    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        listen("127.0.0.1:0", dispatcher, &ListenerConfig::default(), rx),
    )
    .await
    .unwrap()
    .unwrap();
}
