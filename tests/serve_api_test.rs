//! REST surface tests over real HTTP

use std::time::Duration;

use axum::routing::get;
use axum::Router;

use surge_config::{AuthConfig, HttpConfig, LoadConfig, ServerConfig, SurgeConfig};
use surge_core::RunGrant;
use surge_server::AppContext;

async fn spawn_target() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", get(|| async { "ok" }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

async fn spawn_surge() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let config = SurgeConfig {
        http: HttpConfig {
            timeout: Duration::from_secs(2),
            ..HttpConfig::default()
        },
        load: LoadConfig {
            launch_jitter: Duration::ZERO,
            ..LoadConfig::default()
        },
        auth: AuthConfig {
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            token_ttl: Duration::from_secs(600),
            issuer: "surge-control".to_string(),
        },
        server: Some(ServerConfig {
            public_url: base.clone(),
            allow_loopback_targets: true,
            ..ServerConfig::default()
        }),
        ..SurgeConfig::default()
    };

    let context = AppContext::from_config(&config).unwrap();
    tokio::spawn(async move {
        surge_server::serve_with_listener(listener, context).await.unwrap();
    });
    base
}

#[tokio::test]
async fn test_health_endpoint() {
    let base = spawn_surge().await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_grant_carries_endpoints_and_ceilings() {
    let base = spawn_surge().await;
    let target = spawn_target().await;

    let grant: RunGrant = reqwest::Client::new()
        .post(format!("{}/api/v1/runs", base))
        .json(&serde_json::json!({
            "url": target,
            "total_request_budget": 500,
            "target_concurrency": 20,
            "tenant_tier": "pro"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(grant.resolved_target_url, target);
    assert_eq!(grant.execution_endpoint, format!("{}/api/v1/batch", base));
    assert_eq!(grant.cancel_endpoint, format!("{}/api/v1/cancel", base));
    assert_eq!(grant.count_per_batch, 50);
    // 500 / 50 batches plus one slack call per ladder rung
    // (target 20 -> ladder [10, 20])
    assert_eq!(grant.max_batches, 12);
    assert!(grant.dispatch_concurrency >= 1);
}

#[tokio::test]
async fn test_run_start_rejections_carry_reason_codes() {
    let base = spawn_surge().await;
    let client = reqwest::Client::new();

    // Free tier cannot request 5000 concurrency.
    let response = client
        .post(format!("{}/api/v1/runs", base))
        .json(&serde_json::json!({
            "url": "https://example.com/",
            "total_request_budget": 100,
            "target_concurrency": 5_000,
            "tenant_tier": "free"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "concurrency_exceeds_tier");

    // ftp targets are not load targets.
    let response = client
        .post(format!("{}/api/v1/runs", base))
        .json(&serde_json::json!({
            "url": "ftp://example.com/",
            "total_request_budget": 100,
            "target_concurrency": 10,
            "tenant_tier": "free"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_batch_rejects_garbage_token() {
    let base = spawn_surge().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/batch", base))
        .bearer_auth("not-a-token")
        .json(&serde_json::json!({ "url": "http://x/", "count": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_missing_report_is_404() {
    let base = spawn_surge().await;
    let response = reqwest::get(format!("{}/api/v1/runs/nope/report", base))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
