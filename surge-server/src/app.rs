//! Router setup and server entry point

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{context::AppContext, handlers};

/// Create the complete REST application
pub fn create_app(context: AppContext) -> Router {
    Router::new()
        // Health endpoint (no prefix)
        .route("/health", get(handlers::health_check))
        // API routes
        .nest("/api/v1", create_api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

fn create_api_router() -> Router<AppContext> {
    Router::new()
        .route("/runs", post(handlers::start_run))
        .route("/batch", post(handlers::execute_batch))
        .route("/cancel", post(handlers::cancel_run))
        .route(
            "/runs/{id}/report",
            post(handlers::save_report).get(handlers::get_report),
        )
}

/// Bind and serve until the process is stopped.
pub async fn serve(context: AppContext, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_with_listener(listener, context).await
}

/// Serve on an already-bound listener (standalone and test setups).
pub async fn serve_with_listener(
    listener: tokio::net::TcpListener,
    context: AppContext,
) -> std::io::Result<()> {
    info!("surge server listening on {}", listener.local_addr()?);
    axum::serve(listener, create_app(context)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use surge_config::{AuthConfig, HttpConfig, LoadConfig, ServerConfig, SurgeConfig};
    use surge_core::{RunGrant, StopReason};

    async fn spawn_target() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn test_app() -> Router {
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
                allow_loopback_targets: true,
                ..ServerConfig::default()
            }),
            ..SurgeConfig::default()
        };
        create_app(AppContext::from_config(&config).unwrap())
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_json_bearer(uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn grant_for(app: &Router, url: &str, budget: u64) -> RunGrant {
        let (status, body) = call(
            app,
            post_json(
                "/api/v1/runs",
                json!({
                    "url": url,
                    "total_request_budget": budget,
                    "target_concurrency": 10,
                    "tenant_tier": "pro"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "run start failed: {}", body);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_batch_without_token_is_unauthorized() {
        let app = test_app();
        let (status, body) = call(
            &app,
            post_json("/api/v1/batch", json!({ "url": "http://x/", "count": 5 })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_granted_batch_executes() {
        let app = test_app();
        let target = spawn_target().await;
        let grant = grant_for(&app, &target, 100).await;

        let (status, body) = call(
            &app,
            post_json_bearer(
                "/api/v1/batch",
                &grant.token,
                json!({ "url": grant.resolved_target_url, "count": 10 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "batch failed: {}", body);
        assert_eq!(body["sent"], 10);
        assert_eq!(body["ok"], 10);
        assert_eq!(body["latencies_ms"].as_array().unwrap().len(), 10);
        assert!(body["summary"]["p95"].is_number());
        assert!(!body["regions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_for_wrong_url_is_unauthorized() {
        let app = test_app();
        let target = spawn_target().await;
        let grant = grant_for(&app, &target, 100).await;

        let (status, _) = call(
            &app,
            post_json_bearer(
                "/api/v1/batch",
                &grant.token,
                json!({ "url": "http://evil.example/", "count": 10 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_batch_above_granted_count_is_unauthorized() {
        let app = test_app();
        let target = spawn_target().await;
        let grant = grant_for(&app, &target, 100).await;

        let (status, _) = call(
            &app,
            post_json_bearer(
                "/api/v1/batch",
                &grant.token,
                json!({ "url": grant.resolved_target_url, "count": grant.count_per_batch + 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_returns_429() {
        let app = test_app();
        let target = spawn_target().await;
        // Budget of 1 grants count_per_batch 1 and a small batch ceiling.
        let grant = grant_for(&app, &target, 1).await;

        for _ in 0..grant.max_batches {
            let (status, _) = call(
                &app,
                post_json_bearer(
                    "/api/v1/batch",
                    &grant.token,
                    json!({ "url": grant.resolved_target_url, "count": 1 }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = call(
            &app,
            post_json_bearer(
                "/api/v1/batch",
                &grant.token,
                json!({ "url": grant.resolved_target_url, "count": 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "quota_exhausted");
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_stops_batches() {
        let app = test_app();
        let target = spawn_target().await;
        let grant = grant_for(&app, &target, 100).await;

        for _ in 0..2 {
            let (status, body) = call(
                &app,
                post_json("/api/v1/cancel", json!({ "run_id": grant.run_id })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["cancelled"], true);
        }

        let (status, body) = call(
            &app,
            post_json_bearer(
                "/api/v1/batch",
                &grant.token,
                json!({ "url": grant.resolved_target_url, "count": 10 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancelled"], true);
        assert_eq!(body["sent"], 0);
    }

    #[tokio::test]
    async fn test_high_concurrency_needs_confirmation() {
        let app = test_app();
        let target = spawn_target().await;

        let (status, body) = call(
            &app,
            post_json(
                "/api/v1/runs",
                json!({
                    "url": target,
                    "total_request_budget": 10_000,
                    "target_concurrency": 2_000,
                    "tenant_tier": "pro"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "confirmation_required");
    }

    #[tokio::test]
    async fn test_report_save_and_fetch() {
        let app = test_app();
        let run_id = uuid::Uuid::new_v4().to_string();
        let report = json!({
            "run_id": run_id,
            "target_url": "https://example.com/",
            "steps": [],
            "totals": { "sent": 0, "ok": 0, "errors": 0, "duration_ms": 12 },
            "stop_reason": "abandoned",
            "started_at": "2026-08-05T10:00:00Z",
            "finished_at": "2026-08-05T10:00:01Z"
        });

        let uri = format!("/api/v1/runs/{}/report", run_id);
        let (status, body) = call(&app, post_json(&uri, report)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);

        let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: surge_core::RunReport = serde_json::from_value(body).unwrap();
        assert_eq!(fetched.stop_reason, StopReason::Abandoned);
    }

    #[tokio::test]
    async fn test_report_id_mismatch_rejected() {
        let app = test_app();
        let report = json!({
            "run_id": "other",
            "target_url": "https://example.com/",
            "steps": [],
            "totals": { "sent": 0, "ok": 0, "errors": 0, "duration_ms": 0 },
            "stop_reason": "failed",
            "started_at": "2026-08-05T10:00:00Z",
            "finished_at": "2026-08-05T10:00:01Z"
        });

        let (status, _) = call(&app, post_json("/api/v1/runs/mismatch/report", report)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
