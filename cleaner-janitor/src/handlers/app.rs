use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use cleaner_common::metrics;

use crate::cleanup::Cleaner;

use super::auth::{require_admin, AdminToken};
use super::{commands, queries};

pub fn app(
    cleaner: Cleaner,
    admin_token: AdminToken,
    recorder_handle: Option<PrometheusHandle>,
) -> Router {
    let operator = Router::new()
        .route("/commands/clean_all", post(commands::clean_all))
        .route("/commands/clean_selected", post(commands::clean_selected))
        .route("/commands/clean_failed", post(commands::clean_failed))
        .route("/commands/clear_logs", post(commands::clear_logs))
        .route("/stats/pending_count", get(queries::pending_count))
        .route("/stats/completed_by_hook", get(queries::completed_by_hook))
        .route("/stats/failed_by_hook", get(queries::failed_by_hook))
        .route("/audit", get(queries::recent_audit))
        .route_layer(middleware::from_fn_with_state(admin_token, require_admin))
        .with_state(cleaner);

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index))
        .merge(operator);

    match recorder_handle {
        Some(recorder_handle) => metrics::setup_metrics_routes(router, recorder_handle),
        None => router,
    }
}

pub async fn index() -> &'static str {
    "task cleaner janitor"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use chrono::{TimeZone, Utc};
    use cleaner_common::job::JobStatus;
    use cleaner_common::memory::MemoryStore;
    use http_body_util::BodyExt; // for `collect`
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    const TOKEN: &str = "operator-token";

    async fn setup() -> (Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::new());
        let cleaner = Cleaner::new(store.clone(), store.clone());
        cleaner.initialize().await.expect("failed to initialize cleaner");

        let scheduled = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for _ in 0..3 {
            let id = store.insert_job("sync_orders", JobStatus::Complete, scheduled);
            store.insert_log(id, "action complete");
        }
        store.insert_job("sync_orders", JobStatus::Pending, scheduled);
        store.insert_job("send_mail", JobStatus::Failed, scheduled);

        (store, app(cleaner, AdminToken::new(TOKEN), None))
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));

        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn index() {
        let (_store, app) = setup().await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"task cleaner janitor");
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_any_delete() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/commands/clean_all")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.jobs().len(), 5);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected_before_body_is_parsed() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/commands/clean_selected")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.jobs().len(), 5);
    }

    #[tokio::test]
    async fn clean_all() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(request(Method::POST, "/commands/clean_all", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "message": "All completed and failed tasks have been cleaned.",
                "affected": 4,
            })
        );
        assert_eq!(store.jobs().len(), 1);
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn clean_selected() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(request(
                Method::POST,
                "/commands/clean_selected",
                Some(json!({"hooks": ["sync_orders", "sync_%"]})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["affected"], 3);
        assert_eq!(store.jobs().len(), 2);
    }

    #[tokio::test]
    async fn clean_selected_without_hooks_is_bad_request() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(request(
                Method::POST,
                "/commands/clean_selected",
                Some(json!({"hooks": [" ", ""]})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid input"));
        assert_eq!(store.jobs().len(), 5);
    }

    #[tokio::test]
    async fn clean_selected_with_malformed_body_is_json_bad_request() {
        let (store, app) = setup().await;

        let response = app
            .oneshot(request(
                Method::POST,
                "/commands/clean_selected",
                Some(json!({"hooks": 5})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid input"));
        assert_eq!(store.jobs().len(), 5);
    }

    #[tokio::test]
    async fn audit_with_malformed_limit_is_json_bad_request() {
        let (_store, app) = setup().await;

        let response = app
            .oneshot(request(Method::GET, "/audit?limit=abc", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid input"));
    }

    #[tokio::test]
    async fn clean_failed_then_audit() {
        let (_store, app) = setup().await;

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/commands/clean_failed", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["affected"], 1);

        let response = app
            .oneshot(request(Method::GET, "/audit?limit=10", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let records = json_body(response).await;
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["operation"], "Clean Failed");
        assert_eq!(records[0]["details"], "Cleaned 1 failed tasks");
    }

    #[tokio::test]
    async fn clear_logs() {
        let (_store, app) = setup().await;

        app.clone()
            .oneshot(request(Method::POST, "/commands/clean_all", None))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/commands/clear_logs", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/audit", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn stats() {
        let (_store, app) = setup().await;

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/stats/pending_count", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!({"count": 1}));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/stats/completed_by_hook", None))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!([{
                "hook": "sync_orders",
                "count": 3,
                "next_pending": "2024-03-01T12:00:00Z",
            }])
        );

        let response = app
            .oneshot(request(Method::GET, "/stats/failed_by_hook", None))
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!([{"hook": "send_mail", "count": 1, "next_pending": null}])
        );
    }

    #[tokio::test]
    async fn store_outage_is_service_unavailable() {
        let (store, app) = setup().await;
        store.set_available(false);

        let response = app
            .oneshot(request(Method::POST, "/commands/clean_failed", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(response).await.get("affected").is_none());
    }
}
