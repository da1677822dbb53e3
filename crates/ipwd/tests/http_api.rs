//! HTTP contract tests for the webhook router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ipw_core::engine::fakes::{MemoryConnector, MemoryImageEngine, UnreachableConnector};
use ipw_core::{
    EngineConnector, ImageReview, PolicyConfig, ReplicationSettings, StageFlags, WebhookConfig,
};
use ipwd::{create_router, AppState};
use tower::ServiceExt;

fn policy() -> PolicyConfig {
    PolicyConfig::from_lists("harbor.it.org", "kube-system")
}

fn validate_only_app() -> Router {
    create_router(AppState::new(
        WebhookConfig::validate_only(policy()),
        Arc::new(UnreachableConnector),
    ))
}

fn replicating_app(connector: Arc<dyn EngineConnector>) -> Router {
    let target = ReplicationSettings {
        host: Some("registry.internal".into()),
        namespace: Some("mirror".into()),
        username: Some("robot".into()),
        password: Some("pw".into()),
        engine_endpoint: None,
        timeout_secs: Some(10),
    }
    .resolve()
    .unwrap();
    let config = WebhookConfig {
        policy: Arc::new(policy()),
        replication: Some(Arc::new(target)),
        stages: StageFlags {
            replicate: true,
            scan: true,
        },
    };
    create_router(AppState::new(config, connector))
}

fn post_ipw(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ipw")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn review_body(namespace: &str, images: &[&str]) -> String {
    serde_json::to_string(&ImageReview::new(namespace, images.iter().copied())).unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_allowed_review_returns_200_with_review() {
    let resp = validate_only_app()
        .oneshot(post_ipw(review_body("default", &["harbor.it.org/proj/img:1.0"])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let review: ImageReview = serde_json::from_str(&body_text(resp).await).unwrap();
    assert!(review.status.allowed);
    assert_eq!(review.namespace(), "default");
}

#[tokio::test]
async fn test_denied_review_returns_400_with_review() {
    let resp = validate_only_app()
        .oneshot(post_ipw(review_body("default", &["harbor.it.org/proj/img:latest"])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let review: ImageReview = serde_json::from_str(&body_text(resp).await).unwrap();
    assert!(!review.status.allowed);
}

#[tokio::test]
async fn test_excluded_namespace_is_allowed() {
    let resp = validate_only_app()
        .oneshot(post_ipw(review_body("kube-system", &["malformed"])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_kubernetes_payload_is_accepted() {
    let payload = serde_json::json!({
        "apiVersion": "imagepolicy.k8s.io/v1alpha1",
        "kind": "ImageReview",
        "spec": {
            "containers": [{ "image": "harbor.it.org/team/api:2.3.1" }],
            "annotations": { "mycluster.image-policy.k8s.io/ticket-1234": "break-glass" },
            "namespace": "payments"
        }
    });
    let resp = validate_only_app()
        .oneshot(post_ipw(payload.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_json_returns_bad_request() {
    let resp = validate_only_app()
        .oneshot(post_ipw("{not json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, "Bad Request");
}

#[tokio::test]
async fn test_wrong_method_returns_404() {
    let resp = validate_only_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ipw")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(resp).await, "Method is not supported.");
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let resp = validate_only_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(resp).await, "404 not found.");
}

#[tokio::test]
async fn test_healthz_returns_ok() {
    let resp = validate_only_app()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn test_unreachable_engine_returns_500() {
    let resp = replicating_app(Arc::new(UnreachableConnector))
        .oneshot(post_ipw(review_body("default", &["docker.io/proj/img:1.0"])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Internal Server Error");
}

#[tokio::test]
async fn test_replicated_review_carries_report() {
    let engine = Arc::new(MemoryImageEngine::new().fail_pull("docker.io/proj/b:1.0"));
    let resp = replicating_app(Arc::new(MemoryConnector::new(engine.clone())))
        .oneshot(post_ipw(review_body(
            "default",
            &["docker.io/proj/a:1.0", "docker.io/proj/b:1.0"],
        )))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let review: ImageReview = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(
        review.status.reason,
        "error:replication:pull:1,push:1;failed:pull:1,tag:0,push:0,remove:0"
    );
    assert_eq!(review.status.audit_annotations["replication.ipw/push-ok"], "1");
    assert_eq!(engine.pushes(), vec!["registry.internal/mirror/a:1.0"]);
}

#[tokio::test]
async fn test_allowed_review_never_touches_engine() {
    let resp = replicating_app(Arc::new(UnreachableConnector))
        .oneshot(post_ipw(review_body("default", &["harbor.it.org/proj/img:1.0"])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
