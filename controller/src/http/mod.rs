//! HTTP Control Surface router assembly. The catch-panic layer reproduces
//! the original's `handlers.RecoveryHandler` wrapper (`router.go`), since
//! axum itself does not recover from panics inside handlers.

mod handlers;

use axum::Router;
use axum::routing::{get, put};
use tower_http::catch_panic::CatchPanicLayer;

use crate::client::KubeClient;

#[derive(Clone)]
pub struct AppState {
    pub client: KubeClient,
}

pub fn router(client: KubeClient) -> Router {
    Router::new()
        .route(
            "/api/v1/namespaces/deployments",
            get(handlers::list_all),
        )
        .route(
            "/api/v1/namespaces/{ns}/deployments",
            get(handlers::list_namespace),
        )
        .route(
            "/api/v1/namespaces/{ns}/deployments/{name}",
            get(handlers::get_deployment),
        )
        .route(
            "/api/v1/namespaces/{ns}/deployments/{name}/diff",
            get(handlers::diff_deployment),
        )
        .route(
            "/api/v1/namespaces/{ns}/deployments/{name}/replicas/{n}",
            put(handlers::scale_unreconciled),
        )
        .route(
            "/api/v1/namespaces/{ns}/deployments/{name}/replicas/{n}/reconcile",
            put(handlers::scale_reconciled),
        )
        .layer(CatchPanicLayer::new())
        .with_state(AppState { client })
}
