//! Health Surface (§4.F): a separate, unauthenticated plain-HTTP listener
//! whose single `/livez` endpoint forwards the orchestrator's own liveness
//! probe verbatim (`server/health.go`).

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::client::KubeClient;

pub fn router(client: KubeClient) -> Router {
    Router::new()
        .route("/livez", get(livez))
        .with_state(client)
}

async fn livez(
    axum::extract::State(client): axum::extract::State<KubeClient>,
) -> impl IntoResponse {
    match client.livez().await {
        Ok(body) => (StatusCode::OK, Bytes::from(body)).into_response(),
        Err(e) => {
            replicon_common::log::error(format!("livez upstream check failed: {e}"));
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
