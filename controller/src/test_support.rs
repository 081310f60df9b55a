//! Fake API server for tests (spec.md's test tooling: exercise the state
//! store, scale executor, drift evaluator, and HTTP handlers without a live
//! cluster). An in-memory [`FakeCluster`] backs a `tower::service_fn`
//! transport handed to `kube::Client::new`, grounded on the mocked-transport
//! pattern used in the pack's kube-rs operator tests.

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::client::Body;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::client::KubeClient;

type Key = (String, String);

#[derive(Clone, Default)]
pub struct FakeCluster {
    configmaps: Arc<Mutex<HashMap<Key, ConfigMap>>>,
    deployments: Arc<Mutex<HashMap<Key, Deployment>>>,
    failing_deployments: Arc<Mutex<HashSet<Key>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configmap(self, namespace: &str, name: &str, cm: ConfigMap) -> Self {
        self.configmaps
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), cm);
        self
    }

    pub fn with_deployment(self, namespace: &str, name: &str, deployment: Deployment) -> Self {
        self.deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), deployment);
        self
    }

    /// Makes every request touching this deployment fail as a transport
    /// error (a non-404 API error), distinct from simply never storing it.
    pub fn with_failing_deployment(self, namespace: &str, name: &str) -> Self {
        self.failing_deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()));
        self
    }

    pub fn configmap(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.configmaps
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn client(&self) -> Client {
        let cluster = self.clone();
        let service = tower::service_fn(move |req: Request<Body>| {
            let cluster = cluster.clone();
            async move { Ok::<_, Infallible>(cluster.handle(req).await) }
        });
        Client::new(service, "default")
    }

    pub fn kube_client(&self) -> KubeClient {
        KubeClient::new(self.client(), "default".to_string())
    }

    async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let body = req
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_else(|_| Bytes::new());
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["api", "v1", "namespaces", ns, "configmaps", name] => {
                self.handle_configmap(&method, ns, name, &body)
            }
            ["api", "v1", "namespaces", ns, "configmaps"] if method == Method::POST => {
                self.create_configmap(ns, &body)
            }
            ["apis", "apps", "v1", "namespaces", ns, "deployments", name] => {
                self.handle_deployment(&method, ns, name, &body)
            }
            ["apis", "apps", "v1", "namespaces", ns, "deployments"] if method == Method::GET => {
                self.list_deployments(Some(ns))
            }
            ["apis", "apps", "v1", "deployments"] if method == Method::GET => {
                self.list_deployments(None)
            }
            _ => status_response(
                StatusCode::NOT_FOUND,
                &format!("no fake route for {method} {path}"),
            ),
        }
    }

    fn handle_configmap(&self, method: &Method, ns: &str, name: &str, body: &Bytes) -> Response<Body> {
        let key = (ns.to_string(), name.to_string());
        match *method {
            Method::GET => match self.configmaps.lock().unwrap().get(&key) {
                Some(cm) => json_response(StatusCode::OK, cm),
                None => status_response(StatusCode::NOT_FOUND, &format!("configmap {name} not found")),
            },
            Method::PUT => {
                let cm: ConfigMap =
                    serde_json::from_slice(body).expect("fake cluster received invalid configmap json");
                self.configmaps.lock().unwrap().insert(key, cm.clone());
                json_response(StatusCode::OK, &cm)
            }
            _ => status_response(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"),
        }
    }

    fn create_configmap(&self, ns: &str, body: &Bytes) -> Response<Body> {
        let cm: ConfigMap =
            serde_json::from_slice(body).expect("fake cluster received invalid configmap json");
        let name = cm.metadata.name.clone().unwrap_or_default();
        self.configmaps
            .lock()
            .unwrap()
            .insert((ns.to_string(), name), cm.clone());
        json_response(StatusCode::CREATED, &cm)
    }

    fn handle_deployment(&self, method: &Method, ns: &str, name: &str, body: &Bytes) -> Response<Body> {
        let key = (ns.to_string(), name.to_string());
        if self.failing_deployments.lock().unwrap().contains(&key) {
            return status_response(StatusCode::INTERNAL_SERVER_ERROR, "simulated transport failure");
        }
        match *method {
            Method::GET => match self.deployments.lock().unwrap().get(&key) {
                Some(d) => json_response(StatusCode::OK, d),
                None => status_response(StatusCode::NOT_FOUND, &format!("deployment {name} not found")),
            },
            Method::PATCH => {
                let mut deployments = self.deployments.lock().unwrap();
                let Some(d) = deployments.get_mut(&key) else {
                    drop(deployments);
                    return status_response(
                        StatusCode::NOT_FOUND,
                        &format!("deployment {name} not found"),
                    );
                };
                let patch: serde_json::Value =
                    serde_json::from_slice(body).expect("fake cluster received invalid merge patch");
                if let Some(replicas) = patch.pointer("/spec/replicas").and_then(|v| v.as_i64()) {
                    d.spec
                        .get_or_insert_with(DeploymentSpec::default)
                        .replicas = Some(replicas as i32);
                }
                let updated = d.clone();
                drop(deployments);
                json_response(StatusCode::OK, &updated)
            }
            _ => status_response(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"),
        }
    }

    fn list_deployments(&self, ns: Option<&str>) -> Response<Body> {
        let deployments = self.deployments.lock().unwrap();
        let items: Vec<&Deployment> = deployments
            .iter()
            .filter(|((dns, _), _)| ns.is_none_or(|n| n == dns))
            .map(|(_, d)| d)
            .collect();
        json_response(
            StatusCode::OK,
            &serde_json::json!({ "metadata": {}, "items": items }),
        )
    }
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(value).expect("fake cluster response is serializable");
    Response::builder()
        .status(status)
        .body(Body::from(bytes))
        .expect("fake cluster response is well-formed")
}

/// A Kubernetes `Status` error body, the shape `kube::Error::Api` parses its
/// `code`/`reason` from.
fn status_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(
        status,
        &serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": message,
            "reason": if status == StatusCode::NOT_FOUND { "NotFound" } else { "" },
            "code": status.as_u16(),
        }),
    )
}

/// Builds a minimal `Deployment` for tests: `spec.replicas` and
/// `status.readyReplicas` are the only fields the drift evaluator and HTTP
/// surface read.
pub fn deployment(
    namespace: &str,
    name: &str,
    spec_replicas: Option<i32>,
    ready_replicas: Option<i32>,
) -> Deployment {
    use k8s_openapi::api::apps::v1::DeploymentStatus;

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: spec_replicas,
            ..Default::default()
        }),
        status: ready_replicas.map(|r| DeploymentStatus {
            ready_replicas: Some(r),
            ..Default::default()
        }),
    }
}
