//! Thin wrapper around `kube::Client`, grounded on the teacher's own
//! `Client`-threading pattern in `operator/src/strims/reconcile.rs` (a
//! single cloneable client passed into every subsystem). Centralizes the
//! handful of raw API calls the state store, scale executor, and health
//! surface need.

use bytes::Bytes;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams, PostParams};

use crate::util::Error;

/// Cloneable handle to the cluster, scoped to the namespace the controller
/// itself runs in (used only for the `ConfigMap` state resource; deployment
/// operations are cluster-wide).
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
    namespace: String,
}

impl KubeClient {
    pub fn new(client: kube::Client, namespace: String) -> Self {
        KubeClient { client, namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Escape hatch for subsystems (the reconciliation engine's watcher)
    /// that need the raw `kube::Client` directly.
    pub fn inner(&self) -> kube::Client {
        self.client.clone()
    }

    fn configmaps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn deployments_all(&self) -> Api<Deployment> {
        Api::all(self.client.clone())
    }

    fn deployments_ns(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub async fn get_configmap(&self, name: &str) -> Result<Option<ConfigMap>, Error> {
        match self.configmaps().get(name).await {
            Ok(cm) => Ok(Some(cm)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_configmap(&self, cm: &ConfigMap) -> Result<ConfigMap, Error> {
        Ok(self.configmaps().create(&PostParams::default(), cm).await?)
    }

    pub async fn replace_configmap(&self, name: &str, cm: &ConfigMap) -> Result<ConfigMap, Error> {
        Ok(self
            .configmaps()
            .replace(name, &PostParams::default(), cm)
            .await?)
    }

    pub async fn list_deployments_all(&self) -> Result<Vec<Deployment>, Error> {
        Ok(self
            .deployments_all()
            .list(&Default::default())
            .await?
            .items)
    }

    pub async fn list_deployments_ns(&self, namespace: &str) -> Result<Vec<Deployment>, Error> {
        Ok(self
            .deployments_ns(namespace)
            .list(&Default::default())
            .await?
            .items)
    }

    pub async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        match self.deployments_ns(namespace).get(name).await {
            Ok(d) => Ok(Some(d)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Patches `spec.replicas` on the named deployment and returns the
    /// updated object, mirroring the original's direct `spec.Replicas =
    /// &replicas; clientset.Update(...)` (`server/scale.go`).
    pub async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<Deployment, Error> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        match self
            .deployments_ns(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(d) => Ok(d),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(Error::NotFound(format!("deployment {name}.{namespace}")))
            }
            Err(e) => Err(Error::TransportError(e)),
        }
    }

    /// Forwards the orchestrator's own `/livez` endpoint verbatim, per the
    /// original's `Discovery().RESTClient().Get().AbsPath("/livez")`
    /// (`server/health.go`).
    pub async fn livez(&self) -> Result<Bytes, Error> {
        let request = http::Request::builder()
            .method("GET")
            .uri("/livez")
            .body(Vec::new())
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        let response = self
            .client
            .request_text(request)
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        Ok(Bytes::from(response))
    }
}
