//! Data model for the replica reconciliation controller: the durable
//! per-deployment state record, the key→string state map it lives in, and
//! the read-mostly projection of a live `Deployment` used to detect drift.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};

/// Name of the state `ConfigMap` resource. Fixed across the fleet; only the
/// namespace varies (see [`DEFAULT_NAMESPACE`]).
pub const STATE_CONFIGMAP_NAME: &str = "portal-replica-controller";

/// Namespace fallback when `POD_NAMESPACE` is unset.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Fixed human-readable placeholder kept under the reserved `"status"` key.
pub const STATE_PLACEHOLDER: &str = "Portal Replica Controller State";

/// Reserved key whose value is never a [`DesiredStateRecord`].
pub const STATUS_KEY: &str = "status";

/// The operator's durable memory of what was last asked for a single
/// deployment, distinct from the orchestrator's own record of the object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredStateRecord {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    #[serde(default)]
    pub reconcile: bool,
    pub time: DateTime<Utc>,
}

impl DesiredStateRecord {
    /// The `"<name>.<namespace>"` key this record is stored under.
    pub fn key(&self) -> String {
        state_key(&self.name, &self.namespace)
    }
}

/// Builds the `"<name>.<namespace>"` state map key for a deployment.
pub fn state_key(name: &str, namespace: &str) -> String {
    format!("{name}.{namespace}")
}

/// Splits a state map key back into `(name, namespace)`. Returns `None` if
/// the key does not contain exactly one dot.
pub fn split_state_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.splitn(2, '.');
    let name = parts.next()?;
    let namespace = parts.next()?;
    if namespace.contains('.') {
        return None;
    }
    Some((name, namespace))
}

/// Read-mostly projection of a live `Deployment` used by the drift
/// evaluator and the HTTP surface. `spec_replicas` is `None` only when the
/// orchestrator violated its own invariant that a stored `Deployment`
/// always has `spec.replicas` set.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveDeployment {
    pub name: String,
    pub namespace: String,
    pub spec_replicas: Option<i32>,
    pub ready_replicas: i32,
}

impl LiveDeployment {
    /// Projects a raw `k8s_openapi` `Deployment` into the fields this
    /// system actually consumes.
    pub fn from_deployment(d: &Deployment) -> Self {
        let name = d.metadata.name.clone().unwrap_or_default();
        let namespace = d.metadata.namespace.clone().unwrap_or_default();
        let spec_replicas = d.spec.as_ref().and_then(|s| s.replicas);
        let ready_replicas = d
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        LiveDeployment {
            name,
            namespace,
            spec_replicas,
            ready_replicas,
        }
    }
}

/// Plain `{name, namespace, replicas}` projection returned by the list and
/// fetch endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
}

/// Body of the list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentList {
    pub count: usize,
    pub deployments: Vec<DeploymentSummary>,
}

/// Body of the diff endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub name: String,
    pub namespace: String,
    pub diff: String,
}

/// Result of classifying the state map's records against the live cluster
/// at startup. Two explicitly named lists rather than a string-keyed map
/// (REDESIGN FLAG in spec.md §9 — the original implementation keyed a
/// `map[string][]Deployment` by `"inSync"`/`"outOfSync"` string literals).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncClassification {
    /// Records whose deployment still exists in the cluster.
    pub in_sync: Vec<LiveDeployment>,
    /// Records whose deployment no longer exists; to be purged.
    pub out_of_sync: Vec<StateOnlyRecord>,
}

/// A record found in state with no corresponding live deployment. Only the
/// identity is known; there is nothing else to reconcile against.
#[derive(Debug, Clone, PartialEq)]
pub struct StateOnlyRecord {
    pub name: String,
    pub namespace: String,
}

/// The drift evaluator's verdict for a single deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    Reconcile,
    Skip,
}

/// Pure decision function (spec.md §4.C). Given the stored record (if any)
/// and the live deployment, decides whether reconciliation should fire
/// right now.
///
/// Reconciliation only fires once the deployment has stabilized
/// (`spec.replicas == status.readyReplicas`) so the controller never
/// fights an in-flight rollout.
pub fn should_reconcile(
    record: Option<&DesiredStateRecord>,
    live: &LiveDeployment,
) -> ReconcileDecision {
    let Some(record) = record else {
        return ReconcileDecision::Skip;
    };
    if !record.reconcile {
        return ReconcileDecision::Skip;
    }
    let Some(spec_replicas) = live.spec_replicas else {
        return ReconcileDecision::Skip;
    };
    if spec_replicas == live.ready_replicas {
        return ReconcileDecision::Reconcile;
    }
    // spec_replicas == record.replicas (already converged) falls through to
    // Skip here too — both branches of spec.md's "otherwise" land on Skip.
    ReconcileDecision::Skip
}
