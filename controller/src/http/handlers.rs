//! HTTP Control Surface (§4.E). Five endpoints; axum's own routing already
//! returns 405 for a path matched by the wrong method, so only the
//! business logic needs reproducing here (`router.go`'s `handlerFunc`
//! wrapper is replaced by `Error`'s `IntoResponse` impl).

use axum::Json;
use axum::extract::{Path, State};
use replicon_types::{DeploymentList, DeploymentSummary, DesiredStateRecord, Diff, LiveDeployment};

use super::AppState;
use crate::scale;
use crate::state::StateStore;
use crate::util::Error;

fn to_summary(live: &LiveDeployment) -> DeploymentSummary {
    DeploymentSummary {
        name: live.name.clone(),
        namespace: live.namespace.clone(),
        replicas: live.spec_replicas.unwrap_or(0),
    }
}

pub async fn list_all(State(state): State<AppState>) -> Result<Json<DeploymentList>, Error> {
    let deployments = state.client.list_deployments_all().await?;
    let deployments: Vec<DeploymentSummary> = deployments
        .iter()
        .map(|d| to_summary(&LiveDeployment::from_deployment(d)))
        .collect();
    Ok(Json(DeploymentList {
        count: deployments.len(),
        deployments,
    }))
}

pub async fn list_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<DeploymentList>, Error> {
    let deployments = state.client.list_deployments_ns(&namespace).await?;
    let deployments: Vec<DeploymentSummary> = deployments
        .iter()
        .map(|d| to_summary(&LiveDeployment::from_deployment(d)))
        .collect();
    Ok(Json(DeploymentList {
        count: deployments.len(),
        deployments,
    }))
}

async fn fetch_live(
    state: &AppState,
    namespace: &str,
    name: &str,
) -> Result<LiveDeployment, Error> {
    let deployment = state
        .client
        .get_deployment(namespace, name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("deployment {name}.{namespace}")))?;
    Ok(LiveDeployment::from_deployment(&deployment))
}

pub async fn get_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DeploymentSummary>, Error> {
    let live = fetch_live(&state, &namespace, &name).await?;
    let replicas = live
        .spec_replicas
        .ok_or_else(|| Error::Internal(format!("deployment {name}.{namespace} has no spec.replicas")))?;
    Ok(Json(DeploymentSummary {
        name: live.name,
        namespace: live.namespace,
        replicas,
    }))
}

pub async fn diff_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Diff>, Error> {
    let store = StateStore::new(state.client.clone());
    let record = store
        .read_record(&name, &namespace)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no recorded state for {name}.{namespace}")))?;
    let live = fetch_live(&state, &namespace, &name).await?;
    let live_replicas = live
        .spec_replicas
        .ok_or_else(|| Error::Internal(format!("deployment {name}.{namespace} has no spec.replicas")))?;

    let diff = if record.replicas == live_replicas {
        "No Changes".to_string()
    } else {
        format!("replicas: {} => {}", record.replicas, live_replicas)
    };
    Ok(Json(Diff {
        name,
        namespace,
        diff,
    }))
}

pub async fn scale_unreconciled(
    State(state): State<AppState>,
    Path((namespace, name, replicas)): Path<(String, String, i32)>,
) -> Result<Json<DesiredStateRecord>, Error> {
    let store = StateStore::new(state.client.clone());
    let prior = store.read_record(&name, &namespace).await?;
    if prior.as_ref().is_some_and(|r| r.reconcile) {
        return Err(Error::BadRequest(format!(
            "{name}.{namespace} is under active reconciliation; use the reconcile endpoint instead"
        )));
    }

    // Confirms the deployment exists before committing the record (Open
    // Question 1: prior reconcile bit defaults to false with no record).
    fetch_live(&state, &namespace, &name).await?;
    scale::scale(&state.client, &namespace, &name, replicas).await?;

    let record = DesiredStateRecord {
        name: name.clone(),
        namespace: namespace.clone(),
        replicas,
        reconcile: prior.map(|r| r.reconcile).unwrap_or(false),
        time: chrono::Utc::now(),
    };
    let written = store.write_record(record).await?;

    Ok(Json(written))
}

pub async fn scale_reconciled(
    State(state): State<AppState>,
    Path((namespace, name, replicas)): Path<(String, String, i32)>,
) -> Result<Json<DesiredStateRecord>, Error> {
    let store = StateStore::new(state.client.clone());
    scale::scale(&state.client, &namespace, &name, replicas).await?;

    let record = DesiredStateRecord {
        name: name.clone(),
        namespace: namespace.clone(),
        replicas,
        reconcile: true,
        time: chrono::Utc::now(),
    };
    let written = store.write_record(record).await?;

    Ok(Json(written))
}
