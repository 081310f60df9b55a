//! Reconciliation Engine (§4.D). Subscribes to deployment change
//! notifications via `kube::runtime`'s watcher machinery (the lower-level
//! `Update`/`Delete`/`HasSynced` interface, generalized from the teacher's
//! `kube::runtime::Controller` in `operator/src/strims/reconcile.rs` since
//! this system tracks plain `Deployment`s rather than a CRD with a
//! finalizer lifecycle).

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube::ResourceExt;
use kube::runtime::watcher::{self, Event};
use replicon_common::log;
use replicon_types::{LiveDeployment, ReconcileDecision, StateOnlyRecord, SyncClassification};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::client::KubeClient;
use crate::scale;
use crate::state::{StateStore, parse_records};
use crate::util::Error;

/// Runs the engine until `shutdown` is cancelled. Blocks internally until
/// the watcher's initial list settles before running the startup sync
/// pass (Open Question 4).
pub async fn run(client: KubeClient, shutdown: CancellationToken) -> Result<(), Error> {
    log::info("starting reconciliation engine");

    let store = StateStore::new(client.clone());
    let api: Api<Deployment> = Api::all(client.inner());
    let mut stream = std::pin::pin!(watcher::watcher(api, watcher::Config::default()));

    let mut synced = false;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info("reconciliation engine shutting down");
                return Ok(());
            }
            next = stream.next() => {
                let Some(event) = next else {
                    log::warn("watch stream ended");
                    return Ok(());
                };
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        log::error(format!("watch error: {e}"));
                        continue;
                    }
                };
                match event {
                    Event::Init | Event::InitApply(_) => {}
                    Event::InitDone => {
                        if !synced {
                            synced = true;
                            startup_sync(&client, &store).await?;
                        }
                    }
                    Event::Apply(d) => handle_updated(&client, &store, d).await,
                    Event::Delete(d) => handle_deleted(&store, d).await,
                }
            }
        }
    }
}

/// Classifies every tracked record against the live deployment list and
/// drives each through the update or delete path, as if every deployment
/// had just been observed for the first time.
async fn startup_sync(client: &KubeClient, store: &StateStore) -> Result<(), Error> {
    log::info("running startup sync pass");

    let cm = store.get().await?;
    let records = parse_records(&cm)?;

    let live_deployments = client.list_deployments_all().await?;
    let mut by_key: HashMap<String, Deployment> = HashMap::with_capacity(live_deployments.len());
    for d in live_deployments {
        let name = d.name_any();
        let Some(namespace) = d.namespace() else {
            continue;
        };
        by_key.insert(replicon_types::state_key(&name, &namespace), d);
    }

    let mut classification = SyncClassification::default();
    for (name, namespace, _record) in &records {
        let key = replicon_types::state_key(name, namespace);
        if let Some(d) = by_key.get(&key) {
            classification
                .in_sync
                .push(LiveDeployment::from_deployment(d));
        } else {
            classification.out_of_sync.push(StateOnlyRecord {
                name: name.clone(),
                namespace: namespace.clone(),
            });
        }
    }

    for live in &classification.in_sync {
        let key = replicon_types::state_key(&live.name, &live.namespace);
        if let Some(d) = by_key.get(&key) {
            handle_updated(client, store, d.clone()).await;
        }
    }
    for stale in &classification.out_of_sync {
        if let Err(e) = store.delete_record(&stale.name, &stale.namespace).await {
            log::error(format!(
                "purging stale record {}.{}: {e}",
                stale.name, stale.namespace
            ));
        }
    }

    log::info(format!(
        "startup sync complete: {} in sync, {} purged",
        classification.in_sync.len(),
        classification.out_of_sync.len()
    ));
    Ok(())
}

/// Applies the drift evaluator to a single observed deployment, scaling
/// and refreshing the stored record only when drift is both signaled and
/// real. Failures are logged and never propagated; a fault in one event
/// must never halt the watch loop.
async fn handle_updated(client: &KubeClient, store: &StateStore, d: Deployment) {
    let name = d.name_any();
    let Some(namespace) = d.namespace() else {
        return;
    };
    let live = LiveDeployment::from_deployment(&d);

    let record = match store.read_record(&name, &namespace).await {
        Ok(record) => record,
        Err(e) => {
            log::error(format!("reading record for {name}.{namespace}: {e}"));
            return;
        }
    };

    // recoverReconcilePanic-equivalent: the decision itself is pure and
    // synchronous, so it is the only part worth isolating from a panic.
    let decision = match std::panic::catch_unwind(|| {
        replicon_types::should_reconcile(record.as_ref(), &live)
    }) {
        Ok(decision) => decision,
        Err(_) => {
            log::error(format!(
                "recovered from panic evaluating drift for {name}.{namespace}"
            ));
            return;
        }
    };

    if decision != ReconcileDecision::Reconcile {
        return;
    }
    let Some(record) = record else {
        return;
    };
    let Some(spec_replicas) = live.spec_replicas else {
        return;
    };
    if spec_replicas == record.replicas {
        return;
    }

    if let Err(e) = scale::scale(client, &namespace, &name, record.replicas).await {
        log::error(format!("scaling {name}.{namespace}: {e}"));
        return;
    }
    if let Err(e) = store.write_record(record).await {
        log::error(format!("writing record for {name}.{namespace}: {e}"));
    }
}

async fn handle_deleted(store: &StateStore, d: Deployment) {
    let name = d.name_any();
    let Some(namespace) = d.namespace() else {
        return;
    };
    match store.delete_record(&name, &namespace).await {
        Ok(()) => log::info(format!("deleted record for {name}.{namespace}")),
        Err(e) => log::error(format!("deleting record for {name}.{namespace}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, FakeCluster};
    use replicon_types::DesiredStateRecord;

    fn record(name: &str, namespace: &str, replicas: i32, reconcile: bool) -> DesiredStateRecord {
        DesiredStateRecord {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas,
            reconcile,
            time: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn handle_updated_scales_and_writes_when_stabilized_and_drifted() {
        let fake = FakeCluster::new().with_deployment(
            "prod",
            "web",
            test_support::deployment("prod", "web", Some(7), Some(7)),
        );
        let client = fake.kube_client();
        let store = StateStore::new(client.clone());
        store.write_record(record("web", "prod", 3, true)).await.unwrap();

        let deployment = fake.deployment("prod", "web").unwrap();
        handle_updated(&client, &store, deployment).await;

        let updated = fake.deployment("prod", "web").unwrap();
        assert_eq!(updated.spec.unwrap().replicas, Some(3));
    }

    #[tokio::test]
    async fn handle_updated_skips_when_reconcile_not_requested() {
        let fake = FakeCluster::new().with_deployment(
            "prod",
            "web",
            test_support::deployment("prod", "web", Some(7), Some(7)),
        );
        let client = fake.kube_client();
        let store = StateStore::new(client.clone());
        store.write_record(record("web", "prod", 3, false)).await.unwrap();

        let deployment = fake.deployment("prod", "web").unwrap();
        handle_updated(&client, &store, deployment).await;

        let updated = fake.deployment("prod", "web").unwrap();
        assert_eq!(updated.spec.unwrap().replicas, Some(7));
    }

    #[tokio::test]
    async fn handle_updated_skips_when_already_converged() {
        let fake = FakeCluster::new().with_deployment(
            "prod",
            "web",
            test_support::deployment("prod", "web", Some(5), Some(5)),
        );
        let client = fake.kube_client();
        let store = StateStore::new(client.clone());
        store.write_record(record("web", "prod", 5, true)).await.unwrap();

        let deployment = fake.deployment("prod", "web").unwrap();
        handle_updated(&client, &store, deployment).await;

        let updated = fake.deployment("prod", "web").unwrap();
        assert_eq!(updated.spec.unwrap().replicas, Some(5));
    }

    #[tokio::test]
    async fn handle_deleted_removes_record() {
        let fake = FakeCluster::new();
        let client = fake.kube_client();
        let store = StateStore::new(client.clone());
        store.write_record(record("web", "prod", 3, true)).await.unwrap();

        let deployment = test_support::deployment("prod", "web", Some(3), Some(3));
        handle_deleted(&store, deployment).await;

        assert_eq!(store.read_record("web", "prod").await.unwrap(), None);
    }

    #[tokio::test]
    async fn startup_sync_reconciles_in_sync_and_purges_orphans() {
        let fake = FakeCluster::new().with_deployment(
            "prod",
            "web",
            test_support::deployment("prod", "web", Some(7), Some(7)),
        );
        let client = fake.kube_client();
        let store = StateStore::new(client.clone());
        store.write_record(record("web", "prod", 3, true)).await.unwrap();
        store.write_record(record("gone", "prod", 1, false)).await.unwrap();

        startup_sync(&client, &store).await.unwrap();

        let updated = fake.deployment("prod", "web").unwrap();
        assert_eq!(updated.spec.unwrap().replicas, Some(3));
        assert_eq!(store.read_record("gone", "prod").await.unwrap(), None);
    }
}
