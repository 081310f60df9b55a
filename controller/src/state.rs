//! State Store (§4.A): the `ConfigMap`-backed key/value map holding one
//! [`DesiredStateRecord`] per tracked deployment plus the reserved
//! `"status"` placeholder key. Grounded on the original's `server/state.go`
//! `Get`/`ReadRecord`/`WriteRecord`/`DeleteRecord` quartet.

use chrono::Utc;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use replicon_types::{DesiredStateRecord, STATE_CONFIGMAP_NAME, STATE_PLACEHOLDER, STATUS_KEY};
use std::collections::BTreeMap;

use crate::client::KubeClient;
use crate::util::Error;

pub struct StateStore {
    client: KubeClient,
}

impl StateStore {
    pub fn new(client: KubeClient) -> Self {
        StateStore { client }
    }

    fn placeholder_data() -> BTreeMap<String, String> {
        BTreeMap::from([(STATUS_KEY.to_string(), STATE_PLACEHOLDER.to_string())])
    }

    /// Returns the state `ConfigMap`, creating it (or re-initializing its
    /// data) if absent or empty.
    pub async fn get(&self) -> Result<ConfigMap, Error> {
        match self.client.get_configmap(STATE_CONFIGMAP_NAME).await? {
            None => {
                let cm = ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(STATE_CONFIGMAP_NAME.to_string()),
                        namespace: Some(self.client.namespace().to_string()),
                        ..Default::default()
                    },
                    data: Some(Self::placeholder_data()),
                    ..Default::default()
                };
                self.client.create_configmap(&cm).await
            }
            Some(cm) if cm.data.as_ref().is_none_or(|d| d.is_empty()) => {
                let mut cm = cm;
                cm.data = Some(Self::placeholder_data());
                self.client
                    .replace_configmap(STATE_CONFIGMAP_NAME, &cm)
                    .await
            }
            Some(cm) => Ok(cm),
        }
    }

    pub async fn read_record(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DesiredStateRecord>, Error> {
        let cm = self.get().await?;
        let key = replicon_types::state_key(name, namespace);
        let Some(raw) = cm.data.as_ref().and_then(|d| d.get(&key)) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| Error::StateCorruption(format!("{key}: {e}")))
    }

    /// Persists `record` (with a freshly stamped `time`) and returns it, so
    /// callers that need to hand the written record back to a client don't
    /// have to re-read it.
    pub async fn write_record(
        &self,
        mut record: DesiredStateRecord,
    ) -> Result<DesiredStateRecord, Error> {
        record.time = Utc::now();
        let mut cm = self.get().await?;
        let key = record.key();
        let encoded = serde_json::to_string(&record)
            .map_err(|e| Error::Internal(format!("encoding record {key}: {e}")))?;
        cm.data.get_or_insert_with(BTreeMap::new).insert(key, encoded);
        self.client.replace_configmap(STATE_CONFIGMAP_NAME, &cm).await?;
        Ok(record)
    }

    pub async fn delete_record(&self, name: &str, namespace: &str) -> Result<(), Error> {
        let mut cm = self.get().await?;
        let key = replicon_types::state_key(name, namespace);
        let removed = cm
            .data
            .as_mut()
            .map(|d| d.remove(&key).is_some())
            .unwrap_or(false);
        if removed {
            self.client.replace_configmap(STATE_CONFIGMAP_NAME, &cm).await?;
        }
        Ok(())
    }
}

/// Parses every non-`"status"` key in a state `ConfigMap` into
/// `(name, namespace, record)` triples. A malformed key (not exactly one
/// dot) is reported as a [`Error::StateCorruption`].
pub fn parse_records(cm: &ConfigMap) -> Result<Vec<(String, String, DesiredStateRecord)>, Error> {
    let Some(data) = cm.data.as_ref() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(data.len());
    for (key, raw) in data {
        if key == STATUS_KEY {
            continue;
        }
        let Some((name, namespace)) = replicon_types::split_state_key(key) else {
            return Err(Error::StateCorruption(format!(
                "state key {key:?} does not match name.namespace"
            )));
        };
        let record: DesiredStateRecord = serde_json::from_str(raw)
            .map_err(|e| Error::StateCorruption(format!("{key}: {e}")))?;
        out.push((name.to_string(), namespace.to_string(), record));
    }
    Ok(out)
}
