//! In-memory cluster for tests and dry runs
//!
//! Records every call, keeps applied objects, and fails on demand for
//! chosen resources.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use stagehand_core::{
    APPLICATION_LABEL, MANAGED_BY_LABEL, MANAGED_BY_STAGEHAND, Manifest, ResourceKey,
    VARIANT_LABEL,
};

use crate::cluster::{ClusterClient, LiveResource, is_applied_by_stagehand};
use crate::error::{KubeError, Result};

/// In-memory [`ClusterClient`]; clones share state
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<MockState>>,
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<ResourceKey, Manifest>,
    apply_failures: HashMap<ResourceKey, String>,
    delete_failures: HashMap<ResourceKey, String>,
    applied: Vec<ResourceKey>,
    deleted: Vec<ResourceKey>,
    counts: OperationCounts,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub applies: usize,
    pub deletes: usize,
    pub lists: usize,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with objects already live
    pub fn with_objects(objects: impl IntoIterator<Item = Manifest>) -> Self {
        let cluster = Self::new();
        for object in objects {
            cluster.insert(object);
        }
        cluster
    }

    /// Put an object on the cluster without recording an apply
    pub fn insert(&self, object: Manifest) {
        self.write().objects.insert(object.key().clone(), object);
    }

    /// Make every apply of `key` fail with `message`
    pub fn fail_apply(&self, key: ResourceKey, message: impl Into<String>) {
        self.write().apply_failures.insert(key, message.into());
    }

    /// Make every delete of `key` fail with `message`
    pub fn fail_delete(&self, key: ResourceKey, message: impl Into<String>) {
        self.write().delete_failures.insert(key, message.into());
    }

    /// Keys passed to `apply`, in call order
    pub fn applied_keys(&self) -> Vec<ResourceKey> {
        self.read().applied.clone()
    }

    /// Keys passed to `delete`, in call order
    pub fn deleted_keys(&self) -> Vec<ResourceKey> {
        self.read().deleted.clone()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.object(key).is_some()
    }

    /// The live object for `key`, matched regardless of API version
    pub fn object(&self, key: &ResourceKey) -> Option<Manifest> {
        self.read()
            .objects
            .iter()
            .find(|(k, _)| k.is_same_object(key))
            .map(|(_, m)| m.clone())
    }

    pub fn objects(&self) -> Vec<Manifest> {
        self.read().objects.values().cloned().collect()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.read().counts.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        let mut state = self.write();
        let key = manifest.key().clone();
        state.counts.applies += 1;
        state.applied.push(key.clone());

        if let Some(message) = state.apply_failures.get(&key) {
            return Err(KubeError::Cluster(message.clone()));
        }

        state.objects.retain(|k, _| !k.is_same_object(&key));
        state.objects.insert(key, manifest.clone());
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        let mut state = self.write();
        state.counts.deletes += 1;
        state.deleted.push(key.clone());

        if let Some(message) = state.delete_failures.get(key) {
            return Err(KubeError::Cluster(message.clone()));
        }

        let before = state.objects.len();
        state.objects.retain(|k, _| !k.is_same_object(key));
        if state.objects.len() == before {
            return Err(KubeError::not_found(key));
        }
        Ok(())
    }

    async fn list_managed(&self, app_id: &str) -> Result<Vec<LiveResource>> {
        let mut state = self.write();
        state.counts.lists += 1;

        let mut live = Vec::new();
        for (key, object) in &state.objects {
            let labels = object.nested_string_map(&["metadata", "labels"])?;
            let managed = labels.get(MANAGED_BY_LABEL).map(String::as_str)
                == Some(MANAGED_BY_STAGEHAND)
                && labels.get(APPLICATION_LABEL).map(String::as_str) == Some(app_id);
            if !managed {
                continue;
            }

            let annotations = object.nested_string_map(&["metadata", "annotations"])?;
            let controlled = object.object()["metadata"]["ownerReferences"]
                .as_array()
                .is_some_and(|owners| owners.iter().any(|o| o["controller"] == true));
            if !is_applied_by_stagehand(key, &annotations, controlled) {
                continue;
            }

            live.push(LiveResource {
                key: key.clone(),
                variant: labels.get(VARIANT_LABEL).and_then(|v| v.parse().ok()),
            });
        }
        Ok(live)
    }
}
