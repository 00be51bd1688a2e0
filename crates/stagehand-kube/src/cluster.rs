//! Cluster access
//!
//! [`ClusterClient`] is the narrow surface stages need: apply one manifest,
//! delete one resource, list what stagehand manages for an application.
//! [`KubeCluster`] implements it against a live API server with dynamic
//! objects resolved through discovery.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams},
    core::GroupVersionKind,
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope, verbs},
};
use stagehand_core::{
    APPLICATION_LABEL, MANAGED_BY_LABEL, MANAGED_BY_STAGEHAND, Manifest, RESOURCE_KEY_ANNOTATION,
    ResourceKey, VARIANT_LABEL, Variant,
};

use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
const FIELD_MANAGER: &str = "stagehand";

/// A resource found on the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveResource {
    pub key: ResourceKey,
    /// Value of the variant label, if it parses
    pub variant: Option<Variant>,
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn apply(&self, manifest: &Manifest) -> Result<()>;

    /// Delete one resource; an absent one is reported with
    /// [`KubeError::is_not_found`]
    async fn delete(&self, key: &ResourceKey) -> Result<()>;

    /// Resources stagehand applied for `app_id`
    ///
    /// Objects that only inherited the labels (a Service's Endpoints and
    /// EndpointSlices) are not included.
    async fn list_managed(&self, app_id: &str) -> Result<Vec<LiveResource>>;
}

/// [`ClusterClient`] backed by the Kubernetes API
pub struct KubeCluster {
    client: Client,
    discovery: Discovery,
    default_namespace: String,
}

impl KubeCluster {
    /// Connect and run API discovery
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(KubeError::Api)?;
        let default_namespace = client.default_namespace().to_string();

        Ok(Self {
            client,
            discovery,
            default_namespace,
        })
    }

    /// Connect using the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await.map_err(KubeError::Api)?;
        Self::new(client).await
    }

    /// Namespace for namespaced resources whose key has none
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    fn resolve(&self, key: &ResourceKey) -> Option<(ApiResource, ApiCapabilities)> {
        self.discovery.resolve_gvk(&gvk_of(key))
    }

    fn namespace_for(&self, key: &ResourceKey, caps: &ApiCapabilities) -> Option<String> {
        if caps.scope != Scope::Namespaced {
            return None;
        }
        if key.namespace().is_empty() {
            Some(self.default_namespace.clone())
        } else {
            Some(key.namespace().to_string())
        }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        let key = manifest.key();
        let (resource, caps) = self.resolve(key).ok_or_else(|| {
            KubeError::InvalidManifest(format!(
                "unknown resource type {}/{}",
                key.api_version(),
                key.kind()
            ))
        })?;

        let mut obj: DynamicObject = serde_json::from_value(manifest.object().clone())?;
        let namespace = self.namespace_for(key, &caps);
        obj.metadata.namespace = namespace.clone();

        let params = PatchParams::apply(FIELD_MANAGER).force();
        self.api(&resource, namespace.as_deref())
            .patch(key.name(), &params, &Patch::Apply(&obj))
            .await
            .map_err(KubeError::Api)?;

        tracing::debug!(key = %key, "applied");
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        // Without a served type there can be no object of that type
        let Some((resource, caps)) = self.resolve(key) else {
            return Err(KubeError::not_found(key));
        };

        let namespace = self.namespace_for(key, &caps);
        match self
            .api(&resource, namespace.as_deref())
            .delete(key.name(), &DeleteParams::background())
            .await
        {
            Ok(_) => {
                tracing::debug!(key = %key, "deleted");
                Ok(())
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(KubeError::not_found(key)),
            Err(e) => Err(KubeError::Api(e)),
        }
    }

    async fn list_managed(&self, app_id: &str) -> Result<Vec<LiveResource>> {
        let selector = format!(
            "{}={},{}={}",
            MANAGED_BY_LABEL, MANAGED_BY_STAGEHAND, APPLICATION_LABEL, app_id
        );
        let params = ListParams::default().labels(&selector);

        let mut live = Vec::new();
        for group in self.discovery.groups() {
            for (resource, caps) in group.recommended_resources() {
                if !caps.supports_operation(verbs::LIST) {
                    continue;
                }

                let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
                let list = match api.list(&params).await {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::debug!(kind = %resource.kind, error = %e, "skipping unlistable resource");
                        continue;
                    }
                };

                for obj in list.items {
                    let Some(name) = obj.metadata.name.clone() else {
                        continue;
                    };
                    let key = ResourceKey::new(
                        resource.api_version.clone(),
                        resource.kind.clone(),
                        obj.metadata.namespace.clone().unwrap_or_default(),
                        name,
                    );

                    let controlled = obj
                        .metadata
                        .owner_references
                        .iter()
                        .flatten()
                        .any(|owner| owner.controller == Some(true));
                    let annotations = obj.metadata.annotations.clone().unwrap_or_default();
                    if !is_applied_by_stagehand(&key, &annotations, controlled) {
                        tracing::debug!(key = %key, "skipping labelled object not applied by stagehand");
                        continue;
                    }

                    let variant = obj
                        .metadata
                        .labels
                        .as_ref()
                        .and_then(|l| l.get(VARIANT_LABEL))
                        .and_then(|v| v.parse().ok());
                    live.push(LiveResource { key, variant });
                }
            }
        }

        live.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(live)
    }
}

/// Whether a labelled live object is one stagehand applied
///
/// The object must carry a resource-key annotation naming itself and must not
/// be controlled by another object. A recorded key without a namespace matches
/// the object in any namespace.
pub(crate) fn is_applied_by_stagehand(
    live: &ResourceKey,
    annotations: &BTreeMap<String, String>,
    controlled: bool,
) -> bool {
    if controlled {
        return false;
    }
    let Some(recorded) = annotations
        .get(RESOURCE_KEY_ANNOTATION)
        .and_then(|value| value.parse::<ResourceKey>().ok())
    else {
        return false;
    };

    if recorded.namespace().is_empty() {
        recorded.with_namespace(live.namespace()).is_same_object(live)
    } else {
        recorded.is_same_object(live)
    }
}

/// "apps/v1" is group "apps", version "v1"; "v1" is the core group
fn gvk_of(key: &ResourceKey) -> GroupVersionKind {
    let (group, version) = match key.api_version().rsplit_once('/') {
        Some((g, v)) => (g, v),
        None => ("", key.api_version()),
    };
    GroupVersionKind::gvk(group, version, key.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_of() {
        let gvk = gvk_of(&ResourceKey::new("apps/v1", "Deployment", "", "web"));
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");

        let gvk = gvk_of(&ResourceKey::new("v1", "Service", "", "web"));
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn test_is_applied_by_stagehand() {
        let service = ResourceKey::new("v1", "Service", "default", "web");
        let recorded = |key: &str| {
            BTreeMap::from([(RESOURCE_KEY_ANNOTATION.to_string(), key.to_string())])
        };

        assert!(is_applied_by_stagehand(
            &service,
            &recorded("v1:Service:default:web"),
            false
        ));
        assert!(is_applied_by_stagehand(&service, &recorded("v1:Service::web"), false));
        assert!(!is_applied_by_stagehand(&service, &BTreeMap::new(), false));
        assert!(!is_applied_by_stagehand(
            &service,
            &recorded("v1:Service:default:web"),
            true
        ));

        // Endpoints share the Service's name but not its kind
        let endpoints = ResourceKey::new("v1", "Endpoints", "default", "web");
        assert!(!is_applied_by_stagehand(
            &endpoints,
            &recorded("v1:Service:default:web"),
            false
        ));
        assert!(!is_applied_by_stagehand(&service, &recorded("garbage"), false));
    }
}
