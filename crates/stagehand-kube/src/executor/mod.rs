//! Stage execution
//!
//! An [`Executor`] runs one pipeline stage of one deployment. Each stage is
//! a composition of the library primitives: load (through the manifest
//! cache), generate variants, check or inject selectors, annotate, sort,
//! then apply or delete.

mod primary;
mod rollback;
mod rollout;
mod sync;
mod traffic;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use stagehand_core::{DeploymentSpec, Manifest, ResourceKey, StageConfig, StageKind, Variant};

use crate::annotate::BuiltinAnnotations;
use crate::cache::ManifestCache;
use crate::cluster::ClusterClient;
use crate::error::{KubeError, Result};
use crate::order::sort_for_apply;
use crate::progress::LogPersister;
use crate::reconcile::Reconciler;
use crate::routing::{PodSelectorRouter, TrafficRouter};
use crate::signal::{StageStatus, StopSignal, determine_stage_status};
use crate::source::{ManifestSource, RevisionCheckout};

/// The deployment a stage belongs to
#[derive(Debug, Clone, Default)]
pub struct DeploymentInfo {
    pub application_id: String,
    pub application_name: String,
    /// Commit being deployed
    pub trigger_commit: String,
    /// Commit of the last successful deployment (empty on the first one)
    pub running_commit: String,
}

/// Everything a stage execution needs from the scheduler
#[derive(Debug, Clone)]
pub struct StageInput {
    pub stage_name: String,
    /// Status recorded before this execution
    pub stage_status: StageStatus,
    pub deployment: DeploymentInfo,
    pub agent_id: String,
    pub config: DeploymentSpec,
    /// Pipeline entry being executed; pipelines may repeat a stage kind with
    /// different options. Without it the first entry of the kind is used.
    pub stage_config: Option<StageConfig>,
    /// Checkout of the trigger commit
    pub checkout: RevisionCheckout,
    /// Checkout of the running commit
    pub running_checkout: Option<RevisionCheckout>,
}

pub struct Executor {
    input: StageInput,
    source: Arc<dyn ManifestSource>,
    cluster: Arc<dyn ClusterClient>,
    log: Arc<dyn LogPersister>,
    cache: ManifestCache,
    routers: Vec<Arc<dyn TrafficRouter>>,
}

impl Executor {
    pub fn new(
        input: StageInput,
        source: Arc<dyn ManifestSource>,
        cluster: Arc<dyn ClusterClient>,
        log: Arc<dyn LogPersister>,
        cache: ManifestCache,
    ) -> Self {
        Self {
            input,
            source,
            cluster,
            log,
            cache,
            routers: vec![Arc::new(PodSelectorRouter)],
        }
    }

    /// Register a router; it replaces any router for the same method
    pub fn with_router(mut self, router: Arc<dyn TrafficRouter>) -> Self {
        self.routers.retain(|r| r.method() != router.method());
        self.routers.push(router);
        self
    }

    /// Run the stage and fold the outcome with the stop signal
    pub async fn execute(&self, signal: &StopSignal) -> StageStatus {
        let stage = &self.input.stage_name;
        let kind = match stage.parse::<StageKind>() {
            Ok(kind) => kind,
            Err(_) => {
                self.log.error(&format!(
                    "Unsupported stage {} for kubernetes application",
                    stage
                ));
                return StageStatus::Failure;
            }
        };

        tracing::info!(
            app_id = %self.input.deployment.application_id,
            stage = %kind,
            commit = %self.input.deployment.trigger_commit,
            "executing stage"
        );

        let result = match kind {
            StageKind::Sync => self.ensure_sync(signal).await,
            StageKind::PrimaryRollout => self.ensure_primary_rollout(signal).await,
            StageKind::CanaryRollout => self.ensure_variant_rollout(Variant::Canary, signal).await,
            StageKind::CanaryClean => self.ensure_variant_clean(Variant::Canary, signal).await,
            StageKind::BaselineRollout => {
                self.ensure_variant_rollout(Variant::Baseline, signal).await
            }
            StageKind::BaselineClean => self.ensure_variant_clean(Variant::Baseline, signal).await,
            StageKind::TrafficRouting => self.ensure_traffic_routing(signal).await,
            StageKind::Rollback => self.ensure_rollback(signal).await,
        };

        let status = match result {
            Ok(()) => StageStatus::Success,
            Err(e) => {
                self.log.error(&e.to_string());
                tracing::error!(
                    app_id = %self.input.deployment.application_id,
                    stage = %kind,
                    error = %e,
                    "stage failed"
                );
                StageStatus::Failure
            }
        };

        determine_stage_status(signal.signal(), self.input.stage_status, status)
    }

    fn config(&self) -> &DeploymentSpec {
        &self.input.config
    }

    fn app_id(&self) -> &str {
        &self.input.deployment.application_id
    }

    fn trigger_commit(&self) -> &str {
        &self.input.deployment.trigger_commit
    }

    fn running_commit(&self) -> &str {
        &self.input.deployment.running_commit
    }

    /// Pipeline entry for `kind`: the executing one when it is of that kind,
    /// otherwise the first configured one
    fn configured_stage(&self, kind: StageKind) -> Option<&StageConfig> {
        self.input
            .stage_config
            .as_ref()
            .filter(|stage| stage.name.parse::<StageKind>().ok() == Some(kind))
            .or_else(|| self.config().stage(kind))
    }

    /// Options of the configured stage of `kind`
    ///
    /// An unconfigured stage yields defaults unless `required`.
    fn stage_options<T: DeserializeOwned + Default>(
        &self,
        kind: StageKind,
        required: bool,
    ) -> Result<T> {
        match self.configured_stage(kind) {
            Some(stage) => Ok(stage.options()?),
            None if required => Err(KubeError::InvalidConfig(format!(
                "missing configuration for stage {}",
                kind
            ))),
            None => Ok(T::default()),
        }
    }

    /// Manifests at the trigger commit
    async fn load_manifests(&self) -> Result<Vec<Manifest>> {
        self.load_cached(self.trigger_commit(), &self.input.checkout)
            .await
    }

    /// Manifests at the running commit
    async fn load_running_manifests(&self) -> Result<Vec<Manifest>> {
        let commit = self.running_commit();
        if commit.is_empty() {
            return Err(KubeError::NoRunningRevision);
        }
        let checkout = self.input.running_checkout.as_ref().ok_or_else(|| {
            KubeError::Load(format!("no checkout of running commit {}", commit))
        })?;
        self.load_cached(commit, checkout).await
    }

    async fn load_cached(&self, commit: &str, checkout: &RevisionCheckout) -> Result<Vec<Manifest>> {
        let cache = self.cache.for_app(self.app_id());
        if let Some(manifests) = cache.get(commit) {
            return Ok(manifests);
        }

        self.log
            .info(&format!("Loading manifests at commit {} for handling", commit));
        let manifests = self.source.load_manifests(checkout).await?;
        cache.put(commit, &manifests);
        self.log
            .success(&format!("Successfully loaded {} manifests", manifests.len()));
        Ok(manifests)
    }

    fn annotations(&self, variant: Variant, commit: &str) -> BuiltinAnnotations {
        BuiltinAnnotations {
            agent_id: self.input.agent_id.clone(),
            application_id: self.app_id().to_string(),
            variant,
            commit_hash: commit.to_string(),
        }
    }

    async fn apply(&self, manifests: Vec<Manifest>, signal: &StopSignal) -> Result<()> {
        let sorted = sort_for_apply(manifests);
        Reconciler::new(self.cluster.as_ref(), self.log.as_ref(), signal)
            .apply(&sorted)
            .await
    }

    async fn delete(&self, keys: &[ResourceKey], signal: &StopSignal) -> Result<()> {
        Reconciler::new(self.cluster.as_ref(), self.log.as_ref(), signal)
            .delete(keys)
            .await
            .into_result()
            .map(|_| ())
    }

    fn router_for(&self) -> Result<&dyn TrafficRouter> {
        let method = self.config().traffic_routing.method;
        self.routers
            .iter()
            .find(|r| r.method() == method)
            .map(|r| r.as_ref())
            .ok_or_else(|| KubeError::UnsupportedRoutingMethod {
                method: method.to_string(),
            })
    }
}

/// Whether a live resource is one of the applied manifests
///
/// Manifests without a namespace match the resource in any namespace, since
/// the cluster fills in its default.
fn is_applied(live: &ResourceKey, applied: &[Manifest]) -> bool {
    applied.iter().any(|m| {
        let key = m.key();
        if key.namespace().is_empty() {
            key.is_same_object(&live.with_namespace(""))
        } else {
            key.is_same_object(live)
        }
    })
}

/// Fail when there is nothing to deploy
fn require_manifests(manifests: &[Manifest]) -> Result<()> {
    if manifests.is_empty() {
        return Err(KubeError::InvalidManifest(
            "this application has no Kubernetes manifests to handle".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(namespace: Option<&str>) -> Manifest {
        let mut metadata = serde_json::json!({"name": "web"});
        if let Some(ns) = namespace {
            metadata["namespace"] = serde_json::json!(ns);
        }
        Manifest::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn test_is_applied() {
        let live = ResourceKey::new("apps/v1", "Deployment", "prod", "web");
        assert!(is_applied(&live, &[manifest(None)]));
        assert!(is_applied(&live, &[manifest(Some("prod"))]));
        assert!(!is_applied(&live, &[manifest(Some("staging"))]));
        assert!(!is_applied(&live.with_name("api"), &[manifest(None)]));
    }
}
