use stagehand_core::{
    KIND_SERVICE, PrimaryRolloutStageOptions, ResourceKey, StageKind, Variant,
};

use super::{Executor, require_manifests};
use crate::error::{KubeError, Result};
use crate::guard::{check_variant_selector, ensure_variant_selector};
use crate::select::{find_manifests, is_workload};
use crate::signal::StopSignal;
use crate::variant::generate_variant_service_manifests;

impl Executor {
    /// Roll the trigger commit out as the primary variant
    pub(super) async fn ensure_primary_rollout(&self, signal: &StopSignal) -> Result<()> {
        let options: PrimaryRolloutStageOptions =
            self.stage_options(StageKind::PrimaryRollout, false)?;

        let mut manifests = self.load_manifests().await?;
        require_manifests(&manifests)?;

        for manifest in manifests.iter_mut() {
            if !is_workload(manifest.key(), &self.config().workloads) {
                continue;
            }
            if options.add_variant_label_to_selector {
                ensure_variant_selector(manifest, Variant::Primary)?;
            } else {
                check_variant_selector(manifest, Variant::Primary)?;
            }
        }

        if options.create_service {
            let name = &self.config().service.name;
            let services = find_manifests(&manifests, KIND_SERVICE, name);
            if services.is_empty() {
                return Err(KubeError::InvalidManifest(format!(
                    "unable to find any service for name={:?}",
                    name
                )));
            }
            let suffix = if options.suffix.is_empty() {
                Variant::Primary.as_str()
            } else {
                options.suffix.as_str()
            };
            manifests.extend(generate_variant_service_manifests(
                &services,
                Variant::Primary,
                suffix,
            )?);
        }

        self.annotations(Variant::Primary, self.trigger_commit())
            .apply(&mut manifests)?;
        self.apply(manifests.clone(), signal).await?;

        if !options.prune {
            return Ok(());
        }

        let running = match self.load_running_manifests().await {
            Ok(running) => running,
            Err(KubeError::NoRunningRevision) => {
                self.log
                    .info("Resource GC was skipped because there is no running revision");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let removed: Vec<ResourceKey> = running
            .iter()
            .map(|m| m.key())
            .filter(|key| !manifests.iter().any(|m| m.key().is_same_object(key)))
            .cloned()
            .collect();

        self.delete(&removed, signal).await
    }
}
