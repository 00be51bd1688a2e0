use stagehand_core::{ResourceKey, Variant};

use super::Executor;
use crate::error::{KubeError, Result};
use crate::guard::ensure_variant_selector;
use crate::select::is_workload;
use crate::signal::StopSignal;

impl Executor {
    /// Restore the running commit and remove canary and baseline resources
    pub(super) async fn ensure_rollback(&self, signal: &StopSignal) -> Result<()> {
        if self.running_commit().is_empty() {
            self.log.error(
                "Unable to determine the last deployed commit to rollback. It seems this is the first deployment.",
            );
            return Err(KubeError::NoRunningRevision);
        }

        let mut manifests = self.load_running_manifests().await?;
        if self.config().quick_sync.add_variant_label_to_selector {
            for manifest in manifests.iter_mut() {
                if is_workload(manifest.key(), &self.config().workloads) {
                    ensure_variant_selector(manifest, Variant::Primary)?;
                }
            }
        }

        self.annotations(Variant::Primary, self.running_commit())
            .apply(&mut manifests)?;
        self.apply(manifests, signal).await?;

        let variants: Vec<ResourceKey> = self
            .cluster
            .list_managed(self.app_id())
            .await?
            .into_iter()
            .filter(|live| matches!(live.variant, Some(Variant::Canary | Variant::Baseline)))
            .map(|live| live.key)
            .collect();

        self.log.info(&format!(
            "Deleting {} canary and baseline resources",
            variants.len()
        ));
        self.delete(&variants, signal).await
    }
}
