use stagehand_core::{ResourceKey, StageKind, SyncStageOptions, Variant};

use super::{Executor, is_applied, require_manifests};
use crate::error::Result;
use crate::guard::ensure_variant_selector;
use crate::select::is_workload;
use crate::signal::StopSignal;

impl Executor {
    /// Apply the whole manifest set as the primary variant
    pub(super) async fn ensure_sync(&self, signal: &StopSignal) -> Result<()> {
        let options: SyncStageOptions = match self.configured_stage(StageKind::Sync) {
            Some(stage) => stage.options()?,
            None => self.config().quick_sync.clone(),
        };

        let mut manifests = self.load_manifests().await?;
        require_manifests(&manifests)?;

        if options.add_variant_label_to_selector {
            for manifest in manifests.iter_mut() {
                if is_workload(manifest.key(), &self.config().workloads) {
                    ensure_variant_selector(manifest, Variant::Primary)?;
                }
            }
        }

        self.annotations(Variant::Primary, self.trigger_commit())
            .apply(&mut manifests)?;
        self.apply(manifests.clone(), signal).await?;

        if !options.prune {
            self.log
                .info("Resource GC was skipped because prune was not configured");
            return Ok(());
        }

        self.log.info("Start finding all running resources that are no longer defined");
        let removed: Vec<ResourceKey> = self
            .cluster
            .list_managed(self.app_id())
            .await?
            .into_iter()
            .map(|live| live.key)
            .filter(|key| !is_applied(key, &manifests))
            .collect();

        self.delete(&removed, signal).await
    }
}
