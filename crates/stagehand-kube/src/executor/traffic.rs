use stagehand_core::{
    Manifest, PrimaryRolloutStageOptions, StageKind, TrafficRoutingStageOptions, Variant,
    VariantRolloutStageOptions,
};

use super::Executor;
use crate::error::Result;
use crate::guard::{check_variant_selector, ensure_variant_selector};
use crate::select::{find_config_map_manifests, find_secret_manifests, find_workload_manifests};
use crate::signal::StopSignal;
use crate::variant::generate_variant_workload_manifests;

impl Executor {
    /// Shift traffic between the variants
    pub(super) async fn ensure_traffic_routing(&self, signal: &StopSignal) -> Result<()> {
        let options: TrafficRoutingStageOptions =
            self.stage_options(StageKind::TrafficRouting, true)?;
        let percentages = options.percentages()?;
        let router = self.router_for()?;

        self.log.info(&format!(
            "Routing traffic with {}: primary={}%, canary={}%, baseline={}%",
            router.method(),
            percentages.primary,
            percentages.canary,
            percentages.baseline
        ));

        let manifests = self.load_manifests().await?;
        for variant in percentages.receiving() {
            self.check_receiving_variant(&manifests, variant).await?;
        }

        let mut routed = router.generate(&manifests, self.config(), percentages)?;
        self.annotations(Variant::Primary, self.trigger_commit())
            .apply(&mut routed)?;
        self.apply(routed, signal).await
    }

    /// Traffic may only go to workloads whose selector isolates the variant
    async fn check_receiving_variant(&self, manifests: &[Manifest], variant: Variant) -> Result<()> {
        let workloads = match variant {
            Variant::Primary => {
                let mut workloads = find_workload_manifests(manifests, &self.config().workloads);
                if self.injects_primary_label()? {
                    for workload in workloads.iter_mut() {
                        ensure_variant_selector(workload, Variant::Primary)?;
                    }
                }
                workloads
            }
            _ => {
                let stage = match variant {
                    Variant::Baseline => StageKind::BaselineRollout,
                    _ => StageKind::CanaryRollout,
                };
                let options: VariantRolloutStageOptions = self.stage_options(stage, false)?;
                let (source, _) = self.variant_source(variant).await?;
                generate_variant_workload_manifests(
                    &find_workload_manifests(&source, &self.config().workloads),
                    &find_config_map_manifests(&source),
                    &find_secret_manifests(&source),
                    variant,
                    &options.suffix_for(variant),
                    None,
                )?
            }
        };

        for workload in &workloads {
            check_variant_selector(workload, variant)?;
        }
        Ok(())
    }

    /// Whether primary workloads get the variant label injected when applied
    fn injects_primary_label(&self) -> Result<bool> {
        let primary: PrimaryRolloutStageOptions =
            self.stage_options(StageKind::PrimaryRollout, false)?;
        Ok(self.config().quick_sync.add_variant_label_to_selector
            || primary.add_variant_label_to_selector)
    }
}
