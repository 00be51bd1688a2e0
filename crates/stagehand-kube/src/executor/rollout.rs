use stagehand_core::{Manifest, ResourceKey, StageKind, Variant, VariantRolloutStageOptions};

use super::Executor;
use crate::error::Result;
use crate::signal::StopSignal;
use crate::variant::{VariantSpec, generate_variant_manifests, replicas_calculator};

fn rollout_stage(variant: Variant) -> StageKind {
    match variant {
        Variant::Baseline => StageKind::BaselineRollout,
        _ => StageKind::CanaryRollout,
    }
}

impl Executor {
    /// Create or update the variant's copy of the application
    pub(super) async fn ensure_variant_rollout(
        &self,
        variant: Variant,
        signal: &StopSignal,
    ) -> Result<()> {
        let options: VariantRolloutStageOptions =
            self.stage_options(rollout_stage(variant), true)?;

        let (manifests, commit) = self.variant_source(variant).await?;
        let mut generated = self.generate_variant(&manifests, variant, &options)?;
        self.log.info(&format!(
            "Generated {} manifests for {} variant",
            generated.len(),
            variant
        ));

        self.annotations(variant, &commit).apply(&mut generated)?;
        self.apply(generated, signal).await
    }

    /// Remove every resource created by the variant's rollout
    pub(super) async fn ensure_variant_clean(
        &self,
        variant: Variant,
        signal: &StopSignal,
    ) -> Result<()> {
        let options: VariantRolloutStageOptions =
            self.stage_options(rollout_stage(variant), false)?;

        let (manifests, _) = self.variant_source(variant).await?;
        let keys: Vec<ResourceKey> = self
            .generate_variant(&manifests, variant, &options)?
            .iter()
            .map(|m| m.key().clone())
            .collect();

        self.delete(&keys, signal).await
    }

    /// Canary is built from the trigger commit, baseline from the running one
    pub(super) async fn variant_source(&self, variant: Variant) -> Result<(Vec<Manifest>, String)> {
        match variant {
            Variant::Baseline => Ok((
                self.load_running_manifests().await?,
                self.running_commit().to_string(),
            )),
            _ => Ok((
                self.load_manifests().await?,
                self.trigger_commit().to_string(),
            )),
        }
    }

    fn generate_variant(
        &self,
        manifests: &[Manifest],
        variant: Variant,
        options: &VariantRolloutStageOptions,
    ) -> Result<Vec<Manifest>> {
        let suffix = options.suffix_for(variant);
        let calculator = replicas_calculator(options.replicas);
        let spec = VariantSpec {
            variant,
            suffix: &suffix,
            workloads: &self.config().workloads,
            service: options.create_service.then_some(&self.config().service),
            replicas: Some(calculator.as_ref()),
        };
        generate_variant_manifests(manifests, &spec)
    }
}
