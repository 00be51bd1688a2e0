//! Render command - print the manifests a variant rollout would apply

use std::path::Path;

use stagehand_core::{
    Manifest, StageKind, Variant, VariantRolloutStageOptions,
};
use stagehand_kube::{
    ManifestSource, RevisionCheckout, VariantSpec, ensure_variant_selector,
    generate_variant_manifests, is_workload, replicas_calculator,
};

use super::{directory_source, load_config};
use crate::error::{CliError, Result};

pub async fn run(
    config_path: &Path,
    app_dir: &Path,
    variant: Variant,
    suffix: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let manifests = directory_source(&config, config_path, app_dir)
        .load_manifests(&RevisionCheckout::new("", app_dir))
        .await
        .map_err(CliError::manifest)?;

    let rendered = match variant {
        Variant::Primary => {
            let mut manifests = manifests;
            if config.quick_sync.add_variant_label_to_selector {
                for manifest in manifests.iter_mut() {
                    if is_workload(manifest.key(), &config.workloads) {
                        ensure_variant_selector(manifest, Variant::Primary)
                            .map_err(CliError::manifest)?;
                    }
                }
            }
            manifests
        }
        _ => {
            let stage = if variant == Variant::Canary {
                StageKind::CanaryRollout
            } else {
                StageKind::BaselineRollout
            };
            let options: VariantRolloutStageOptions = match config.stage(stage) {
                Some(stage) => stage.options().map_err(CliError::config)?,
                None => VariantRolloutStageOptions::default(),
            };

            let suffix = suffix
                .map(String::from)
                .unwrap_or_else(|| options.suffix_for(variant));
            let calculator = replicas_calculator(options.replicas);
            let spec = VariantSpec {
                variant,
                suffix: &suffix,
                workloads: &config.workloads,
                service: options.create_service.then_some(&config.service),
                replicas: Some(calculator.as_ref()),
            };
            generate_variant_manifests(&manifests, &spec).map_err(CliError::manifest)?
        }
    };

    print!("{}", to_documents(&rendered)?);
    Ok(())
}

/// Multi-document YAML stream
pub fn to_documents(manifests: &[Manifest]) -> Result<String> {
    let mut out = String::new();
    for manifest in manifests {
        out.push_str("---\n");
        out.push_str(&manifest.to_yaml().map_err(CliError::manifest)?);
    }
    Ok(out)
}
