//! Variant manifest generation
//!
//! Produces a self-consistent copy of an application's workloads for one
//! variant. Generated workloads carry the variant label on their pod
//! template and selector, and their volumes point at the variant's own
//! renamed ConfigMaps and Secrets. Generated Services select only the
//! variant's pods and are never reachable from outside the cluster.
//!
//! Generation is deterministic: identical inputs give identical output.

use std::collections::HashSet;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PodTemplateSpec, Service};
use stagehand_core::{
    KIND_SERVICE, Manifest, Replicas, ResourceRef, VARIANT_LABEL, Variant, suffixed_name,
};

use crate::codec::{Workload, decode_service, encode_service};
use crate::error::{KubeError, Result};
use crate::select::{
    find_config_map_manifests, find_manifests, find_secret_manifests, find_workload_manifests,
};

/// Computes a workload's replica count from its current one
pub type ReplicasCalculator = dyn Fn(Option<i32>) -> i32 + Send + Sync;

/// Replicas calculator for rollout stages: an unset count becomes 1
pub fn replicas_calculator(replicas: Replicas) -> Box<ReplicasCalculator> {
    Box::new(move |current| match current {
        None => 1,
        Some(current) => replicas.calculate(current, 1),
    })
}

/// What to generate for one variant
pub struct VariantSpec<'a> {
    pub variant: Variant,
    pub suffix: &'a str,
    /// Workload references (empty = all Deployments)
    pub workloads: &'a [ResourceRef],
    /// Generate a variant Service from this one
    pub service: Option<&'a ResourceRef>,
    /// Leave replicas untouched when absent
    pub replicas: Option<&'a ReplicasCalculator>,
}

/// Generate the full variant set: Services, ConfigMaps, Secrets, then workloads
pub fn generate_variant_manifests(
    manifests: &[Manifest],
    spec: &VariantSpec<'_>,
) -> Result<Vec<Manifest>> {
    let workloads = find_workload_manifests(manifests, spec.workloads);
    if workloads.is_empty() {
        return Err(KubeError::InvalidManifest(format!(
            "unable to find any workload manifests for {} variant",
            spec.variant
        )));
    }

    let mut generated = Vec::new();

    if let Some(service) = spec.service {
        let services = find_manifests(manifests, KIND_SERVICE, &service.name);
        if services.is_empty() {
            return Err(KubeError::InvalidManifest(format!(
                "unable to find any service for name={:?}",
                service.name
            )));
        }
        generated.extend(generate_variant_service_manifests(
            &services,
            spec.variant,
            spec.suffix,
        )?);
    }

    let config_maps = find_config_map_manifests(manifests);
    let secrets = find_secret_manifests(manifests);
    generated.extend(duplicate_manifests(&config_maps, spec.suffix));
    generated.extend(duplicate_manifests(&secrets, spec.suffix));

    generated.extend(generate_variant_workload_manifests(
        &workloads,
        &config_maps,
        &secrets,
        spec.variant,
        spec.suffix,
        spec.replicas,
    )?);

    Ok(generated)
}

/// Deep copies renamed with `-suffix`
pub fn duplicate_manifests(manifests: &[Manifest], suffix: &str) -> Vec<Manifest> {
    manifests
        .iter()
        .map(|m| m.duplicate(&suffixed_name(m.key().name(), suffix)))
        .collect()
}

/// Cluster-internal Services selecting only `variant` pods
pub fn generate_variant_service_manifests(
    services: &[Manifest],
    variant: Variant,
    suffix: &str,
) -> Result<Vec<Manifest>> {
    services
        .iter()
        .map(|m| {
            let mut service = decode_service(m)?;
            update_service(&mut service, variant, suffix);
            encode_service(&service)
        })
        .collect()
}

fn update_service(service: &mut Service, variant: Variant, suffix: &str) {
    if let Some(name) = service.metadata.name.as_mut() {
        *name = suffixed_name(name, suffix);
    }

    let spec = service.spec.get_or_insert_with(Default::default);
    spec.type_ = Some("ClusterIP".to_string());
    spec.selector
        .get_or_insert_with(Default::default)
        .insert(VARIANT_LABEL.to_string(), variant.as_str().to_string());

    // Only the primary Service may be externally reachable
    spec.external_ips = None;
    spec.load_balancer_ip = None;
    spec.load_balancer_source_ranges = None;
}

/// Variant copies of `workloads`
///
/// Volumes referencing a ConfigMap or Secret from `config_maps`/`secrets`
/// are rewired to the suffixed copy; references to anything else are left
/// alone. Unsupported workload kinds are an error.
pub fn generate_variant_workload_manifests(
    workloads: &[Manifest],
    config_maps: &[Manifest],
    secrets: &[Manifest],
    variant: Variant,
    suffix: &str,
    replicas: Option<&ReplicasCalculator>,
) -> Result<Vec<Manifest>> {
    let rewire = VolumeRewire {
        config_maps: config_maps.iter().map(|m| m.key().name()).collect(),
        secrets: secrets.iter().map(|m| m.key().name()).collect(),
        suffix,
    };

    workloads
        .iter()
        .map(|m| match Workload::decode(m)? {
            Workload::Deployment {
                mut deployment,
                api_version,
            } => {
                update_deployment(&mut deployment, variant, &rewire, replicas);
                Workload::Deployment {
                    deployment,
                    api_version,
                }
                .encode()
            }
            Workload::Unsupported { kind } => Err(KubeError::UnsupportedWorkloadKind { kind }),
        })
        .collect()
}

struct VolumeRewire<'a> {
    config_maps: HashSet<&'a str>,
    secrets: HashSet<&'a str>,
    suffix: &'a str,
}

fn update_deployment(
    deployment: &mut Deployment,
    variant: Variant,
    rewire: &VolumeRewire<'_>,
    replicas: Option<&ReplicasCalculator>,
) {
    if let Some(name) = deployment.metadata.name.as_mut() {
        *name = suffixed_name(name, rewire.suffix);
    }

    let spec = deployment.spec.get_or_insert_with(Default::default);
    if let Some(calculate) = replicas {
        spec.replicas = Some(calculate(spec.replicas));
    }

    spec.selector
        .match_labels
        .get_or_insert_with(Default::default)
        .insert(VARIANT_LABEL.to_string(), variant.as_str().to_string());

    update_pod_template(&mut spec.template, variant, rewire);
}

fn update_pod_template(pod: &mut PodTemplateSpec, variant: Variant, rewire: &VolumeRewire<'_>) {
    pod.metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default)
        .insert(VARIANT_LABEL.to_string(), variant.as_str().to_string());

    let Some(volumes) = pod.spec.as_mut().and_then(|s| s.volumes.as_mut()) else {
        return;
    };

    for volume in volumes {
        if let Some(config_map) = volume.config_map.as_mut() {
            if rewire.config_maps.contains(config_map.name.as_str()) {
                config_map.name = suffixed_name(&config_map.name, rewire.suffix);
            }
        }
        if let Some(name) = volume.secret.as_mut().and_then(|s| s.secret_name.as_mut()) {
            if rewire.secrets.contains(name.as_str()) {
                *name = suffixed_name(name, rewire.suffix);
            }
        }
    }
}
