//! Order-preserving filters over a manifest set
//!
//! None of these mutate their input; an empty result is not an error.

use stagehand_core::{KIND_DEPLOYMENT, Manifest, ResourceKey, ResourceRef};

/// Manifests of `kind`, optionally restricted to an exact `name` (empty = any)
pub fn find_manifests(manifests: &[Manifest], kind: &str, name: &str) -> Vec<Manifest> {
    manifests
        .iter()
        .filter(|m| matches_ref(m.key(), kind, name))
        .cloned()
        .collect()
}

pub fn find_config_map_manifests(manifests: &[Manifest]) -> Vec<Manifest> {
    manifests
        .iter()
        .filter(|m| m.key().is_config_map())
        .cloned()
        .collect()
}

pub fn find_secret_manifests(manifests: &[Manifest]) -> Vec<Manifest> {
    manifests
        .iter()
        .filter(|m| m.key().is_secret())
        .cloned()
        .collect()
}

/// Workloads named by `refs`, or every Deployment when `refs` is empty
///
/// Results follow the order of `refs`, then manifest order within a ref.
pub fn find_workload_manifests(manifests: &[Manifest], refs: &[ResourceRef]) -> Vec<Manifest> {
    if refs.is_empty() {
        return find_manifests(manifests, KIND_DEPLOYMENT, "");
    }

    refs.iter()
        .flat_map(|r| find_manifests(manifests, r.workload_kind(), &r.name))
        .collect()
}

/// Whether `key` is one of the workloads selected by `refs`
pub fn is_workload(key: &ResourceKey, refs: &[ResourceRef]) -> bool {
    if refs.is_empty() {
        return key.is_deployment();
    }
    refs.iter()
        .any(|r| matches_ref(key, r.workload_kind(), &r.name))
}

fn matches_ref(key: &ResourceKey, kind: &str, name: &str) -> bool {
    key.kind() == kind && (name.is_empty() || key.name() == name)
}
