//! Dependency ordering for apply
//!
//! Manifests are applied one at a time and the first failure stops the run,
//! so prerequisites (CRDs, namespaces, config) must come before the objects
//! that consume them.

use stagehand_core::{Manifest, ResourceKey};

/// API groups served by Kubernetes itself
const BUILTIN_GROUPS: &[&str] = &[
    "",
    "apps",
    "batch",
    "autoscaling",
    "policy",
    "networking.k8s.io",
    "rbac.authorization.k8s.io",
    "storage.k8s.io",
    "admissionregistration.k8s.io",
    "apiextensions.k8s.io",
    "certificates.k8s.io",
    "coordination.k8s.io",
    "discovery.k8s.io",
    "events.k8s.io",
    "flowcontrol.apiserver.k8s.io",
    "node.k8s.io",
    "scheduling.k8s.io",
];

/// Apply phase of a resource, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceCategory {
    Crd = 0,
    Namespace = 1,
    /// ResourceQuota, LimitRange
    NamespaceConfig = 2,
    ClusterRbac = 10,
    /// Role, RoleBinding, ServiceAccount
    NamespacedRbac = 11,
    Config = 20,
    Storage = 21,
    Network = 30,
    Workload = 40,
    Batch = 50,
    Autoscaling = 60,
    CustomResource = 70,
    Other = 100,
}

impl ResourceCategory {
    pub fn of(key: &ResourceKey) -> Self {
        match key.kind() {
            "CustomResourceDefinition" => Self::Crd,
            "Namespace" => Self::Namespace,
            "ResourceQuota" | "LimitRange" => Self::NamespaceConfig,
            "ClusterRole" | "ClusterRoleBinding" => Self::ClusterRbac,
            "Role" | "RoleBinding" | "ServiceAccount" => Self::NamespacedRbac,
            "ConfigMap" | "Secret" => Self::Config,
            "PersistentVolume" | "PersistentVolumeClaim" | "StorageClass" => Self::Storage,
            "NetworkPolicy" | "Service" | "Endpoints" | "Ingress" | "IngressClass" => Self::Network,
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod" => Self::Workload,
            "Job" | "CronJob" => Self::Batch,
            "HorizontalPodAutoscaler" | "VerticalPodAutoscaler" | "PodDisruptionBudget" => {
                Self::Autoscaling
            }
            _ if is_custom_group(key.group()) => Self::CustomResource,
            _ => Self::Other,
        }
    }
}

fn is_custom_group(group: &str) -> bool {
    !BUILTIN_GROUPS.contains(&group)
}

/// Stable sort into apply order; manifests of one category keep source order
pub fn sort_for_apply(mut manifests: Vec<Manifest>) -> Vec<Manifest> {
    manifests.sort_by_key(|m| ResourceCategory::of(m.key()));
    manifests
}
