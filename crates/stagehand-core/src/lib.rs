//! Stagehand Core - Core types for progressive delivery on Kubernetes
//!
//! This crate provides the foundational types used throughout stagehand:
//! - `ResourceKey`: Identity of a cluster resource
//! - `Manifest`: A structured object document bound to its key
//! - `Variant`: Primary, canary and baseline copies of a workload
//! - `DeploymentSpec`: Deployment configuration and per-stage options

pub mod config;
pub mod error;
pub mod key;
pub mod manifest;
pub mod variant;

pub use config::{
    DeploymentSpec, InputConfig, PrimaryRolloutStageOptions, Replicas, ResourceRef, StageConfig,
    StageKind, SyncStageOptions, TrafficPercentages, TrafficRoutingConfig, TrafficRoutingMethod,
    TrafficRoutingStageOptions, VariantRolloutStageOptions,
};
pub use error::{CoreError, Result};
pub use key::{KIND_CONFIG_MAP, KIND_DEPLOYMENT, KIND_SECRET, KIND_SERVICE, ResourceKey};
pub use manifest::Manifest;
pub use variant::{
    AGENT_ANNOTATION, APPLICATION_LABEL, COMMIT_HASH_ANNOTATION, MANAGED_BY_LABEL,
    MANAGED_BY_STAGEHAND, ORIGINAL_API_VERSION_ANNOTATION, RESOURCE_KEY_ANNOTATION, VARIANT_LABEL,
    Variant, suffixed_name,
};
