//! Stagehand Kube - Progressive delivery stages for Kubernetes applications
//!
//! This crate provides:
//! - **Manifest Cache**: Revision-keyed, application-scoped cache of loaded manifests
//! - **Selectors**: Order-preserving filters over manifest sets
//! - **Variant Generation**: Isolated canary/baseline copies of workloads, config and Services
//! - **Annotator**: Bookkeeping labels and annotations on every applied manifest
//! - **Selector Guard**: Checks and injects the variant label in workload selectors
//! - **Reconciler**: Fail-fast apply and best-effort delete against a cluster
//! - **Executor**: The stage dispatcher tying it all together

pub mod annotate;
pub mod cache;
pub mod cluster;
pub mod codec;
pub mod error;
pub mod executor;
pub mod guard;
pub mod mock;
pub mod order;
pub mod progress;
pub mod reconcile;
pub mod routing;
pub mod select;
pub mod signal;
pub mod source;
pub mod variant;

pub use annotate::BuiltinAnnotations;
pub use cache::{AppManifestsCache, DEFAULT_CAPACITY, ManifestCache};
pub use cluster::{ClusterClient, KubeCluster, LiveResource};
pub use codec::Workload;
pub use error::{KubeError, Result};
pub use executor::{DeploymentInfo, Executor, StageInput};
pub use guard::{check_variant_selector, ensure_variant_selector};
pub use mock::{MockCluster, OperationCounts};
pub use order::{ResourceCategory, sort_for_apply};
pub use progress::{ConsoleLog, LogLevel, LogLine, LogPersister, MemoryLog};
pub use reconcile::{DeleteSummary, Reconciler};
pub use routing::{PodSelectorRouter, TrafficRouter};
pub use select::{
    find_config_map_manifests, find_manifests, find_secret_manifests, find_workload_manifests,
    is_workload,
};
pub use signal::{
    StageStatus, StopHandle, StopSignal, StopSignalType, determine_stage_status, stop_signal,
};
pub use source::{DirectorySource, ManifestSource, RevisionCheckout};
pub use variant::{
    ReplicasCalculator, VariantSpec, duplicate_manifests, generate_variant_manifests,
    generate_variant_service_manifests, generate_variant_workload_manifests, replicas_calculator,
};
