//! Error types for stagehand-kube

use stagehand_core::{CoreError, ResourceKey};
use thiserror::Error;

/// Result type for stagehand-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while executing a stage
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Resource is absent from the cluster
    #[error("resource {key} not found")]
    NotFound { key: String },

    /// Cluster rejected an operation (non-API failures, injected failures)
    #[error("cluster error: {0}")]
    Cluster(String),

    /// Workload kind the variant generator cannot handle
    #[error("unsupported workload kind {kind}")]
    UnsupportedWorkloadKind { kind: String },

    /// Stage name not known to this executor
    #[error("unsupported stage {name} for kubernetes application")]
    UnsupportedStage { name: String },

    /// Traffic routing method without an adapter
    #[error("unsupported traffic routing method {method}\nHint: register a traffic router for this method")]
    UnsupportedRoutingMethod { method: String },

    /// No previous successful deployment to read state from
    #[error("unable to determine running commit\nHint: this stage needs a previously deployed revision; it cannot run on the first deployment")]
    NoRunningRevision,

    /// Workload selector does not isolate the expected variant
    #[error("invalid variant selector in {key}: {message}")]
    SelectorViolation { key: String, message: String },

    /// Apply failed; earlier manifests may remain applied
    #[error("failed to apply {key}: {message}")]
    ApplyFailed { key: String, message: String },

    /// Aggregate delete failure
    #[error("{failed} of {total} resources failed to delete")]
    DeleteFailed { failed: usize, total: usize },

    /// Manifest source failure
    #[error("failed to load manifests: {0}")]
    Load(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid manifest
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stop signal observed before the work completed
    #[error("stage was stopped before completion")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<CoreError> for KubeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidConfig { message } => KubeError::InvalidConfig(message),
            CoreError::Io(e) => KubeError::Io(e),
            CoreError::UnknownStage { name } => KubeError::UnsupportedStage { name },
            other => KubeError::InvalidManifest(other.to_string()),
        }
    }
}

impl KubeError {
    pub fn not_found(key: &ResourceKey) -> Self {
        KubeError::NotFound {
            key: key.to_string(),
        }
    }

    /// Check if this is a "resource absent" condition
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::NotFound { .. } => true,
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}
