//! Deployment configuration
//!
//! The configuration describes where an application's manifests live,
//! which workloads and Service take part in progressive delivery, and the
//! options of each pipeline stage.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};
use crate::key::KIND_DEPLOYMENT;
use crate::variant::Variant;

/// Deployment configuration of a Kubernetes application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Where to find the manifests
    #[serde(default)]
    pub input: InputConfig,

    /// Workloads taking part in progressive delivery (default: all Deployments)
    #[serde(default)]
    pub workloads: Vec<ResourceRef>,

    /// Service used for variant Services and pod-selector routing
    #[serde(default)]
    pub service: ResourceRef,

    /// Options applied by sync and rollback
    #[serde(default)]
    pub quick_sync: SyncStageOptions,

    #[serde(default)]
    pub traffic_routing: TrafficRoutingConfig,

    /// Pipeline stages and their options
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl DeploymentSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First configured stage of the given kind
    pub fn stage(&self, kind: StageKind) -> Option<&StageConfig> {
        self.stages
            .iter()
            .find(|s| s.name.parse::<StageKind>().ok() == Some(kind))
    }
}

/// Manifest input settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    /// Manifest files relative to the application directory
    #[serde(default)]
    pub manifests: Vec<String>,

    /// Namespace forced onto every manifest
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Reference to a resource by kind and name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Kind, defaulting to Deployment when unspecified
    pub fn workload_kind(&self) -> &str {
        if self.kind.is_empty() {
            KIND_DEPLOYMENT
        } else {
            &self.kind
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficRoutingConfig {
    #[serde(default)]
    pub method: TrafficRoutingMethod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficRoutingMethod {
    /// Switch the Service selector between variants
    #[default]
    PodSelector,
    Istio,
    Smi,
}

impl fmt::Display for TrafficRoutingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrafficRoutingMethod::PodSelector => "podselector",
            TrafficRoutingMethod::Istio => "istio",
            TrafficRoutingMethod::Smi => "smi",
        };
        f.write_str(name)
    }
}

/// A stage entry in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    #[serde(default)]
    pub with: serde_json::Value,
}

impl StageConfig {
    /// Decode the stage options, using defaults when `with` is absent
    pub fn options<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.with.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.with.clone()).map_err(|e| CoreError::InvalidConfig {
            message: format!("malformed options for stage {}: {}", self.name, e),
        })
    }
}

/// The stages this engine knows how to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Sync,
    PrimaryRollout,
    CanaryRollout,
    CanaryClean,
    BaselineRollout,
    BaselineClean,
    TrafficRouting,
    Rollback,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        StageKind::Sync,
        StageKind::PrimaryRollout,
        StageKind::CanaryRollout,
        StageKind::CanaryClean,
        StageKind::BaselineRollout,
        StageKind::BaselineClean,
        StageKind::TrafficRouting,
        StageKind::Rollback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Sync => "K8S_SYNC",
            StageKind::PrimaryRollout => "K8S_PRIMARY_ROLLOUT",
            StageKind::CanaryRollout => "K8S_CANARY_ROLLOUT",
            StageKind::CanaryClean => "K8S_CANARY_CLEAN",
            StageKind::BaselineRollout => "K8S_BASELINE_ROLLOUT",
            StageKind::BaselineClean => "K8S_BASELINE_CLEAN",
            StageKind::TrafficRouting => "K8S_TRAFFIC_ROUTING",
            StageKind::Rollback => "ROLLBACK",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = CoreError;

    /// Accepts both `canary-rollout` and `K8S_CANARY_ROLLOUT`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        let normalized = normalized.strip_prefix("K8S_").unwrap_or(&normalized);

        match normalized {
            "SYNC" => Ok(StageKind::Sync),
            "PRIMARY_ROLLOUT" => Ok(StageKind::PrimaryRollout),
            "CANARY_ROLLOUT" => Ok(StageKind::CanaryRollout),
            "CANARY_CLEAN" => Ok(StageKind::CanaryClean),
            "BASELINE_ROLLOUT" => Ok(StageKind::BaselineRollout),
            "BASELINE_CLEAN" => Ok(StageKind::BaselineClean),
            "TRAFFIC_ROUTING" => Ok(StageKind::TrafficRouting),
            "ROLLBACK" => Ok(StageKind::Rollback),
            _ => Err(CoreError::UnknownStage {
                name: s.to_string(),
            }),
        }
    }
}

/// Options of the sync stage (also used by quick sync and rollback)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStageOptions {
    /// Inject the primary variant label into workload selectors
    #[serde(default)]
    pub add_variant_label_to_selector: bool,

    /// Delete live resources no longer defined in the manifests
    #[serde(default)]
    pub prune: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryRolloutStageOptions {
    /// Suffix for generated primary Services (`primary` when empty)
    #[serde(default)]
    pub suffix: String,

    #[serde(default)]
    pub create_service: bool,

    #[serde(default)]
    pub add_variant_label_to_selector: bool,

    #[serde(default)]
    pub prune: bool,
}

/// Options of the canary and baseline rollout stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRolloutStageOptions {
    #[serde(default)]
    pub replicas: Replicas,

    /// Name suffix (defaults to the variant name)
    #[serde(default)]
    pub suffix: String,

    #[serde(default)]
    pub create_service: bool,
}

impl VariantRolloutStageOptions {
    pub fn suffix_for(&self, variant: Variant) -> String {
        if self.suffix.is_empty() {
            variant.as_str().to_string()
        } else {
            self.suffix.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRoutingStageOptions {
    /// Send all traffic to one variant
    #[serde(default)]
    pub all: Option<Variant>,

    #[serde(default)]
    pub primary: u32,

    #[serde(default)]
    pub canary: u32,

    #[serde(default)]
    pub baseline: u32,
}

/// Traffic split between the three variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficPercentages {
    pub primary: u32,
    pub canary: u32,
    pub baseline: u32,
}

impl TrafficPercentages {
    pub fn of(&self, variant: Variant) -> u32 {
        match variant {
            Variant::Primary => self.primary,
            Variant::Canary => self.canary,
            Variant::Baseline => self.baseline,
        }
    }

    /// Variants receiving any traffic
    pub fn receiving(&self) -> Vec<Variant> {
        [Variant::Primary, Variant::Canary, Variant::Baseline]
            .into_iter()
            .filter(|v| self.of(*v) > 0)
            .collect()
    }
}

impl TrafficRoutingStageOptions {
    /// Resolve and validate the split
    pub fn percentages(&self) -> Result<TrafficPercentages> {
        let percentages = match self.all {
            Some(Variant::Primary) => TrafficPercentages {
                primary: 100,
                ..Default::default()
            },
            Some(Variant::Canary) => TrafficPercentages {
                canary: 100,
                ..Default::default()
            },
            Some(Variant::Baseline) => TrafficPercentages {
                baseline: 100,
                ..Default::default()
            },
            None => TrafficPercentages {
                primary: self.primary,
                canary: self.canary,
                baseline: self.baseline,
            },
        };

        let total = u64::from(percentages.primary)
            + u64::from(percentages.canary)
            + u64::from(percentages.baseline);
        if total != 100 {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "traffic percentages must add up to 100 (primary={}, canary={}, baseline={})",
                    percentages.primary, percentages.canary, percentages.baseline
                ),
            });
        }
        Ok(percentages)
    }
}

/// Replica count, absolute (`2`) or relative to the current count (`"20%"`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Replicas {
    pub number: i32,
    pub is_percentage: bool,
}

impl Replicas {
    pub fn absolute(number: i32) -> Self {
        Self {
            number,
            is_percentage: false,
        }
    }

    pub fn percentage(number: i32) -> Self {
        Self {
            number,
            is_percentage: true,
        }
    }

    fn validate(self) -> Result<Self> {
        if self.number < 0 {
            return Err(CoreError::InvalidConfig {
                message: format!("replicas must not be negative, got {}", self),
            });
        }
        Ok(self)
    }

    /// Resolve against `total`; an unset value resolves to `default`
    ///
    /// Negative inputs count as zero and the result saturates at `i32::MAX`.
    pub fn calculate(&self, total: i32, default: i32) -> i32 {
        if self.number == 0 {
            return default;
        }
        if !self.is_percentage {
            return self.number.max(0);
        }
        let scaled = i64::from(self.number.max(0)) * i64::from(total.max(0));
        // ceil for non-negative values
        i32::try_from((scaled + 99) / 100).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for Replicas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_percentage {
            write!(f, "{}%", self.number)
        } else {
            write!(f, "{}", self.number)
        }
    }
}

impl FromStr for Replicas {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CoreError::InvalidConfig {
            message: format!("invalid replicas value '{}'", s),
        };

        let replicas = match s.strip_suffix('%') {
            Some(number) => number
                .trim()
                .parse()
                .map(Replicas::percentage)
                .map_err(|_| invalid())?,
            None => s.parse().map(Replicas::absolute).map_err(|_| invalid())?,
        };
        replicas.validate()
    }
}

impl Serialize for Replicas {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_percentage {
            serializer.collect_str(self)
        } else {
            serializer.serialize_i32(self.number)
        }
    }
}

impl<'de> Deserialize<'de> for Replicas {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Replicas::absolute(n)
                .validate()
                .map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
