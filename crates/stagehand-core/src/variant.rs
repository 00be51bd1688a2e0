//! Variants and the bookkeeping labels stamped onto generated manifests

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Label key carrying the variant of a workload, its pods and its Services
pub const VARIANT_LABEL: &str = "stagehand.dev/variant";

/// Marks resources managed by stagehand
pub const MANAGED_BY_LABEL: &str = "stagehand.dev/managed-by";
pub const MANAGED_BY_STAGEHAND: &str = "stagehand";

/// Identifier of the agent that applied the resource
pub const AGENT_ANNOTATION: &str = "stagehand.dev/agent";
pub const APPLICATION_LABEL: &str = "stagehand.dev/application";
pub const ORIGINAL_API_VERSION_ANNOTATION: &str = "stagehand.dev/original-api-version";
pub const RESOURCE_KEY_ANNOTATION: &str = "stagehand.dev/resource-key";
pub const COMMIT_HASH_ANNOTATION: &str = "stagehand.dev/commit-hash";

/// A traffic-isolated copy of an application's workloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Primary,
    Canary,
    Baseline,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Primary => "primary",
            Variant::Canary => "canary",
            Variant::Baseline => "baseline",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Variant::Primary),
            "canary" => Ok(Variant::Canary),
            "baseline" => Ok(Variant::Baseline),
            _ => Err(CoreError::UnknownVariant {
                name: s.to_string(),
            }),
        }
    }
}

/// Append `-suffix` to a name, or keep it when the suffix is empty
pub fn suffixed_name(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{}-{}", name, suffix)
    }
}
