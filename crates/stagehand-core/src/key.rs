//! Resource identity
//!
//! A [`ResourceKey`] identifies a single object in a cluster by its
//! apiVersion, kind, namespace and name. Keys are used as map and set
//! identity throughout stage execution, so they never change after parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const KIND_DEPLOYMENT: &str = "Deployment";
pub const KIND_SERVICE: &str = "Service";
pub const KIND_CONFIG_MAP: &str = "ConfigMap";
pub const KIND_SECRET: &str = "Secret";

/// Canonical identity of a cluster resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

impl ResourceKey {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// API group, empty for the core group ("v1")
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map(|(group, _)| group)
            .unwrap_or("")
    }

    /// Same key with another name
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Same key under another API version
    pub fn with_api_version(&self, api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            ..self.clone()
        }
    }

    /// Same key with another namespace
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self.clone()
        }
    }

    pub fn is_deployment(&self) -> bool {
        self.kind == KIND_DEPLOYMENT
    }

    pub fn is_service(&self) -> bool {
        self.kind == KIND_SERVICE && self.group().is_empty()
    }

    pub fn is_config_map(&self) -> bool {
        self.kind == KIND_CONFIG_MAP && self.group().is_empty()
    }

    pub fn is_secret(&self) -> bool {
        self.kind == KIND_SECRET && self.group().is_empty()
    }

    /// Whether both keys point at the same cluster object, ignoring the API version.
    ///
    /// A resource served under `apps/v1beta2` and `apps/v1` is one object.
    pub fn is_same_object(&self, other: &ResourceKey) -> bool {
        self.group() == other.group()
            && self.kind == other.kind
            && self.namespace == other.namespace
            && self.name == other.name
    }

    /// Fully qualified rendering for progress logs
    pub fn readable_string(&self) -> String {
        format!(
            "name={:?}, kind={:?}, namespace={:?}, apiVersion={:?}",
            self.name, self.kind, self.namespace, self.api_version
        )
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.api_version, self.kind, self.namespace, self.name
        )
    }
}

impl FromStr for ResourceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [api_version, kind, namespace, name]
                if !api_version.is_empty() && !kind.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(*api_version, *kind, *namespace, *name))
            }
            _ => Err(CoreError::InvalidResourceKey {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> ResourceKey {
        ResourceKey::new("apps/v1", "Deployment", "default", "web")
    }

    #[test]
    fn test_display_and_parse() {
        let key = web();
        assert_eq!(key.to_string(), "apps/v1:Deployment:default:web");

        let parsed: ResourceKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_cluster_scoped() {
        let key: ResourceKey = "v1:Namespace::prod".parse().unwrap();
        assert_eq!(key.namespace(), "");
        assert_eq!(key.name(), "prod");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("apps/v1:Deployment:web".parse::<ResourceKey>().is_err());
        assert!(":Deployment:default:web".parse::<ResourceKey>().is_err());
        assert!("a:b:c:d:e".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn test_readable_string() {
        assert_eq!(
            web().readable_string(),
            r#"name="web", kind="Deployment", namespace="default", apiVersion="apps/v1""#
        );
    }

    #[test]
    fn test_group() {
        assert_eq!(web().group(), "apps");
        assert_eq!(ResourceKey::new("v1", "Service", "", "web").group(), "");
        assert_eq!(
            ResourceKey::new("networking.k8s.io/v1", "Ingress", "", "web").group(),
            "networking.k8s.io"
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(ResourceKey::new("v1", "ConfigMap", "", "cfg").is_config_map());
        assert!(ResourceKey::new("v1", "Secret", "", "s").is_secret());
        assert!(!ResourceKey::new("example.com/v1", "Secret", "", "s").is_secret());
        assert!(web().is_deployment());
    }

    #[test]
    fn test_is_same_object_ignores_version() {
        let old = ResourceKey::new("apps/v1beta2", "Deployment", "default", "web");
        assert!(old.is_same_object(&web()));
        assert_ne!(old, web());

        let other_ns = web().with_namespace("prod");
        assert!(!other_ns.is_same_object(&web()));
    }

    #[test]
    fn test_with_name_keeps_other_fields() {
        let renamed = web().with_name("web-canary");
        assert_eq!(renamed.name(), "web-canary");
        assert_eq!(renamed.kind(), "Deployment");
        assert_eq!(renamed.api_version(), "apps/v1");
    }
}
