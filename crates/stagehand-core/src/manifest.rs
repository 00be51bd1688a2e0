//! Structured manifest documents
//!
//! A [`Manifest`] is one Kubernetes object document together with its
//! [`ResourceKey`]. The key is derived from the document and every mutation
//! that touches identity fields (name, namespace) updates both, so the two
//! never diverge.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::key::ResourceKey;

/// A single Kubernetes object document
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    key: ResourceKey,
    object: Value,
}

impl Manifest {
    /// Build a manifest from a parsed document
    pub fn from_value(object: Value) -> Result<Self> {
        let key = key_of(&object)?;
        Ok(Self { key, object })
    }

    /// Parse a (possibly multi-document) YAML string
    ///
    /// Empty and comment-only documents are skipped. Document order is kept.
    pub fn parse_documents(yaml: &str) -> Result<Vec<Self>> {
        let mut manifests = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
            let value = Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }

            let manifest = Self::from_value(value).map_err(|e| CoreError::InvalidManifest {
                message: format!("document {}: {}", index, e),
            })?;
            manifests.push(manifest);
        }

        Ok(manifests)
    }

    /// Encode a strongly-typed object (e.g. a `Deployment`) as a manifest
    pub fn from_typed<K: Serialize>(object: &K) -> Result<Self> {
        Self::from_value(serde_json::to_value(object)?)
    }

    /// Decode the document into a strongly-typed object
    pub fn to_typed<K: DeserializeOwned>(&self) -> Result<K> {
        Ok(serde_json::from_value(self.object.clone())?)
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn into_object(self) -> Value {
        self.object
    }

    /// Independent deep copy under a new name
    pub fn duplicate(&self, name: &str) -> Self {
        let mut object = self.object.clone();
        if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("name".to_string(), Value::String(name.to_string()));
        }

        Self {
            key: self.key.with_name(name),
            object,
        }
    }

    /// Move the object into another namespace
    pub fn set_namespace(&mut self, namespace: &str) {
        if let Some(metadata) = self.object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(
                "namespace".to_string(),
                Value::String(namespace.to_string()),
            );
        }
        self.key = self.key.with_namespace(namespace);
    }

    /// Rewrite the declared apiVersion of the document
    pub fn set_api_version(&mut self, api_version: &str) {
        if let Some(object) = self.object.as_object_mut() {
            object.insert(
                "apiVersion".to_string(),
                Value::String(api_version.to_string()),
            );
        }
        self.key = self.key.with_api_version(api_version);
    }

    /// Read a nested `map[string]string` field
    ///
    /// A missing field yields an empty map. A field holding anything other
    /// than a map of strings is an error.
    pub fn nested_string_map(&self, fields: &[&str]) -> Result<BTreeMap<String, String>> {
        let mut current = &self.object;
        for field in fields {
            match current.get(field) {
                Some(Value::Null) | None => return Ok(BTreeMap::new()),
                Some(next) => current = next,
            }
        }

        let map = current.as_object().ok_or_else(|| not_a_string_map(fields))?;
        map.iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| not_a_string_map(fields))
            })
            .collect()
    }

    /// Merge string values into a nested map field, creating it when absent
    ///
    /// Existing keys not in `values` are preserved.
    pub fn add_string_map_values(
        &mut self,
        values: &BTreeMap<String, String>,
        fields: &[&str],
    ) -> Result<()> {
        let mut current = &mut self.object;
        for field in fields {
            let map = current
                .as_object_mut()
                .ok_or_else(|| not_a_string_map(fields))?;
            let next = map
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if next.is_null() {
                *next = Value::Object(Map::new());
            }
            current = next;
        }

        let map = current
            .as_object_mut()
            .ok_or_else(|| not_a_string_map(fields))?;
        for (k, v) in values {
            map.insert(k.clone(), Value::String(v.clone()));
        }
        Ok(())
    }

    pub fn add_annotations(&mut self, annotations: &BTreeMap<String, String>) -> Result<()> {
        self.add_string_map_values(annotations, &["metadata", "annotations"])
    }

    pub fn add_labels(&mut self, labels: &BTreeMap<String, String>) -> Result<()> {
        self.add_string_map_values(labels, &["metadata", "labels"])
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.object)?)
    }
}

fn key_of(object: &Value) -> Result<ResourceKey> {
    let required = |value: Option<&Value>, field: &str| -> Result<String> {
        value
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| CoreError::InvalidManifest {
                message: format!("missing {}", field),
            })
    };

    if !object.is_object() {
        return Err(CoreError::InvalidManifest {
            message: "document is not a map".to_string(),
        });
    }

    let metadata = object.get("metadata");
    let api_version = required(object.get("apiVersion"), "apiVersion")?;
    let kind = required(object.get("kind"), "kind")?;
    let name = required(metadata.and_then(|m| m.get("name")), "metadata.name")?;
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or("");

    Ok(ResourceKey::new(api_version, kind, namespace, name))
}

fn not_a_string_map(fields: &[&str]) -> CoreError {
    CoreError::NotAStringMap {
        path: fields.join("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;

    const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: default
spec:
  replicas: 2
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.27
"#;

    fn deployment() -> Manifest {
        Manifest::parse_documents(DEPLOYMENT).unwrap().remove(0)
    }

    #[test]
    fn test_parse_multi_document() {
        let yaml = format!(
            "{}\n---\n# just a comment\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\n",
            DEPLOYMENT
        );
        let manifests = Manifest::parse_documents(&yaml).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].key().kind(), "Deployment");
        assert_eq!(manifests[1].key().kind(), "Service");
        assert_eq!(manifests[1].key().namespace(), "");
    }

    #[test]
    fn test_parse_missing_name() {
        let err = Manifest::parse_documents("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n")
            .unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn test_duplicate_updates_key_and_document() {
        let original = deployment();
        let copy = original.duplicate("web-canary");

        assert_eq!(copy.key().name(), "web-canary");
        assert_eq!(copy.object()["metadata"]["name"], "web-canary");
        assert_eq!(original.key().name(), "web");
        assert_eq!(original.object()["metadata"]["name"], "web");
    }

    #[test]
    fn test_duplicate_is_deep() {
        let original = deployment();
        let mut copy = original.duplicate("web");
        copy.add_labels(&BTreeMap::from([("a".to_string(), "b".to_string())]))
            .unwrap();

        assert!(original.object()["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_set_namespace() {
        let mut m = deployment();
        m.set_namespace("prod");
        assert_eq!(m.key().namespace(), "prod");
        assert_eq!(m.object()["metadata"]["namespace"], "prod");
    }

    #[test]
    fn test_set_api_version() {
        let mut m = deployment();
        m.set_api_version("apps/v1beta2");
        assert_eq!(m.key().api_version(), "apps/v1beta2");
        assert_eq!(m.object()["apiVersion"], "apps/v1beta2");
        assert_eq!(m.key().name(), "web");
    }

    #[test]
    fn test_nested_string_map() {
        let m = deployment();
        let labels = m
            .nested_string_map(&["spec", "template", "metadata", "labels"])
            .unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("web"));

        let missing = m.nested_string_map(&["spec", "nothing", "here"]).unwrap();
        assert!(missing.is_empty());

        assert!(m.nested_string_map(&["spec", "replicas"]).is_err());
    }

    #[test]
    fn test_add_string_map_values_is_additive() {
        let mut m = deployment();
        let values = BTreeMap::from([("tier".to_string(), "frontend".to_string())]);
        m.add_string_map_values(&values, &["spec", "selector", "matchLabels"])
            .unwrap();

        let selector = m
            .nested_string_map(&["spec", "selector", "matchLabels"])
            .unwrap();
        assert_eq!(selector.len(), 2);
        assert_eq!(selector["app"], "web");
        assert_eq!(selector["tier"], "frontend");
    }

    #[test]
    fn test_add_string_map_values_creates_path() {
        let mut m = deployment();
        let values = BTreeMap::from([("k".to_string(), "v".to_string())]);
        m.add_annotations(&values).unwrap();
        assert_eq!(m.object()["metadata"]["annotations"]["k"], "v");
    }

    #[test]
    fn test_add_string_map_values_rejects_non_map() {
        let mut m = deployment();
        let values = BTreeMap::from([("k".to_string(), "v".to_string())]);
        assert!(m
            .add_string_map_values(&values, &["spec", "replicas", "x"])
            .is_err());
    }

    #[test]
    fn test_typed_round_trip() {
        let m = deployment();
        let mut d: Deployment = m.to_typed().unwrap();
        assert_eq!(d.spec.as_ref().and_then(|s| s.replicas), Some(2));

        if let Some(spec) = d.spec.as_mut() {
            spec.replicas = Some(5);
        }
        let back = Manifest::from_typed(&d).unwrap();

        assert_eq!(back.key(), m.key());
        assert_eq!(back.object()["spec"]["replicas"], 5);
        assert_eq!(
            back.object()["spec"]["template"]["spec"]["containers"],
            m.object()["spec"]["template"]["spec"]["containers"]
        );
    }
}
