//! Typed views of the manifests the variant generator rewrites
//!
//! Only Deployments are supported as workloads. Every other kind decodes to
//! [`Workload::Unsupported`] so callers must handle it explicitly.
//! Deployments declared under an older API version (`apps/v1beta2`,
//! `extensions/v1beta1`) are read as `apps/v1` and written back under the
//! version they were declared with.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use stagehand_core::{KIND_DEPLOYMENT, Manifest};

use crate::error::{KubeError, Result};

const DEPLOYMENT_API_VERSION: &str = "apps/v1";

/// A decoded workload manifest
#[derive(Debug, Clone)]
pub enum Workload {
    Deployment {
        deployment: Box<Deployment>,
        /// apiVersion the manifest was declared with
        api_version: String,
    },
    Unsupported { kind: String },
}

impl Workload {
    pub fn decode(manifest: &Manifest) -> Result<Self> {
        match manifest.key().kind() {
            KIND_DEPLOYMENT => {
                let api_version = manifest.key().api_version().to_string();
                let decoded = if api_version == DEPLOYMENT_API_VERSION {
                    manifest.to_typed()
                } else {
                    let mut converted = manifest.clone();
                    converted.set_api_version(DEPLOYMENT_API_VERSION);
                    converted.to_typed()
                };
                let deployment: Deployment = decoded.map_err(|e| {
                    KubeError::InvalidManifest(format!(
                        "failed to decode {}: {}",
                        manifest.key().readable_string(),
                        e
                    ))
                })?;
                Ok(Workload::Deployment {
                    deployment: Box::new(deployment),
                    api_version,
                })
            }
            other => Ok(Workload::Unsupported {
                kind: other.to_string(),
            }),
        }
    }

    pub fn encode(&self) -> Result<Manifest> {
        match self {
            Workload::Deployment {
                deployment,
                api_version,
            } => {
                let mut manifest = Manifest::from_typed(deployment.as_ref())?;
                if api_version != DEPLOYMENT_API_VERSION {
                    manifest.set_api_version(api_version);
                }
                Ok(manifest)
            }
            Workload::Unsupported { kind } => Err(KubeError::UnsupportedWorkloadKind {
                kind: kind.clone(),
            }),
        }
    }
}

pub fn decode_service(manifest: &Manifest) -> Result<Service> {
    manifest.to_typed().map_err(|e| {
        KubeError::InvalidManifest(format!(
            "failed to decode {}: {}",
            manifest.key().readable_string(),
            e
        ))
    })
}

pub fn encode_service(service: &Service) -> Result<Manifest> {
    Manifest::from_typed(service)
        .map_err(|e| KubeError::InvalidManifest(format!("failed to encode Service: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_deployment() {
        let m = Manifest::parse_documents(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 3\n  selector:\n    matchLabels:\n      app: web\n  template:\n    metadata:\n      labels:\n        app: web\n",
        )
        .unwrap()
        .remove(0);

        let workload = Workload::decode(&m).unwrap();
        let Workload::Deployment { deployment: d, .. } = &workload else {
            panic!("expected a deployment");
        };
        assert_eq!(d.spec.as_ref().and_then(|s| s.replicas), Some(3));

        let encoded = workload.encode().unwrap();
        assert_eq!(encoded.key(), m.key());
        assert_eq!(encoded.object()["spec"], m.object()["spec"]);
    }

    #[test]
    fn test_older_deployment_version_is_kept() {
        let m = Manifest::parse_documents(
            "apiVersion: extensions/v1beta1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 2\n  selector:\n    matchLabels:\n      app: web\n  template:\n    metadata:\n      labels:\n        app: web\n",
        )
        .unwrap()
        .remove(0);

        let workload = Workload::decode(&m).unwrap();
        assert!(matches!(
            &workload,
            Workload::Deployment { api_version, .. } if api_version == "extensions/v1beta1"
        ));

        let encoded = workload.encode().unwrap();
        assert_eq!(encoded.key(), m.key());
        assert_eq!(encoded.object()["apiVersion"], "extensions/v1beta1");
        assert_eq!(encoded.object()["spec"]["replicas"], 2);
    }

    #[test]
    fn test_decode_unsupported_kind() {
        let m = Manifest::parse_documents("apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: db\n")
            .unwrap()
            .remove(0);

        let workload = Workload::decode(&m).unwrap();
        assert!(matches!(&workload, Workload::Unsupported { kind } if kind == "StatefulSet"));
        assert!(matches!(
            workload.encode(),
            Err(KubeError::UnsupportedWorkloadKind { .. })
        ));
    }

    #[test]
    fn test_service_round_trip() {
        let m = Manifest::parse_documents(
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  type: LoadBalancer\n  selector:\n    app: web\n  ports:\n    - port: 80\n",
        )
        .unwrap()
        .remove(0);

        let service = decode_service(&m).unwrap();
        let back = encode_service(&service).unwrap();
        assert_eq!(back, m);
    }
}
