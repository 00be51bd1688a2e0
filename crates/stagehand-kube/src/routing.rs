//! Traffic routing between variants
//!
//! Routers turn a traffic split into manifests that realize it. The
//! pod-selector router is built in; mesh-based methods are provided by
//! registering another [`TrafficRouter`].

use k8s_openapi::api::core::v1::Service;
use stagehand_core::{
    DeploymentSpec, KIND_SERVICE, Manifest, TrafficPercentages, TrafficRoutingMethod,
    VARIANT_LABEL, Variant,
};

use crate::codec::{decode_service, encode_service};
use crate::error::{KubeError, Result};
use crate::select::find_manifests;

pub trait TrafficRouter: Send + Sync {
    fn method(&self) -> TrafficRoutingMethod;

    /// Manifests that send `percentages` of the traffic to each variant
    fn generate(
        &self,
        manifests: &[Manifest],
        config: &DeploymentSpec,
        percentages: TrafficPercentages,
    ) -> Result<Vec<Manifest>>;
}

/// Switches the application Service's selector to one variant
///
/// A label selector cannot split traffic, so only splits that send
/// everything to a single variant are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodSelectorRouter;

impl TrafficRouter for PodSelectorRouter {
    fn method(&self) -> TrafficRoutingMethod {
        TrafficRoutingMethod::PodSelector
    }

    fn generate(
        &self,
        manifests: &[Manifest],
        config: &DeploymentSpec,
        percentages: TrafficPercentages,
    ) -> Result<Vec<Manifest>> {
        let variant = [Variant::Primary, Variant::Canary, Variant::Baseline]
            .into_iter()
            .find(|v| percentages.of(*v) == 100)
            .ok_or_else(|| {
                KubeError::InvalidConfig(format!(
                    "podselector routing requires all traffic on one variant (primary={}, canary={}, baseline={})",
                    percentages.primary, percentages.canary, percentages.baseline
                ))
            })?;

        let services = find_manifests(manifests, KIND_SERVICE, &config.service.name);
        if services.is_empty() {
            return Err(KubeError::InvalidManifest(format!(
                "unable to find any service for name={:?}",
                config.service.name
            )));
        }

        services
            .iter()
            .map(|m| {
                let mut service = decode_service(m)?;
                select_variant(&mut service, variant);
                encode_service(&service)
            })
            .collect()
    }
}

fn select_variant(service: &mut Service, variant: Variant) {
    service
        .spec
        .get_or_insert_with(Default::default)
        .selector
        .get_or_insert_with(Default::default)
        .insert(VARIANT_LABEL.to_string(), variant.as_str().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::ResourceRef;

    fn manifests() -> Vec<Manifest> {
        Manifest::parse_documents(
            r#"
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  type: LoadBalancer
  selector:
    app: web
  ports:
    - port: 80
"#,
        )
        .unwrap()
    }

    fn config() -> DeploymentSpec {
        DeploymentSpec {
            service: ResourceRef::new("Service", "web"),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_to_canary() {
        let percentages = TrafficPercentages {
            canary: 100,
            ..Default::default()
        };
        let routed = PodSelectorRouter
            .generate(&manifests(), &config(), percentages)
            .unwrap();

        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].key().name(), "web");
        assert_eq!(routed[0].object()["spec"]["selector"][VARIANT_LABEL], "canary");
        assert_eq!(routed[0].object()["spec"]["selector"]["app"], "web");
        assert_eq!(routed[0].object()["spec"]["type"], "LoadBalancer");
    }

    #[test]
    fn test_rejects_split() {
        let percentages = TrafficPercentages {
            primary: 90,
            canary: 10,
            baseline: 0,
        };
        let err = PodSelectorRouter
            .generate(&manifests(), &config(), percentages)
            .unwrap_err();
        assert!(matches!(err, KubeError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_service() {
        let percentages = TrafficPercentages {
            primary: 100,
            ..Default::default()
        };
        let config = DeploymentSpec {
            service: ResourceRef::new("Service", "api"),
            ..Default::default()
        };
        assert!(
            PodSelectorRouter
                .generate(&manifests(), &config, percentages)
                .is_err()
        );
    }
}
