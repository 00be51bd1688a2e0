//! Variant label checks on workload selectors
//!
//! A workload's variant must be present and equal in both
//! `spec.selector.matchLabels` and `spec.template.metadata.labels`,
//! otherwise traffic routed by that label reaches the wrong pods.

use std::collections::BTreeMap;

use stagehand_core::{Manifest, VARIANT_LABEL, Variant};

use crate::error::{KubeError, Result};

const SELECTOR_PATH: &[&str] = &["spec", "selector", "matchLabels"];
const TEMPLATE_PATH: &[&str] = &["spec", "template", "metadata", "labels"];

/// Fail unless both label sets carry `variant`
pub fn check_variant_selector(manifest: &Manifest, variant: Variant) -> Result<()> {
    for path in [SELECTOR_PATH, TEMPLATE_PATH] {
        let labels = manifest.nested_string_map(path)?;
        match labels.get(VARIANT_LABEL) {
            Some(value) if value == variant.as_str() => {}
            Some(value) => {
                return Err(violation(
                    manifest,
                    format!(
                        "{} has {}={} but {} is expected",
                        path.join("."),
                        VARIANT_LABEL,
                        value,
                        variant
                    ),
                ));
            }
            None => {
                return Err(violation(
                    manifest,
                    format!("missing {}={} in {}", VARIANT_LABEL, variant, path.join(".")),
                ));
            }
        }
    }
    Ok(())
}

/// Merge the variant label into both label sets
///
/// Other labels are kept. A different variant value already present is
/// replaced.
pub fn ensure_variant_selector(manifest: &mut Manifest, variant: Variant) -> Result<()> {
    for path in [SELECTOR_PATH, TEMPLATE_PATH] {
        let current = manifest.nested_string_map(path)?;
        if let Some(previous) = current.get(VARIANT_LABEL) {
            if previous == variant.as_str() {
                continue;
            }
            tracing::warn!(
                key = %manifest.key(),
                path = %path.join("."),
                previous = %previous,
                variant = %variant,
                "replacing variant label"
            );
        }

        let label = BTreeMap::from([(VARIANT_LABEL.to_string(), variant.as_str().to_string())]);
        manifest.add_string_map_values(&label, path)?;
    }
    Ok(())
}

fn violation(manifest: &Manifest, message: String) -> KubeError {
    KubeError::SelectorViolation {
        key: manifest.key().readable_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(selector: &str, template: &str) -> Manifest {
        Manifest::parse_documents(&format!(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels:
      app: web
{selector}
  template:
    metadata:
      labels:
        app: web
{template}
"#
        ))
        .unwrap()
        .remove(0)
    }

    const PRIMARY_SELECTOR: &str = "      stagehand.dev/variant: primary";
    const PRIMARY_TEMPLATE: &str = "        stagehand.dev/variant: primary";

    #[test]
    fn test_check_valid() {
        let m = deployment(PRIMARY_SELECTOR, PRIMARY_TEMPLATE);
        assert!(check_variant_selector(&m, Variant::Primary).is_ok());
        assert!(check_variant_selector(&m, Variant::Canary).is_err());
    }

    #[test]
    fn test_check_missing_in_template() {
        let m = deployment(PRIMARY_SELECTOR, "");
        let err = check_variant_selector(&m, Variant::Primary).unwrap_err();
        assert!(matches!(err, KubeError::SelectorViolation { .. }));
        assert!(err.to_string().contains("spec.template.metadata.labels"));
    }

    #[test]
    fn test_check_mismatched_paths() {
        let m = deployment(PRIMARY_SELECTOR, "        stagehand.dev/variant: canary");
        assert!(check_variant_selector(&m, Variant::Primary).is_err());
        assert!(check_variant_selector(&m, Variant::Canary).is_err());
    }

    #[test]
    fn test_ensure_then_check() {
        for (selector, template) in [
            ("", ""),
            (PRIMARY_SELECTOR, ""),
            ("      stagehand.dev/variant: canary", PRIMARY_TEMPLATE),
        ] {
            let mut m = deployment(selector, template);
            ensure_variant_selector(&mut m, Variant::Primary).unwrap();
            check_variant_selector(&m, Variant::Primary).unwrap();

            let labels = m.nested_string_map(SELECTOR_PATH).unwrap();
            assert_eq!(labels["app"], "web");
        }
    }

    #[test]
    fn test_ensure_idempotent() {
        let mut once = deployment("", "");
        ensure_variant_selector(&mut once, Variant::Canary).unwrap();
        let mut twice = once.clone();
        ensure_variant_selector(&mut twice, Variant::Canary).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ensure_creates_missing_paths() {
        let mut m = Manifest::parse_documents(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n",
        )
        .unwrap()
        .remove(0);
        ensure_variant_selector(&mut m, Variant::Primary).unwrap();
        check_variant_selector(&m, Variant::Primary).unwrap();
    }
}
