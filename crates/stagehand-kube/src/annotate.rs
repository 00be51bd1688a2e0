//! Bookkeeping metadata stamped onto every applied manifest

use std::collections::BTreeMap;

use stagehand_core::{
    AGENT_ANNOTATION, APPLICATION_LABEL, COMMIT_HASH_ANNOTATION, MANAGED_BY_LABEL,
    MANAGED_BY_STAGEHAND, Manifest, ORIGINAL_API_VERSION_ANNOTATION, RESOURCE_KEY_ANNOTATION,
    VARIANT_LABEL, Variant,
};

use crate::error::Result;

/// Values shared by every manifest of one apply
#[derive(Debug, Clone)]
pub struct BuiltinAnnotations {
    pub agent_id: String,
    pub application_id: String,
    pub variant: Variant,
    pub commit_hash: String,
}

impl BuiltinAnnotations {
    /// Stamp `manifests`, overwriting any existing value under the same keys
    ///
    /// Run this on the final (renamed) manifests, right before apply.
    pub fn apply(&self, manifests: &mut [Manifest]) -> Result<()> {
        let labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY_STAGEHAND.to_string()),
            (APPLICATION_LABEL.to_string(), self.application_id.clone()),
            (VARIANT_LABEL.to_string(), self.variant.as_str().to_string()),
        ]);

        for manifest in manifests.iter_mut() {
            let mut annotations = labels.clone();
            annotations.insert(AGENT_ANNOTATION.to_string(), self.agent_id.clone());
            annotations.insert(
                ORIGINAL_API_VERSION_ANNOTATION.to_string(),
                manifest.key().api_version().to_string(),
            );
            annotations.insert(RESOURCE_KEY_ANNOTATION.to_string(), manifest.key().to_string());
            annotations.insert(COMMIT_HASH_ANNOTATION.to_string(), self.commit_hash.clone());

            manifest.add_labels(&labels)?;
            manifest.add_annotations(&annotations)?;
        }
        Ok(())
    }
}
