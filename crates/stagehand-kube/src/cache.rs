//! Revision-keyed manifest cache
//!
//! Rendering an application's manifests is expensive, and every stage of a
//! deployment needs them. The commit hash is a content address: the
//! manifests of one application at one commit never change, so entries are
//! never invalidated by this crate. Capacity and TTL bound memory use.
//!
//! One [`ManifestCache`] is created per process and shared by every stage
//! execution. [`AppManifestsCache`] is the per-application view.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use stagehand_core::Manifest;

/// Default number of manifest sets kept in memory
pub const DEFAULT_CAPACITY: u64 = 256;

/// Process-wide cache of rendered manifest sets
///
/// Cloning is cheap and clones share the same storage.
#[derive(Clone)]
pub struct ManifestCache {
    inner: Cache<(String, String), Arc<Vec<Manifest>>>,
}

impl ManifestCache {
    /// Create a cache holding at most `max_capacity` manifest sets
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create a cache whose entries also expire after `ttl`
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// View scoped to one application
    pub fn for_app(&self, app_id: impl Into<String>) -> AppManifestsCache {
        AppManifestsCache {
            app_id: app_id.into(),
            cache: self.clone(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Manifest cache for one application
#[derive(Clone)]
pub struct AppManifestsCache {
    app_id: String,
    cache: ManifestCache,
}

impl AppManifestsCache {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Manifests rendered at `commit`, as an independent copy
    ///
    /// A miss is not an error: the caller loads from source and calls `put`.
    pub fn get(&self, commit: &str) -> Option<Vec<Manifest>> {
        if commit.is_empty() {
            return None;
        }

        let key = (self.app_id.clone(), commit.to_string());
        match self.cache.inner.get(&key) {
            Some(manifests) => {
                tracing::debug!(app_id = %self.app_id, commit, "manifest cache hit");
                Some(manifests.as_ref().clone())
            }
            None => {
                tracing::debug!(app_id = %self.app_id, commit, "manifest cache miss");
                None
            }
        }
    }

    /// Store the manifests rendered at `commit`
    pub fn put(&self, commit: &str, manifests: &[Manifest]) {
        if commit.is_empty() {
            return;
        }

        let key = (self.app_id.clone(), commit.to_string());
        self.cache.inner.insert(key, Arc::new(manifests.to_vec()));
    }
}
