//! Applying and deleting manifest sets
//!
//! Apply is sequential and stops at the first failure; whatever was applied
//! before it stays on the cluster. Delete is best effort: it visits every
//! key and reports one aggregate error at the end.

use stagehand_core::{Manifest, ResourceKey};

use crate::cluster::ClusterClient;
use crate::error::{KubeError, Result};
use crate::progress::LogPersister;
use crate::signal::StopSignal;

/// Outcome of a delete pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub total: usize,
    pub deleted: usize,
    /// Already gone before the call
    pub absent: usize,
    pub failed: usize,
    /// Keys whose delete failed, in visiting order
    pub failed_keys: Vec<ResourceKey>,
    /// Skipped after a stop signal
    pub not_attempted: usize,
}

impl DeleteSummary {
    /// Resources confirmed deleted or absent
    pub fn succeeded(&self) -> usize {
        self.deleted + self.absent
    }

    pub fn into_result(self) -> Result<Self> {
        if self.succeeded() < self.total {
            return Err(KubeError::DeleteFailed {
                failed: self.total - self.succeeded(),
                total: self.total,
            });
        }
        Ok(self)
    }
}

/// Drives a [`ClusterClient`] on behalf of one stage execution
pub struct Reconciler<'a> {
    cluster: &'a dyn ClusterClient,
    log: &'a dyn LogPersister,
    signal: &'a StopSignal,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        cluster: &'a dyn ClusterClient,
        log: &'a dyn LogPersister,
        signal: &'a StopSignal,
    ) -> Self {
        Self {
            cluster,
            log,
            signal,
        }
    }

    /// Apply `manifests` in order, stopping at the first failure
    pub async fn apply(&self, manifests: &[Manifest]) -> Result<()> {
        self.log
            .info(&format!("Start applying {} manifests", manifests.len()));

        for manifest in manifests {
            let key = manifest.key();
            if self.signal.is_stopped() {
                self.log.error("Stopped before all manifests were applied");
                return Err(KubeError::Cancelled);
            }

            if let Err(e) = self.cluster.apply(manifest).await {
                let readable = key.readable_string();
                self.log
                    .error(&format!("Failed to apply manifest: {} ({})", readable, e));
                tracing::warn!(key = %key, error = %e, "apply failed");
                return Err(KubeError::ApplyFailed {
                    key: readable,
                    message: e.to_string(),
                });
            }
            self.log
                .success(&format!("- applied manifest: {}", key.readable_string()));
        }

        self.log.success(&format!(
            "Successfully applied {} manifests",
            manifests.len()
        ));
        Ok(())
    }

    /// Delete every key; absent resources count as deleted
    pub async fn delete(&self, keys: &[ResourceKey]) -> DeleteSummary {
        let mut summary = DeleteSummary {
            total: keys.len(),
            ..Default::default()
        };

        if keys.is_empty() {
            self.log.info("No resources to delete");
            return summary;
        }
        self.log
            .info(&format!("Start deleting {} resources", keys.len()));

        for (index, key) in keys.iter().enumerate() {
            if self.signal.is_stopped() {
                summary.not_attempted = keys.len() - index;
                self.log.error(&format!(
                    "Stopped before deleting the remaining {} resources",
                    summary.not_attempted
                ));
                break;
            }

            match self.cluster.delete(key).await {
                Ok(()) => {
                    summary.deleted += 1;
                    self.log
                        .success(&format!("- deleted resource: {}", key.readable_string()));
                }
                Err(e) if e.is_not_found() => {
                    summary.absent += 1;
                    self.log
                        .info(&format!("- no resource {} to delete", key.readable_string()));
                }
                Err(e) => {
                    summary.failed += 1;
                    summary.failed_keys.push(key.clone());
                    self.log.error(&format!(
                        "- unable to delete resource: {} ({})",
                        key.readable_string(),
                        e
                    ));
                    tracing::warn!(key = %key, error = %e, "delete failed");
                }
            }
        }

        if summary.succeeded() < summary.total {
            self.log.error(&format!(
                "Failed to delete {} of {} resources",
                summary.total - summary.succeeded(),
                summary.total
            ));
        } else {
            self.log
                .success(&format!("Successfully deleted {} resources", summary.total));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCluster;
    use crate::progress::{LogLevel, MemoryLog};
    use crate::signal::stop_signal;

    fn config_map(name: &str) -> Manifest {
        Manifest::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "default"},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_fail_fast() {
        let manifests: Vec<Manifest> = (0..5).map(|i| config_map(&format!("cfg-{i}"))).collect();
        let cluster = MockCluster::new();
        cluster.fail_apply(manifests[2].key().clone(), "forbidden");
        let log = MemoryLog::new();
        let signal = StopSignal::never();

        let err = Reconciler::new(&cluster, &log, &signal)
            .apply(&manifests)
            .await
            .unwrap_err();

        assert!(matches!(&err, KubeError::ApplyFailed { key, .. } if key.contains("cfg-2")));
        let attempted: Vec<ResourceKey> = manifests[..3].iter().map(|m| m.key().clone()).collect();
        assert_eq!(cluster.applied_keys(), attempted);
        assert!(cluster.contains(manifests[1].key()));
        assert_eq!(log.messages(LogLevel::Success).len(), 2);
        assert_eq!(log.messages(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_apply_stops_on_signal() {
        let cluster = MockCluster::new();
        let log = MemoryLog::new();
        let (handle, signal) = stop_signal();
        handle.cancel();

        let err = Reconciler::new(&cluster, &log, &signal)
            .apply(&[config_map("cfg")])
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Cancelled));
        assert!(cluster.applied_keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_aggregates_failures() {
        let present = config_map("one");
        let absent = config_map("two");
        let forbidden = config_map("three");
        let cluster = MockCluster::with_objects([present.clone(), forbidden.clone()]);
        cluster.fail_delete(forbidden.key().clone(), "permission denied");
        let log = MemoryLog::new();
        let signal = StopSignal::never();

        let keys = [
            present.key().clone(),
            absent.key().clone(),
            forbidden.key().clone(),
        ];
        let summary = Reconciler::new(&cluster, &log, &signal)
            .delete(&keys)
            .await;

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.failed_keys, [forbidden.key().clone()]);
        assert_eq!(cluster.deleted_keys().len(), 3);

        let err = summary.into_result().unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 resources failed to delete");
        assert!(log.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let m = config_map("cfg");
        let cluster = MockCluster::with_objects([m.clone()]);
        let log = MemoryLog::new();
        let signal = StopSignal::never();
        let reconciler = Reconciler::new(&cluster, &log, &signal);

        let keys = [m.key().clone()];
        assert!(reconciler.delete(&keys).await.into_result().is_ok());
        let second = reconciler.delete(&keys).await;
        assert_eq!(second.absent, 1);
        assert!(second.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_delete_empty() {
        let cluster = MockCluster::new();
        let log = MemoryLog::new();
        let signal = StopSignal::never();

        let summary = Reconciler::new(&cluster, &log, &signal).delete(&[]).await;
        assert!(summary.into_result().is_ok());
        assert_eq!(cluster.operation_counts().deletes, 0);
        assert!(log.contains("No resources to delete"));
    }

    #[tokio::test]
    async fn test_delete_stops_on_signal() {
        let cluster = MockCluster::new();
        let log = MemoryLog::new();
        let (handle, signal) = stop_signal();
        handle.timeout();

        let keys = [config_map("a").key().clone(), config_map("b").key().clone()];
        let summary = Reconciler::new(&cluster, &log, &signal).delete(&keys).await;
        assert_eq!(summary.not_attempted, 2);
        assert!(matches!(
            summary.into_result(),
            Err(KubeError::DeleteFailed { failed: 2, total: 2 })
        ));
    }
}
