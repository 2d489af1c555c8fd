//! Serpent chaos pipeline: background inventory sampling, candidate
//! sourcing, and the food-binding protocol that ties consumed food to real
//! cluster deletions.

#![forbid(unsafe_code)]

pub mod binding;
pub mod dispatch;
pub mod producer;
pub mod source;

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::info;

use serpent_core::{ResourceKind, ResourceRecord};
use serpent_kubehub::{KindRegistry, RegistryError};

pub use binding::BindingManager;
pub use dispatch::DeleteDispatcher;
pub use producer::{spawn_inventory, ProducerConfig};
pub use source::{CandidateSource, DirectSource, QueueSource};

/// Narrow cluster capability the pipeline consumes. Tests inject fakes so
/// the whole pipeline runs without a live cluster.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError>;

    async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError>;
}

#[async_trait]
impl ClusterOps for KindRegistry {
    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError> {
        KindRegistry::list(self, kind, ns, protect_critical).await
    }

    async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError> {
        KindRegistry::delete(self, record).await
    }
}

/// Wrapper that lists normally but only logs deletions. Backs `--dry-run`.
pub struct DryRunOps<T>(pub T);

#[async_trait]
impl<T: ClusterOps> ClusterOps for DryRunOps<T> {
    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError> {
        self.0.list(kind, ns, protect_critical).await
    }

    async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError> {
        info!(record = %record, "dry-run: delete skipped");
        Ok(())
    }
}

/// Last-write-wins status line shared between delete tasks and the
/// renderer. Concurrent deletions may interleave their messages.
#[derive(Clone)]
pub struct StatusLine(Arc<ArcSwap<String>>);

impl StatusLine {
    pub fn new() -> Self {
        Self(Arc::new(ArcSwap::from_pointee(String::new())))
    }

    pub fn set(&self, msg: impl Into<String>) {
        self.0.store(Arc::new(msg.into()));
    }

    pub fn get(&self) -> Arc<String> {
        self.0.load_full()
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory stand-in for the kind registry.
    pub struct FakeOps {
        pub records: Vec<ResourceRecord>,
        pub deleted: Mutex<Vec<ResourceRecord>>,
        pub fail_delete: bool,
        pub latency: Option<Duration>,
    }

    impl FakeOps {
        pub fn with_records(records: Vec<ResourceRecord>) -> Self {
            Self { records, deleted: Mutex::new(Vec::new()), fail_delete: false, latency: None }
        }

        pub fn deleted(&self) -> Vec<ResourceRecord> {
            self.deleted.lock().unwrap().clone()
        }
    }

    pub fn rec(kind: ResourceKind, name: &str, ns: Option<&str>) -> ResourceRecord {
        ResourceRecord { kind, name: name.to_string(), namespace: ns.map(|s| s.to_string()) }
    }

    fn injected_upstream() -> RegistryError {
        RegistryError::Upstream(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "injected failure".to_string(),
            reason: "TestError".to_string(),
            code: 500,
        }))
    }

    #[async_trait]
    impl ClusterOps for FakeOps {
        async fn list(
            &self,
            kind: ResourceKind,
            ns: Option<&str>,
            _protect_critical: bool,
        ) -> Result<Vec<ResourceRecord>, RegistryError> {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            Ok(self
                .records
                .iter()
                .filter(|r| r.kind == kind)
                .filter(|r| ns.map_or(true, |n| r.namespace.as_deref() == Some(n)))
                .cloned()
                .collect())
        }

        async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError> {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.fail_delete {
                return Err(injected_upstream());
            }
            self.deleted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }
}
