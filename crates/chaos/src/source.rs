//! Candidate sources: the queue-backed prefetch path and the synchronous
//! direct-fetch fallback, unified behind one trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use serpent_core::{FilterConfig, ResourceKind, ResourceRecord};

use crate::ClusterOps;

/// Supplies deletion candidates. `None` is a valid outcome (nothing
/// eligible right now), never an error.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn next(&self) -> Option<ResourceRecord>;
}

/// Non-blocking reader over the inventory producer's bounded queue.
pub struct QueueSource {
    rx: Mutex<mpsc::Receiver<ResourceRecord>>,
}

impl QueueSource {
    pub fn new(rx: mpsc::Receiver<ResourceRecord>) -> Self {
        Self { rx: Mutex::new(rx) }
    }
}

#[async_trait]
impl CandidateSource for QueueSource {
    async fn next(&self) -> Option<ResourceRecord> {
        self.rx.lock().await.try_recv().ok()
    }
}

/// Live single-kind fetch under a bounded timeout. The kind is chosen
/// uniformly per call; listing or filtering coming up empty yields `None`.
pub struct DirectSource {
    ops: Arc<dyn ClusterOps>,
    kinds: Vec<ResourceKind>,
    filter: FilterConfig,
    timeout: Duration,
}

impl DirectSource {
    pub fn new(
        ops: Arc<dyn ClusterOps>,
        kinds: Vec<ResourceKind>,
        filter: FilterConfig,
        timeout: Duration,
    ) -> Self {
        Self { ops, kinds, filter, timeout }
    }
}

#[async_trait]
impl CandidateSource for DirectSource {
    async fn next(&self) -> Option<ResourceRecord> {
        let kind = *self.kinds.choose(&mut rand::thread_rng())?;
        let fetch = async {
            match self.ops.list(kind, None, self.filter.protect_critical).await {
                Ok(records) => {
                    let eligible = self.filter.eligible(records);
                    eligible.choose(&mut rand::thread_rng()).cloned()
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "direct fetch failed");
                    None
                }
            }
        };
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(found) => found,
            Err(_) => {
                debug!(kind = %kind, "direct fetch timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rec, FakeOps};

    #[tokio::test]
    async fn queue_source_never_blocks_on_empty() {
        let (_tx, rx) = mpsc::channel(4);
        let source = QueueSource::new(rx);
        assert_eq!(source.next().await, None);
    }

    #[tokio::test]
    async fn queue_source_yields_in_fifo_order() {
        let (tx, rx) = mpsc::channel(4);
        let a = rec(ResourceKind::Pod, "a", Some("default"));
        let b = rec(ResourceKind::Pod, "b", Some("default"));
        tx.send(a.clone()).await.unwrap();
        tx.send(b.clone()).await.unwrap();
        let source = QueueSource::new(rx);
        assert_eq!(source.next().await, Some(a));
        assert_eq!(source.next().await, Some(b));
        assert_eq!(source.next().await, None);
    }

    #[tokio::test]
    async fn direct_source_filters_excluded_namespaces() {
        let ops = Arc::new(FakeOps::with_records(vec![
            rec(ResourceKind::Pod, "guarded", Some("kube-system")),
            rec(ResourceKind::Pod, "fair-game", Some("default")),
        ]));
        let source = DirectSource::new(
            ops,
            vec![ResourceKind::Pod],
            FilterConfig::default(),
            Duration::from_secs(1),
        );
        for _ in 0..20 {
            let picked = source.next().await.expect("one eligible pod");
            assert_eq!(picked.name, "fair-game");
        }
    }

    #[tokio::test]
    async fn direct_source_with_no_kinds_yields_none() {
        let ops = Arc::new(FakeOps::with_records(vec![]));
        let source = DirectSource::new(ops, vec![], FilterConfig::default(), Duration::from_secs(1));
        assert_eq!(source.next().await, None);
    }
}
