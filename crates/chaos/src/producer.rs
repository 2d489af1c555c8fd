//! Background inventory producer feeding the bounded candidate queue.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use serpent_core::{FilterConfig, ResourceKind, ResourceRecord};

use crate::ClusterOps;

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub kinds: Vec<ResourceKind>,
    pub filter: FilterConfig,
    pub queue_capacity: usize,
    pub interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            kinds: vec![ResourceKind::Pod],
            filter: FilterConfig::default(),
            queue_capacity: 100,
            interval: Duration::from_secs(1),
        }
    }
}

/// Spawn the inventory loop. The producer owns the send side of the queue;
/// consumers only ever perform non-blocking receives, so a slow or
/// unreachable cluster can never stall the game. A full queue drops the
/// sample rather than blocking; liveness is favored over completeness.
/// The task runs until the receive side is dropped or the process exits.
pub fn spawn_inventory(
    ops: Arc<dyn ClusterOps>,
    cfg: ProducerConfig,
) -> (mpsc::Receiver<ResourceRecord>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(cfg.queue_capacity);
    let handle = tokio::spawn(async move {
        info!(
            kinds = cfg.kinds.len(),
            capacity = cfg.queue_capacity,
            interval_ms = cfg.interval.as_millis() as u64,
            "inventory producer started"
        );
        let mut ticker = tokio::time::interval(cfg.interval);
        loop {
            ticker.tick().await;
            let Some(record) = sample_once(ops.as_ref(), &cfg.kinds, &cfg.filter).await else {
                continue;
            };
            match tx.try_send(record) {
                Ok(()) => counter!("serpent_candidates_produced", 1),
                Err(mpsc::error::TrySendError::Full(record)) => {
                    counter!("serpent_candidates_dropped", 1);
                    debug!(record = %record, "candidate queue full; sample dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    info!("candidate queue closed; inventory producer stopping");
                    break;
                }
            }
        }
    });
    (rx, handle)
}

/// One sampling pass: list every configured kind, keep the eligible subset,
/// pick one uniformly at random. Upstream failures skip the kind for this
/// interval; an empty pool is logged and is not an error.
pub async fn sample_once(
    ops: &dyn ClusterOps,
    kinds: &[ResourceKind],
    filter: &FilterConfig,
) -> Option<ResourceRecord> {
    let mut pool = Vec::new();
    for kind in kinds {
        match ops.list(*kind, None, filter.protect_critical).await {
            Ok(records) => pool.extend(filter.eligible(records)),
            Err(e) => warn!(kind = %kind, error = %e, "listing failed; kind skipped this interval"),
        }
    }
    if pool.is_empty() {
        debug!("no eligible resources found");
        return None;
    }
    pool.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rec, FakeOps};
    use serpent_core::CONTROL_PLANE_NAMESPACE;

    #[tokio::test]
    async fn sample_never_offers_guarded_namespaces() {
        let ops = FakeOps::with_records(vec![
            rec(ResourceKind::Pod, "core-dns", Some(CONTROL_PLANE_NAMESPACE)),
            rec(ResourceKind::Pod, "app", Some("default")),
            rec(ResourceKind::Pod, "db", Some("secret-ns")),
        ]);
        let filter = FilterConfig::new([], ["secret-ns".to_string()], true);
        for _ in 0..50 {
            let picked = sample_once(&ops, &[ResourceKind::Pod], &filter)
                .await
                .expect("one eligible pod");
            assert_eq!(picked.name, "app");
        }
    }

    #[tokio::test]
    async fn sample_spans_all_configured_kinds() {
        let ops = FakeOps::with_records(vec![
            rec(ResourceKind::Deployment, "web", Some("default")),
            rec(ResourceKind::Node, "worker-1", None),
        ]);
        let kinds = [ResourceKind::Deployment, ResourceKind::Node];
        let mut seen_node = false;
        let mut seen_deploy = false;
        for _ in 0..100 {
            match sample_once(&ops, &kinds, &FilterConfig::default()).await {
                Some(r) if r.kind == ResourceKind::Node => seen_node = true,
                Some(r) if r.kind == ResourceKind::Deployment => seen_deploy = true,
                other => panic!("unexpected sample: {other:?}"),
            }
            if seen_node && seen_deploy {
                break;
            }
        }
        assert!(seen_node && seen_deploy);
    }

    #[tokio::test]
    async fn empty_cluster_yields_none_not_error() {
        let ops = FakeOps::with_records(vec![]);
        let got = sample_once(&ops, &[ResourceKind::Pod], &FilterConfig::default()).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn producer_stops_when_queue_is_dropped() {
        let ops = Arc::new(FakeOps::with_records(vec![rec(
            ResourceKind::Pod,
            "app",
            Some("default"),
        )]));
        let cfg = ProducerConfig {
            interval: Duration::from_millis(10),
            queue_capacity: 1,
            ..ProducerConfig::default()
        };
        let (rx, handle) = spawn_inventory(ops, cfg);
        drop(rx);
        // Next attempted send observes the closed queue and exits.
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("producer exits after queue close")
            .unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_samples_without_stalling() {
        let ops = Arc::new(FakeOps::with_records(vec![rec(
            ResourceKind::Pod,
            "app",
            Some("default"),
        )]));
        let cfg = ProducerConfig {
            interval: Duration::from_millis(10),
            queue_capacity: 1,
            ..ProducerConfig::default()
        };
        let (mut rx, handle) = spawn_inventory(ops, cfg);
        // Let many intervals elapse with nobody reading; capacity is 1 so
        // every later sample is dropped rather than blocking the loop.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await.unwrap().name, "app");
        assert!(!handle.is_finished(), "producer must keep running");
        handle.abort();
    }
}
