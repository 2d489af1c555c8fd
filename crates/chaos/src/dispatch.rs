//! Fire-and-forget deletion dispatch with a bounded in-flight set.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use serpent_core::ResourceRecord;

use crate::{ClusterOps, StatusLine};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// Runs deletions as independent tasks so the game loop never waits on
/// network latency. Results are logged and surface only through the shared
/// status line; failure never rolls back score or binding removal.
pub struct DeleteDispatcher {
    ops: Arc<dyn ClusterOps>,
    status: StatusLine,
    tasks: Mutex<JoinSet<()>>,
    max_in_flight: usize,
}

impl DeleteDispatcher {
    pub fn new(ops: Arc<dyn ClusterOps>, status: StatusLine) -> Self {
        Self { ops, status, tasks: Mutex::new(JoinSet::new()), max_in_flight: DEFAULT_MAX_IN_FLIGHT }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Queue a deletion. The caller must have cleared its binding already;
    /// ordering rules out a double-delete on duplicate consumption.
    /// Never waits on an in-flight deletion: at capacity the new delete is
    /// shed, keeping the calling tick free of network latency.
    pub async fn dispatch(&self, record: ResourceRecord) {
        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        if tasks.len() >= self.max_in_flight {
            counter!("serpent_deletes_shed", 1);
            warn!(record = %record, in_flight = tasks.len(), "dispatcher at capacity; delete shed");
            return;
        }
        let ops = Arc::clone(&self.ops);
        let status = self.status.clone();
        tasks.spawn(async move {
            match ops.delete(&record).await {
                Ok(()) => {
                    counter!("serpent_deletes_ok", 1);
                    info!(record = %record, "resource deleted");
                    status.set(format!("oh no! seems like you ate {record}"));
                }
                Err(e) => {
                    counter!("serpent_deletes_failed", 1);
                    warn!(record = %record, error = %e, "delete failed");
                    status.set(format!("failed to delete {record}, error: {e}"));
                }
            }
        });
    }

    /// Await every in-flight deletion; lets tests observe completion
    /// deterministically. The game loop never calls this.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}
