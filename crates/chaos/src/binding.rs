//! Food-binding manager: attaches candidates to freshly placed food and
//! finalizes consumption.

use std::sync::Arc;

use tracing::{debug, info};

use serpent_core::ResourceRecord;

use crate::dispatch::DeleteDispatcher;
use crate::source::CandidateSource;
use crate::StatusLine;

/// Per-food lifecycle is `Unplaced -> Placed(unbound) -> Placed(bound) ->
/// Consumed`. This manager covers the binding half: sources are consulted
/// in order at placement (queue first, direct fetch second), at most one
/// candidate is handed out per placement, and the caller clears the food's
/// binding before `consume` runs.
pub struct BindingManager {
    sources: Vec<Box<dyn CandidateSource>>,
    dispatcher: Arc<DeleteDispatcher>,
    status: StatusLine,
    /// Consulted when an unbound food is eaten. Explicit opt-in: it deletes
    /// an object that was never visually offered.
    unbound_fallback: Option<Box<dyn CandidateSource>>,
}

impl BindingManager {
    pub fn new(
        sources: Vec<Box<dyn CandidateSource>>,
        dispatcher: Arc<DeleteDispatcher>,
        status: StatusLine,
    ) -> Self {
        Self { sources, dispatcher, status, unbound_fallback: None }
    }

    pub fn with_unbound_fallback(mut self, source: Box<dyn CandidateSource>) -> Self {
        self.unbound_fallback = Some(source);
        self
    }

    /// Candidate for a freshly placed food. `None` leaves the food edible,
    /// just without a deletion consequence.
    pub async fn bind(&self) -> Option<ResourceRecord> {
        for source in &self.sources {
            if let Some(record) = source.next().await {
                debug!(record = %record, "candidate bound to food");
                return Some(record);
            }
        }
        info!("no candidate available; food stays unbound");
        None
    }

    /// Finalize a consumption with whatever binding the food carried.
    /// Bound food dispatches its delete fire-and-forget; unbound food
    /// either reports the miss or, when the fallback is enabled, makes one
    /// bounded attempt whose failure is tolerated silently.
    pub async fn consume(&self, binding: Option<ResourceRecord>) {
        let record = match binding {
            Some(record) => Some(record),
            None => match &self.unbound_fallback {
                Some(source) => {
                    let found = source.next().await;
                    if found.is_none() {
                        debug!("unbound fallback produced no candidate");
                    }
                    found
                }
                None => None,
            },
        };
        match record {
            Some(record) => self.dispatcher.dispatch(record).await,
            None => self.status.set("you ate food, but no cluster resource was harmed"),
        }
    }
}
