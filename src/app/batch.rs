use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::app::registry::PageRegistry;
use crate::error::ApiError;
use crate::formats::BulkAnalyzeAck;
use crate::gateway::PageGateway;

/// Time to give the backend before reloading statuses after a submission.
pub const RELOAD_DELAY: Duration = Duration::from_secs(1);

/// Pages chosen for batch analysis. Always a subset of the registry it was built against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<u64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, registry: &PageRegistry, id: u64) -> bool {
        if !registry.contains(id) {
            return false;
        }
        self.ids.insert(id);
        true
    }

    pub fn deselect(&mut self, id: u64) -> bool {
        self.ids.remove(&id)
    }

    pub fn toggle(&mut self, registry: &PageRegistry, id: u64) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.select(registry, id)
        }
    }

    pub fn select_all(&mut self, registry: &PageRegistry) {
        self.ids.extend(registry.ids());
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops identifiers the registry no longer holds; returns how many were dropped.
    pub fn reconcile(&mut self, registry: &PageRegistry) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| registry.contains(*id));
        before - self.ids.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.ids.iter().copied().collect()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitError {
    #[error("select at least one page to analyze")]
    EmptySelection,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub ack: BulkAnalyzeAck,
    pub submitted: Vec<u64>,
    /// When the caller should reload the registry to observe the status change.
    pub reload_after: Duration,
}

pub struct BatchAnalysisSubmitter {
    gateway: Arc<dyn PageGateway>,
    reload_delay: Duration,
}

impl BatchAnalysisSubmitter {
    pub fn new(gateway: Arc<dyn PageGateway>) -> Self {
        Self {
            gateway,
            reload_delay: RELOAD_DELAY,
        }
    }

    pub fn with_reload_delay(mut self, reload_delay: Duration) -> Self {
        self.reload_delay = reload_delay;
        self
    }

    /// Submits one bulk request for `ids`. Empty input fails without a network call.
    pub async fn analyze(&self, project_id: u64, ids: &[u64]) -> Result<Submitted, SubmitError> {
        if ids.is_empty() {
            return Err(SubmitError::EmptySelection);
        }
        let ack = self.gateway.bulk_analyze(project_id, ids).await?;
        tracing::info!(
            project_id,
            submitted = ids.len(),
            accepted = ack.accepted,
            rejected = ack.rejected_ids.len(),
            "queued pages for analysis"
        );
        Ok(Submitted {
            ack,
            submitted: ids.to_vec(),
            reload_after: self.reload_delay,
        })
    }
}
