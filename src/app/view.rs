use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::app::batch::{BatchAnalysisSubmitter, Selection, SubmitError, Submitted};
use crate::app::discovery::{DiscoveryError, DiscoveryOrchestrator, DiscoveryTiming, Progress};
use crate::app::registry::PageRegistry;
use crate::app::report::{AverageScore, average_score};
use crate::error::ApiError;
use crate::formats::PageRoute;
use crate::gateway::PageGateway;
use crate::status::StatusFilter;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ViewError {
    #[error("a newer page request replaced this one")]
    Superseded,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    NoPagesFound,
    NoPagesAvailable,
}

impl EmptyState {
    pub fn title(self) -> &'static str {
        match self {
            Self::NoPagesFound => "No Pages Found",
            Self::NoPagesAvailable => "No Pages Available",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            Self::NoPagesFound => {
                "The search didn't find any pages. Try clicking 'Find Pages' to discover new pages."
            }
            Self::NoPagesAvailable => {
                "No pages have been discovered yet. Click 'Find Pages' to start discovering pages on your website."
            }
        }
    }
}

/// Outcome of a submission followed by a status reload. The submission stands even
/// when the reload fails.
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub submitted: Submitted,
    pub reload_error: Option<ViewError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickStats {
    pub pages: usize,
    pub has_discovered: bool,
    pub average_score: AverageScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Status,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub status: StatusFilter,
    pub search: Option<String>,
    pub sort: Option<SortKey>,
}

impl PageQuery {
    pub fn apply<'a>(&self, registry: &'a PageRegistry) -> Vec<&'a PageRoute> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut routes: Vec<&PageRoute> = registry
            .filter_by_status(&self.status)
            .into_iter()
            .filter(|route| match &needle {
                Some(needle) => {
                    route.page_name.to_lowercase().contains(needle)
                        || route.page_url.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect();

        match self.sort {
            Some(SortKey::Name) => routes.sort_by(|a, b| by_name(a, b)),
            Some(SortKey::Status) => {
                routes.sort_by(|a, b| a.status.label().cmp(&b.status.label()))
            }
            None => {}
        }
        routes
    }
}

fn by_name(a: &PageRoute, b: &PageRoute) -> Ordering {
    a.page_name
        .to_lowercase()
        .cmp(&b.page_name.to_lowercase())
        .then_with(|| a.page_name.cmp(&b.page_name))
}

#[derive(Debug, Default)]
struct ViewState {
    registry: PageRegistry,
    selection: Selection,
    has_discovered: bool,
    issued: u64,
    applied: u64,
    pending: BTreeSet<u64>,
}

/// A registry request in flight. Dropping it without applying retires it, so a failed
/// request never invalidates an older one.
struct Ticket<'a> {
    view: &'a ProjectDetailView,
    id: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.view.lock().pending.remove(&self.id);
    }
}

pub struct ProjectDetailView {
    project_id: u64,
    gateway: Arc<dyn PageGateway>,
    discovery: DiscoveryOrchestrator,
    submitter: BatchAnalysisSubmitter,
    state: Mutex<ViewState>,
}

impl ProjectDetailView {
    pub fn new(gateway: Arc<dyn PageGateway>, project_id: u64) -> Self {
        Self::with_parts(
            Arc::clone(&gateway),
            project_id,
            DiscoveryOrchestrator::new(gateway.clone(), DiscoveryTiming::default()),
            BatchAnalysisSubmitter::new(gateway),
        )
    }

    pub fn with_parts(
        gateway: Arc<dyn PageGateway>,
        project_id: u64,
        discovery: DiscoveryOrchestrator,
        submitter: BatchAnalysisSubmitter,
    ) -> Self {
        Self {
            project_id,
            gateway,
            discovery,
            submitter,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.discovery.progress()
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_running()
    }

    pub async fn load(&self) -> Result<usize, ViewError> {
        let ticket = self.issue();
        let routes = self.gateway.available_routes(self.project_id).await?;
        let found_any = !routes.is_empty();
        self.apply(ticket, routes, found_any)
    }

    pub async fn find_pages(&self) -> Result<usize, ViewError> {
        let admitted = self.discovery.admit()?;
        let ticket = self.issue();
        let routes = admitted.run(self.project_id).await?;
        self.apply(ticket, routes, true)
    }

    /// Submits the current selection. Submitted ids leave the selection on success;
    /// on failure the selection is untouched.
    pub async fn analyze_selected(&self) -> Result<Submitted, ViewError> {
        let ids = self.lock().selection.ids();
        let submitted = self.submitter.analyze(self.project_id, &ids).await?;
        let mut state = self.lock();
        for id in &submitted.submitted {
            state.selection.deselect(*id);
        }
        Ok(submitted)
    }

    /// Submits the selection, waits the reload delay, then reloads statuses.
    pub async fn analyze_and_refresh(&self) -> Result<Analyzed, ViewError> {
        let submitted = self.analyze_selected().await?;
        tokio::time::sleep(submitted.reload_after).await;
        let reload_error = match self.load().await {
            Ok(_) | Err(ViewError::Superseded) => None,
            Err(err) => {
                tracing::warn!(project_id = self.project_id, %err, "reload after analysis failed");
                Some(err)
            }
        };
        Ok(Analyzed {
            submitted,
            reload_error,
        })
    }

    pub fn select(&self, id: u64) -> bool {
        let mut state = self.lock();
        let ViewState {
            registry,
            selection,
            ..
        } = &mut *state;
        selection.select(registry, id)
    }

    pub fn deselect(&self, id: u64) -> bool {
        self.lock().selection.deselect(id)
    }

    pub fn toggle(&self, id: u64) -> bool {
        let mut state = self.lock();
        let ViewState {
            registry,
            selection,
            ..
        } = &mut *state;
        selection.toggle(registry, id)
    }

    pub fn select_all(&self) {
        let mut state = self.lock();
        let ViewState {
            registry,
            selection,
            ..
        } = &mut *state;
        selection.select_all(registry);
    }

    pub fn clear_selection(&self) {
        self.lock().selection.clear();
    }

    pub fn selection(&self) -> Selection {
        self.lock().selection.clone()
    }

    pub fn routes(&self) -> Vec<PageRoute> {
        self.lock().registry.routes().to_vec()
    }

    pub fn page(&self, id: u64) -> Option<PageRoute> {
        self.lock().registry.get(id).cloned()
    }

    pub fn query(&self, query: &PageQuery) -> Vec<PageRoute> {
        let state = self.lock();
        query.apply(&state.registry).into_iter().cloned().collect()
    }

    pub fn has_discovered(&self) -> bool {
        self.lock().has_discovered
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        let state = self.lock();
        if !state.registry.is_empty() {
            None
        } else if state.has_discovered {
            Some(EmptyState::NoPagesFound)
        } else {
            Some(EmptyState::NoPagesAvailable)
        }
    }

    pub fn quick_stats(&self) -> QuickStats {
        let state = self.lock();
        QuickStats {
            pages: state.registry.len(),
            has_discovered: state.has_discovered,
            average_score: average_score(state.registry.routes()),
        }
    }

    fn issue(&self) -> Ticket<'_> {
        let mut state = self.lock();
        state.issued += 1;
        let id = state.issued;
        state.pending.insert(id);
        Ticket { view: self, id }
    }

    /// Drops the response if a newer request was applied or is still in flight.
    fn apply(
        &self,
        ticket: Ticket<'_>,
        routes: Vec<PageRoute>,
        discovered: bool,
    ) -> Result<usize, ViewError> {
        let id = ticket.id;
        drop(ticket);
        let mut state = self.lock();
        let newer_pending = state.pending.range(id + 1..).next().is_some();
        if id < state.applied || newer_pending {
            tracing::debug!(
                ticket = id,
                applied = state.applied,
                newer_pending,
                "dropping superseded page response"
            );
            return Err(ViewError::Superseded);
        }
        let ViewState {
            registry,
            selection,
            has_discovered,
            applied,
            ..
        } = &mut *state;
        *applied = id;
        registry.replace_all(routes);
        *has_discovered |= discovered;
        let dropped = selection.reconcile(registry);
        if dropped > 0 {
            tracing::info!(dropped, "dropped selected pages that no longer exist");
        }
        Ok(registry.len())
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
