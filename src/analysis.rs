//! Usage/impact panel orchestrator.
//!
//! Two independent commands share one symbol-name/file-path input pair:
//!
//! - [`show_usage`](AnalysisPanel::show_usage): what the symbol calls and
//!   what calls it.
//! - [`analyze_impact`](AnalysisPanel::analyze_impact): risk assessment of
//!   changing the symbol.
//!
//! Each has its own result slot and its own cache key, may be in flight at
//! the same time as the other, and only ever touches its own slot. A failure
//! clears that slot's result and sets its error; the sibling is untouched.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::cache::{Outcome, QueryKey, RequestCache};
use crate::client::AnalysisBackend;
use crate::error::WorkbenchError;
use crate::models::{ImpactRequest, ImpactResult, ProjectId, UsageResult};
use crate::navigation::ContextListener;
use crate::panel::{OnFailure, PanelState, Slot};

pub const USAGE_FAILURE: &str = "Error: Failed to load usage";
pub const IMPACT_FAILURE: &str = "Error: Failed to analyze impact";

#[derive(Debug, Default)]
struct AnalysisState {
    project: Option<ProjectId>,
    symbol_name: String,
    file_path: String,
    usage: Slot<UsageResult>,
    impact: Slot<ImpactResult>,
}

impl AnalysisState {
    /// Validated (project, symbol, file) triple.
    fn target(&self) -> Result<(ProjectId, String, String), WorkbenchError> {
        let project = self
            .project
            .ok_or_else(|| WorkbenchError::validation("Select a project to analyze usage and impact"))?;
        let symbol = self.symbol_name.trim();
        let file = self.file_path.trim();
        if symbol.is_empty() || file.is_empty() {
            return Err(WorkbenchError::validation(
                "Please enter symbol name and file path",
            ));
        }
        Ok((project, symbol.to_string(), file.to_string()))
    }
}

pub struct AnalysisPanel {
    backend: Arc<dyn AnalysisBackend>,
    cache: Arc<RequestCache>,
    state: Mutex<AnalysisState>,
}

impl AnalysisPanel {
    pub fn new(backend: Arc<dyn AnalysisBackend>, cache: Arc<RequestCache>) -> Self {
        Self {
            backend,
            cache,
            state: Mutex::new(AnalysisState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_symbol_name(&self, name: &str) {
        self.lock().symbol_name = name.to_string();
    }

    pub fn set_file_path(&self, path: &str) {
        self.lock().file_path = path.to_string();
    }

    /// Current (symbol name, file path) inputs.
    pub fn inputs(&self) -> (String, String) {
        let state = self.lock();
        (state.symbol_name.clone(), state.file_path.clone())
    }

    pub fn usage(&self) -> PanelState<UsageResult> {
        self.lock().usage.state()
    }

    pub fn impact(&self) -> PanelState<ImpactResult> {
        self.lock().impact.state()
    }

    /// Query callers/callees of the symbol in the inputs.
    ///
    /// `Ok(None)` means the answer was superseded and discarded.
    pub async fn show_usage(&self) -> Result<Option<UsageResult>, WorkbenchError> {
        let ((project, symbol, file), ticket) = {
            let mut state = self.lock();
            let target = state.target()?;
            (target, state.usage.begin())
        };

        info!(%project, symbol = %symbol, file = %file, "loading usage");
        let key = QueryKey::new("usage").with(project).with(&symbol).with(&file);
        let backend = self.backend.clone();
        let outcome = self
            .cache
            .mutate(&key, move || async move {
                backend.get_usage(project, &symbol, &file).await
            })
            .await;

        let mut state = self.lock();
        settle(&mut state.usage, ticket, outcome, USAGE_FAILURE)
    }

    /// Ask the backend for the impact of changing the symbol in the inputs.
    pub async fn analyze_impact(
        &self,
        change_description: Option<&str>,
    ) -> Result<Option<ImpactResult>, WorkbenchError> {
        let ((project, symbol, file), ticket) = {
            let mut state = self.lock();
            let target = state.target()?;
            (target, state.impact.begin())
        };

        info!(%project, symbol = %symbol, file = %file, "analyzing impact");
        let key = QueryKey::new("impact").with(project).with(&symbol).with(&file);
        let request = ImpactRequest {
            symbol_name: symbol,
            file_path: file,
            change_description: change_description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };
        let backend = self.backend.clone();
        let outcome = self
            .cache
            .mutate(&key, move || async move {
                backend.get_impact(project, &request).await
            })
            .await;

        let mut state = self.lock();
        settle(&mut state.impact, ticket, outcome, IMPACT_FAILURE)
    }
}

fn settle<T: Clone>(
    slot: &mut Slot<T>,
    ticket: u64,
    outcome: Outcome<T>,
    failure: &str,
) -> Result<Option<T>, WorkbenchError> {
    match outcome {
        Outcome::Ready(value) => Ok(slot.succeed(ticket, value.clone()).then_some(value)),
        Outcome::Failed(err) => {
            if slot.fail(ticket, failure.to_string(), OnFailure::ClearResult) {
                warn!(error = %err, "{}", failure);
                return Err(err.into());
            }
            Ok(None)
        }
        Outcome::Stale => Ok(None),
    }
}

impl ContextListener for AnalysisPanel {
    fn project_changed(&self, project: Option<ProjectId>) {
        let mut state = self.lock();
        if let Some(previous) = state.project {
            self.cache.evict(&QueryKey::new("usage").with(previous));
            self.cache.evict(&QueryKey::new("impact").with(previous));
        }
        state.project = project;
        state.symbol_name.clear();
        state.file_path.clear();
        state.usage.reset();
        state.impact.reset();
    }

    fn file_changed(&self, path: Option<&str>) {
        let mut state = self.lock();
        if let Some(path) = path {
            if state.file_path.trim().is_empty() {
                state.file_path = path.to_string();
            }
        }
    }
}
