//! Explain panel orchestrator.
//!
//! Explains the code currently selected in the editor. The selection and
//! the active file are pushed in by the shell controller; [`explain`] turns
//! them into a single `POST /explain` command. A new explanation replaces
//! the old one; a failure sets the error flag and leaves the previous
//! explanation on screen.
//!
//! [`explain`]: ExplainPanel::explain

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::cache::{Outcome, QueryKey, RequestCache};
use crate::client::AnalysisBackend;
use crate::error::WorkbenchError;
use crate::models::{ExplainRequest, ExplainResponse, ProjectId};
use crate::navigation::ContextListener;
use crate::panel::{OnFailure, PanelState, Slot};
use crate::selection::SelectionSignal;

/// Panel error text shown when the backend call fails.
pub const FAILURE_MESSAGE: &str = "Error: Failed to explain code";

#[derive(Debug, Default)]
struct ExplainState {
    selection: SelectionSignal,
    file_path: Option<String>,
    slot: Slot<ExplainResponse>,
}

pub struct ExplainPanel {
    backend: Arc<dyn AnalysisBackend>,
    cache: Arc<RequestCache>,
    state: Mutex<ExplainState>,
}

impl ExplainPanel {
    pub fn new(backend: Arc<dyn AnalysisBackend>, cache: Arc<RequestCache>) -> Self {
        Self {
            backend,
            cache,
            state: Mutex::new(ExplainState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExplainState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_selection(&self, signal: SelectionSignal) {
        self.lock().selection = signal;
    }

    pub fn selection(&self) -> SelectionSignal {
        self.lock().selection.clone()
    }

    pub fn state(&self) -> PanelState<ExplainResponse> {
        self.lock().slot.state()
    }

    /// Explain the current selection.
    ///
    /// Returns `Ok(None)` when a newer request or a project change
    /// superseded this one before the answer arrived.
    pub async fn explain(&self) -> Result<Option<ExplainResponse>, WorkbenchError> {
        let (request, ticket) = {
            let mut state = self.lock();
            let code = state
                .selection
                .code
                .clone()
                .filter(|code| !code.trim().is_empty())
                .ok_or_else(|| WorkbenchError::validation("Please select some code to explain"))?;
            let language = Some(state.selection.language.clone()).filter(|l| !l.is_empty());
            let request = ExplainRequest {
                code,
                file_path: state.file_path.clone(),
                language,
            };
            (request, state.slot.begin())
        };

        info!(chars = request.code.len(), language = ?request.language, "explaining selection");
        let backend = self.backend.clone();
        let outcome = self
            .cache
            .mutate(&QueryKey::new("explain"), move || async move {
                backend.explain_code(&request).await
            })
            .await;

        let mut state = self.lock();
        match outcome {
            Outcome::Ready(response) => {
                if state.slot.succeed(ticket, response.clone()) {
                    return Ok(Some(response));
                }
                Ok(None)
            }
            Outcome::Failed(err) => {
                if state
                    .slot
                    .fail(ticket, FAILURE_MESSAGE.to_string(), OnFailure::KeepResult)
                {
                    warn!(error = %err, "explain request failed");
                    return Err(err.into());
                }
                Ok(None)
            }
            Outcome::Stale => Ok(None),
        }
    }
}

impl ContextListener for ExplainPanel {
    fn project_changed(&self, _project: Option<ProjectId>) {
        let mut state = self.lock();
        state.slot.reset();
        state.selection = SelectionSignal::none();
        state.file_path = None;
    }

    fn file_changed(&self, path: Option<&str>) {
        self.lock().file_path = path.map(str::to_string);
    }
}
