//! Chat panel orchestrator.
//!
//! Keeps the conversation for the active project in memory. A send appends
//! the user message straight away, then the assistant's answer when it
//! arrives; a failed send appends an assistant message flagged as an error.
//! The transcript is never rolled back. It survives file changes and is
//! cleared when the active project changes.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::cache::{Outcome, QueryKey, RequestCache};
use crate::client::AnalysisBackend;
use crate::error::WorkbenchError;
use crate::models::{ChatMessage, ProjectId};
use crate::navigation::ContextListener;

/// Transcript text appended when a send fails.
pub const FAILURE_MESSAGE: &str = "Error: Failed to get response";

#[derive(Debug, Default)]
struct ChatState {
    project: Option<ProjectId>,
    messages: Vec<ChatMessage>,
    pending: bool,
    /// Bumped on every project change; a reply for an older session is dropped.
    session: u64,
}

pub struct ChatPanel {
    backend: Arc<dyn AnalysisBackend>,
    cache: Arc<RequestCache>,
    state: Mutex<ChatState>,
}

impl ChatPanel {
    pub fn new(backend: Arc<dyn AnalysisBackend>, cache: Arc<RequestCache>) -> Self {
        Self {
            backend,
            cache,
            state: Mutex::new(ChatState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn project(&self) -> Option<ProjectId> {
        self.lock().project
    }

    /// Send `text` to the active project's chat.
    ///
    /// Blank text, no active project, or a send already in flight are
    /// rejected without touching the transcript. Backend failures are not
    /// returned as errors; they show up as a flagged assistant message.
    pub async fn send(&self, text: &str) -> Result<(), WorkbenchError> {
        let (project, session) = {
            let mut state = self.lock();
            if text.trim().is_empty() {
                return Err(WorkbenchError::validation("Message must not be empty"));
            }
            let project = state
                .project
                .ok_or_else(|| WorkbenchError::validation("Select a project to chat"))?;
            if state.pending {
                return Err(WorkbenchError::validation(
                    "Wait for the current answer before sending another message",
                ));
            }
            state.messages.push(ChatMessage::user(text));
            state.pending = true;
            (project, state.session)
        };

        info!(%project, "sending chat message");
        let backend = self.backend.clone();
        let message = text.to_string();
        let outcome = self
            .cache
            .mutate(&QueryKey::new("chat").with(project), move || async move {
                backend.send_chat_message(project, &message).await
            })
            .await;

        let mut state = self.lock();
        if state.session != session {
            return Ok(());
        }
        state.pending = false;
        match outcome {
            Outcome::Ready(response) => state.messages.push(ChatMessage::assistant(response)),
            Outcome::Failed(err) => {
                warn!(%project, error = %err, "chat request failed");
                state.messages.push(ChatMessage::failure(FAILURE_MESSAGE));
            }
            Outcome::Stale => {}
        }
        Ok(())
    }
}

impl ContextListener for ChatPanel {
    fn project_changed(&self, project: Option<ProjectId>) {
        let mut state = self.lock();
        state.project = project;
        state.messages.clear();
        state.pending = false;
        state.session += 1;
    }
}
