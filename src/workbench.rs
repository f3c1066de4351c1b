//! Shell controller.
//!
//! Composes navigation, the selection bridge and the three panel
//! orchestrators into one [`Workbench`]. It owns the active right-hand tab
//! and the current selection signal; the panels subscribe to navigation
//! changes at construction time, so selecting a project resets every panel
//! before [`Workbench::select_project`] returns.
//!
//! Tab switches requested by the selection bridge arrive over a
//! one-directional channel and are applied as soon as the event that caused
//! them has been handled.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::analysis::AnalysisPanel;
use crate::cache::{Outcome, RequestCache};
use crate::chat::ChatPanel;
use crate::client::AnalysisBackend;
use crate::error::WorkbenchError;
use crate::explain::ExplainPanel;
use crate::models::{Archive, FileContent, Project, ProjectId};
use crate::navigation::Navigation;
use crate::selection::{
    extract_lines, Position, SelectionBridge, SelectionEvent, SelectionSignal, Tab, TabRequest,
};

pub struct Workbench {
    navigation: Navigation,
    chat: Arc<ChatPanel>,
    explain: Arc<ExplainPanel>,
    analysis: Arc<AnalysisPanel>,
    bridge: SelectionBridge,
    tab_requests: Mutex<mpsc::UnboundedReceiver<TabRequest>>,
    active_tab: Mutex<Tab>,
    selection: Mutex<SelectionSignal>,
}

impl Workbench {
    pub fn new(backend: Arc<dyn AnalysisBackend>, fallback_language: &str) -> Self {
        let cache = Arc::new(RequestCache::new());
        let navigation = Navigation::new(backend.clone(), cache.clone());

        let chat = Arc::new(ChatPanel::new(backend.clone(), cache.clone()));
        let explain = Arc::new(ExplainPanel::new(backend.clone(), cache.clone()));
        let analysis = Arc::new(AnalysisPanel::new(backend, cache));
        navigation.subscribe(chat.clone());
        navigation.subscribe(explain.clone());
        navigation.subscribe(analysis.clone());

        let (bridge, tab_requests) = SelectionBridge::channel(fallback_language);

        Self {
            navigation,
            chat,
            explain,
            analysis,
            bridge,
            tab_requests: Mutex::new(tab_requests),
            active_tab: Mutex::new(Tab::default()),
            selection: Mutex::new(SelectionSignal::none()),
        }
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    pub fn explain(&self) -> &ExplainPanel {
        &self.explain
    }

    pub fn analysis(&self) -> &AnalysisPanel {
        &self.analysis
    }

    fn selection_guard(&self) -> MutexGuard<'_, SelectionSignal> {
        self.selection.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn tab_guard(&self) -> MutexGuard<'_, Tab> {
        self.active_tab.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn active_tab(&self) -> Tab {
        *self.tab_guard()
    }

    pub fn set_tab(&self, tab: Tab) {
        *self.tab_guard() = tab;
    }

    pub fn selection(&self) -> SelectionSignal {
        self.selection_guard().clone()
    }

    fn set_selection(&self, signal: SelectionSignal) {
        *self.selection_guard() = signal.clone();
        self.explain.set_selection(signal);
    }

    pub async fn projects(&self) -> Outcome<Vec<Project>> {
        self.navigation.projects().await
    }

    /// Switch project. Every panel is reset and the selection cleared.
    pub fn select_project(&self, project: Option<ProjectId>) -> bool {
        let changed = self.navigation.select_project(project);
        if changed {
            *self.selection_guard() = SelectionSignal::none();
        }
        changed
    }

    /// Create a project and make it the active one.
    pub async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Project>, WorkbenchError> {
        let created = self.navigation.create_project(name, description).await?;
        if let Some(project) = &created {
            self.select_project(Some(project.id));
        }
        Ok(created)
    }

    pub async fn upload_archive(&self, archive: Archive) -> Result<bool, WorkbenchError> {
        let project = self
            .navigation
            .active_project()
            .ok_or_else(|| WorkbenchError::validation("Select a project to upload into"))?;
        self.navigation.upload_archive(project, archive).await
    }

    pub async fn files(&self) -> Result<Outcome<Vec<String>>, WorkbenchError> {
        self.navigation.active_file_list().await
    }

    /// Open `path` in the editor. The old buffer's selection goes away with it.
    pub async fn open_file(&self, path: &str) -> Result<Outcome<FileContent>, WorkbenchError> {
        let (_, path) = self.navigation.check_open(path)?;
        if self.navigation.active_file().as_deref() != Some(path) {
            self.set_selection(SelectionSignal::none());
        }
        self.navigation.open_file(path).await
    }

    /// Content the editor shows: always the active file's, never a late
    /// response for a file opened earlier.
    pub fn displayed_content(&self) -> Option<FileContent> {
        self.navigation.displayed_content()
    }

    /// Feed one editor selection event through the bridge.
    pub fn on_selection(&self, event: &SelectionEvent) -> SelectionSignal {
        let active_file = self.navigation.active_file();
        let signal = self.bridge.normalize(event, active_file.as_deref());
        self.set_selection(signal.clone());
        self.apply_tab_requests();
        signal
    }

    /// Select 1-based lines `start..=end` of the displayed file.
    pub fn select_lines(&self, start: usize, end: usize) -> Result<SelectionSignal, WorkbenchError> {
        let content = self
            .displayed_content()
            .ok_or_else(|| WorkbenchError::validation("Open a file before selecting code"))?;
        let event = extract_lines(&content.content, start, end)
            .unwrap_or_else(|| SelectionEvent::cursor(Position::default()));
        Ok(self.on_selection(&event))
    }

    pub fn clear_selection(&self) -> SelectionSignal {
        self.on_selection(&SelectionEvent::cursor(Position::default()))
    }

    fn apply_tab_requests(&self) {
        let mut requests = self.tab_requests.lock().unwrap_or_else(|p| p.into_inner());
        while let Ok(TabRequest::Focus(tab)) = requests.try_recv() {
            debug!(%tab, "focus requested by selection");
            *self.tab_guard() = tab;
        }
    }
}
