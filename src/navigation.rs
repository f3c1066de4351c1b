//! Navigation state: the active project and active file.
//!
//! Owns the two identifiers every other query is keyed off, plus the derived
//! queries built on the [`RequestCache`]:
//!
//! | Query | Key | Style |
//! |-------|-----|-------|
//! | project list | `["projects"]` | `query` |
//! | file list | `["files", project]` | `query` |
//! | file content | `["content", project, path]` | `query` |
//! | create project | `["create-project"]` | `mutate`, invalidates `["projects"]` |
//! | upload archive | `["upload", project]` | `mutate`, invalidates `["files", project]` |
//!
//! Mutations invalidate from inside the producer, as soon as the backend
//! acknowledges the write. A superseded reply is discarded but the server
//! side effect still happened, so the dependent list is refreshed either way.
//!
//! Changing the active project clears the active file and evicts the old
//! project's file contents from the cache. Both changes are
//! announced synchronously to registered [`ContextListener`]s (the panel
//! orchestrators), in registration order, after the new state is in place.
//!
//! The content shown in the editor is derived from the active key
//! ([`displayed_content`](Navigation::displayed_content)), so a late
//! response for a previously selected file lands in that file's entry and is
//! never displayed.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::cache::{EntrySnapshot, Outcome, QueryKey, RequestCache};
use crate::client::AnalysisBackend;
use crate::error::{ClientError, WorkbenchError};
use crate::models::{Archive, FileContent, NewProject, Project, ProjectId};

pub fn projects_key() -> QueryKey {
    QueryKey::new("projects")
}

pub fn files_key(project: ProjectId) -> QueryKey {
    QueryKey::new("files").with(project)
}

pub fn content_key(project: ProjectId, path: &str) -> QueryKey {
    QueryKey::new("content").with(project).with(path)
}

/// Observer of navigation changes.
pub trait ContextListener: Send + Sync {
    /// The active project changed. The active file has already been cleared.
    fn project_changed(&self, project: Option<ProjectId>);

    /// The active file changed within the current project.
    fn file_changed(&self, _path: Option<&str>) {}
}

/// The active (project, file) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContext {
    pub project: Option<ProjectId>,
    pub file: Option<String>,
}

pub struct Navigation {
    backend: Arc<dyn AnalysisBackend>,
    cache: Arc<RequestCache>,
    active: Mutex<ActiveContext>,
    listeners: Mutex<Vec<Arc<dyn ContextListener>>>,
}

impl Navigation {
    pub fn new(backend: Arc<dyn AnalysisBackend>, cache: Arc<RequestCache>) -> Self {
        Self {
            backend,
            cache,
            active: Mutex::new(ActiveContext::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn active_guard(&self) -> MutexGuard<'_, ActiveContext> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn listeners(&self) -> Vec<Arc<dyn ContextListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn subscribe(&self, listener: Arc<dyn ContextListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
    }

    pub fn active(&self) -> ActiveContext {
        self.active_guard().clone()
    }

    pub fn active_project(&self) -> Option<ProjectId> {
        self.active_guard().project
    }

    pub fn active_file(&self) -> Option<String> {
        self.active_guard().file.clone()
    }

    /// Set the active project. Returns `false` when it was already active.
    pub fn select_project(&self, project: Option<ProjectId>) -> bool {
        {
            let mut active = self.active_guard();
            if active.project == project {
                return false;
            }
            if let Some(previous) = active.project {
                self.cache.evict(&QueryKey::new("content").with(previous));
            }
            active.project = project;
            active.file = None;
        }
        info!(project = ?project, "active project changed");
        for listener in self.listeners() {
            listener.project_changed(project);
        }
        true
    }

    /// Set the active file. Requires an active project when `path` is set.
    pub fn select_file(&self, path: Option<&str>) -> Result<bool, WorkbenchError> {
        {
            let mut active = self.active_guard();
            if path.is_some() && active.project.is_none() {
                return Err(WorkbenchError::validation("Select a project first"));
            }
            if active.file.as_deref() == path {
                return Ok(false);
            }
            active.file = path.map(str::to_string);
        }
        for listener in self.listeners() {
            listener.file_changed(path);
        }
        Ok(true)
    }

    pub async fn projects(&self) -> Outcome<Vec<Project>> {
        let backend = self.backend.clone();
        self.cache
            .query(&projects_key(), move || async move {
                backend.list_projects().await
            })
            .await
    }

    /// Create a project and invalidate the project list.
    pub async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Project>, WorkbenchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkbenchError::validation("Project name must not be empty"));
        }
        let request = NewProject {
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };

        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let outcome = self
            .cache
            .mutate(&QueryKey::new("create-project"), move || async move {
                let created = backend.create_project(&request).await?;
                cache.invalidate(&projects_key());
                Ok::<_, ClientError>(created)
            })
            .await;

        match outcome.into_result() {
            Some(Ok(project)) => {
                info!(project = %project.id, name = %project.name, "project created");
                Ok(Some(project))
            }
            Some(Err(err)) => {
                warn!(error = %err, "project creation failed");
                Err(err.into())
            }
            None => Ok(None),
        }
    }

    pub async fn file_list(&self, project: ProjectId) -> Outcome<Vec<String>> {
        let backend = self.backend.clone();
        self.cache
            .query(&files_key(project), move || async move {
                backend.list_files(project).await
            })
            .await
    }

    /// File list of the active project.
    pub async fn active_file_list(&self) -> Result<Outcome<Vec<String>>, WorkbenchError> {
        let project = self
            .active_project()
            .ok_or_else(|| WorkbenchError::validation("Select a project to view files"))?;
        Ok(self.file_list(project).await)
    }

    pub async fn file_content(&self, project: ProjectId, path: &str) -> Outcome<FileContent> {
        let backend = self.backend.clone();
        let owned = path.to_string();
        self.cache
            .query(&content_key(project, path), move || async move {
                backend.get_file_content(project, &owned).await
            })
            .await
    }

    /// Make `path` the active file and fetch its content.
    ///
    /// The returned outcome is for this request only; what the editor shows
    /// is [`displayed_content`](Self::displayed_content), which always follows
    /// the most recently opened file.
    pub async fn open_file(&self, path: &str) -> Result<Outcome<FileContent>, WorkbenchError> {
        let (project, path) = self.check_open(path)?;
        self.select_file(Some(path))?;
        Ok(self.file_content(project, path).await)
    }

    /// Validate an [`open_file`](Self::open_file) call without changing any
    /// state. Returns the active project and the trimmed path.
    pub fn check_open<'a>(&self, path: &'a str) -> Result<(ProjectId, &'a str), WorkbenchError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(WorkbenchError::validation("File path must not be empty"));
        }
        let project = self
            .active_project()
            .ok_or_else(|| WorkbenchError::validation("Select a project first"))?;
        Ok((project, path))
    }

    /// Content for the active (project, file) pair, if it has loaded.
    pub fn displayed_content(&self) -> Option<FileContent> {
        let ActiveContext { project, file } = self.active();
        let key = content_key(project?, file.as_deref()?);
        self.cache.peek(&key)
    }

    /// Load state of the active file's content entry.
    pub fn displayed_status(&self) -> Option<EntrySnapshot> {
        let ActiveContext { project, file } = self.active();
        self.cache.snapshot(&content_key(project?, file.as_deref()?))
    }

    /// Upload a ZIP archive into `project`; once the backend accepts it the
    /// project's file list is invalidated, even if a newer upload supersedes
    /// this reply.
    ///
    /// `Ok(false)` means the reply was superseded.
    pub async fn upload_archive(
        &self,
        project: ProjectId,
        archive: Archive,
    ) -> Result<bool, WorkbenchError> {
        let entries = validate_archive(&archive)?;
        info!(%project, file = %archive.file_name, entries, "uploading archive");

        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let outcome = self
            .cache
            .mutate(&QueryKey::new("upload").with(project), move || async move {
                backend.upload_archive(project, &archive).await?;
                cache.invalidate(&files_key(project));
                Ok::<_, ClientError>(())
            })
            .await;

        match outcome.into_result() {
            Some(Ok(())) => Ok(true),
            Some(Err(err)) => {
                warn!(%project, error = %err, "upload failed");
                Err(err.into())
            }
            None => Ok(false),
        }
    }
}

/// Check that `archive` is a readable ZIP; returns its entry count.
pub fn validate_archive(archive: &Archive) -> Result<usize, WorkbenchError> {
    let is_zip_name = Path::new(&archive.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if !is_zip_name {
        return Err(WorkbenchError::validation("Please select a ZIP file"));
    }
    let reader = zip::ZipArchive::new(Cursor::new(archive.bytes.as_slice()))
        .map_err(|e| WorkbenchError::validation(format!("Not a readable ZIP archive: {}", e)))?;
    Ok(reader.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("a.py", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"print('a')\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_validate_archive_accepts_zip() {
        let archive = Archive {
            file_name: "Demo.ZIP".into(),
            bytes: zip_bytes(),
        };
        assert_eq!(validate_archive(&archive).unwrap(), 1);
    }

    #[test]
    fn test_validate_archive_rejects_wrong_extension() {
        let archive = Archive {
            file_name: "demo.tar.gz".into(),
            bytes: zip_bytes(),
        };
        assert!(validate_archive(&archive).unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_archive_rejects_garbage() {
        let archive = Archive {
            file_name: "demo.zip".into(),
            bytes: b"not a zip".to_vec(),
        };
        assert!(validate_archive(&archive).unwrap_err().is_validation());
    }

    #[test]
    fn test_keys_nest_under_operation() {
        let content = content_key(ProjectId(1), "a.py");
        assert!(content.starts_with(&QueryKey::new("content").with(ProjectId(1))));
        assert!(!content.starts_with(&files_key(ProjectId(1))));
    }
}
