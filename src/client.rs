//! Remote analysis client.
//!
//! [`AnalysisBackend`] is the typed boundary to the code-analysis backend:
//! one method per capability, strongly typed parameters, typed results, and
//! failures classified as [`ClientError`]. Implementations hold no workbench
//! state and never retry; retry is left to whoever issued the command.
//!
//! [`HttpClient`] implements the trait over the backend's REST surface
//! (base path `/api`):
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `GET`  | `/projects` | [`list_projects`](AnalysisBackend::list_projects) |
//! | `POST` | `/projects` | [`create_project`](AnalysisBackend::create_project) |
//! | `POST` | `/projects/{id}/upload` | [`upload_archive`](AnalysisBackend::upload_archive) (multipart, field `file`) |
//! | `GET`  | `/projects/{id}/files` | [`list_files`](AnalysisBackend::list_files) |
//! | `GET`  | `/projects/{id}/file?file_path=` | [`get_file_content`](AnalysisBackend::get_file_content) |
//! | `POST` | `/projects/{id}/chat` | [`send_chat_message`](AnalysisBackend::send_chat_message) |
//! | `POST` | `/explain` | [`explain_code`](AnalysisBackend::explain_code) |
//! | `GET`  | `/projects/{id}/usage?symbol_name=&file_path=` | [`get_usage`](AnalysisBackend::get_usage) |
//! | `POST` | `/projects/{id}/impact` | [`get_impact`](AnalysisBackend::get_impact) |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::ClientError;
use crate::models::{
    Archive, ChatResponse, ExplainRequest, ExplainResponse, FileContent, ImpactRequest,
    ImpactResult, NewProject, Project, ProjectId, UsageResult,
};

/// Typed request/response boundary to the analysis backend.
///
/// Implementations must be `Send + Sync`; the workbench shares one instance
/// between navigation and all panels.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ClientError>;

    async fn create_project(&self, project: &NewProject) -> Result<Project, ClientError>;

    /// Upload a ZIP archive into a project. The backend extracts and
    /// re-indexes it; no response body is defined beyond success.
    async fn upload_archive(&self, project: ProjectId, archive: &Archive)
        -> Result<(), ClientError>;

    /// Ordered list of file paths in a project.
    async fn list_files(&self, project: ProjectId) -> Result<Vec<String>, ClientError>;

    async fn get_file_content(
        &self,
        project: ProjectId,
        path: &str,
    ) -> Result<FileContent, ClientError>;

    async fn send_chat_message(
        &self,
        project: ProjectId,
        message: &str,
    ) -> Result<ChatResponse, ClientError>;

    async fn explain_code(&self, request: &ExplainRequest)
        -> Result<ExplainResponse, ClientError>;

    async fn get_usage(
        &self,
        project: ProjectId,
        symbol_name: &str,
        file_path: &str,
    ) -> Result<UsageResult, ClientError>;

    async fn get_impact(
        &self,
        project: ProjectId,
        request: &ImpactRequest,
    ) -> Result<ImpactResult, ClientError>;
}

/// [`AnalysisBackend`] over HTTP using `reqwest`.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Build a client from the `[backend]` configuration section.
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), error_message(&body, status)))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Server {
            status,
            message: format!("malformed response body: {}", e),
        })
    }
}

/// FastAPI reports errors as `{"detail": "..."}`; fall back to the raw
/// body, then to the status reason.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }

    if let Ok(Detail { detail }) = serde_json::from_str::<Detail>(body) {
        return match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl AnalysisBackend for HttpClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        debug!("GET /projects");
        self.fetch(self.http.get(self.url("/projects"))).await
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project, ClientError> {
        debug!(name = %project.name, "POST /projects");
        self.fetch(self.http.post(self.url("/projects")).json(project))
            .await
    }

    async fn upload_archive(
        &self,
        project: ProjectId,
        archive: &Archive,
    ) -> Result<(), ClientError> {
        debug!(%project, file = %archive.file_name, bytes = archive.bytes.len(), "POST upload");
        let part = Part::bytes(archive.bytes.clone())
            .file_name(archive.file_name.clone())
            .mime_str("application/zip")?;
        let form = Form::new().part("file", part);
        let url = self.url(&format!("/projects/{}/upload", project));
        self.send(self.http.post(url).multipart(form)).await?;
        Ok(())
    }

    async fn list_files(&self, project: ProjectId) -> Result<Vec<String>, ClientError> {
        debug!(%project, "GET files");
        let url = self.url(&format!("/projects/{}/files", project));
        self.fetch(self.http.get(url)).await
    }

    async fn get_file_content(
        &self,
        project: ProjectId,
        path: &str,
    ) -> Result<FileContent, ClientError> {
        debug!(%project, path, "GET file");
        let url = self.url(&format!("/projects/{}/file", project));
        self.fetch(self.http.get(url).query(&[("file_path", path)]))
            .await
    }

    async fn send_chat_message(
        &self,
        project: ProjectId,
        message: &str,
    ) -> Result<ChatResponse, ClientError> {
        debug!(%project, "POST chat");
        let url = self.url(&format!("/projects/{}/chat", project));
        let body = serde_json::json!({ "message": message });
        self.fetch(self.http.post(url).json(&body)).await
    }

    async fn explain_code(
        &self,
        request: &ExplainRequest,
    ) -> Result<ExplainResponse, ClientError> {
        debug!(chars = request.code.len(), "POST /explain");
        self.fetch(self.http.post(self.url("/explain")).json(request))
            .await
    }

    async fn get_usage(
        &self,
        project: ProjectId,
        symbol_name: &str,
        file_path: &str,
    ) -> Result<UsageResult, ClientError> {
        debug!(%project, symbol_name, file_path, "GET usage");
        let url = self.url(&format!("/projects/{}/usage", project));
        let query = [("symbol_name", symbol_name), ("file_path", file_path)];
        self.fetch(self.http.get(url).query(&query)).await
    }

    async fn get_impact(
        &self,
        project: ProjectId,
        request: &ImpactRequest,
    ) -> Result<ImpactResult, ClientError> {
        debug!(%project, symbol = %request.symbol_name, "POST impact");
        let url = self.url(&format!("/projects/{}/impact", project));
        self.fetch(self.http.post(url).json(request)).await
    }
}
