//! Scripted in-process backend for workbench tests.
//!
//! Every call is appended to a call log before it does anything else. Calls
//! can be parked on a named gate (`hold`) and let through one at a time
//! (`release`), which is how tests force a response order. Explain calls
//! wait on `explain:{code}` so each selection can be released on its own.
//! Operations can be switched to fail with a 500.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use intelliforge::client::AnalysisBackend;
use intelliforge::error::ClientError;
use intelliforge::models::{
    Archive, ChatResponse, ExplainRequest, ExplainResponse, FileContent, ImpactRequest,
    ImpactResult, NewProject, Project, ProjectId, RiskLevel, SymbolRef, UsageResult,
};
use intelliforge::workbench::Workbench;

#[derive(Default)]
struct FakeState {
    projects: Vec<Project>,
    files: HashMap<ProjectId, Vec<String>>,
    contents: HashMap<(ProjectId, String), String>,
    calls: Vec<String>,
    failing: HashSet<String>,
    explain_requests: Vec<ExplainRequest>,
    impact_requests: Vec<ImpactRequest>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

pub fn project(id: i64, name: &str) -> Project {
    Project {
        id: ProjectId(id),
        name: name.to_string(),
        description: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        file_count: 0,
    }
}

pub fn symbol(name: &str, file: &str) -> SymbolRef {
    SymbolRef {
        name: name.to_string(),
        kind: "function".to_string(),
        file_path: Some(file.to_string()),
        line_start: None,
        line_end: None,
    }
}

pub fn zip_archive(name: &str, files: &[(&str, &str)]) -> Archive {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, body) in files {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    Archive {
        file_name: name.to_string(),
        bytes: writer.finish().unwrap().into_inner(),
    }
}

impl FakeBackend {
    /// Project 1 "demo" with `a.py` and `b.py`, project 2 "other" with `main.rs`.
    pub fn demo() -> Arc<Self> {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.projects = vec![project(1, "demo"), project(2, "other")];
            state.files.insert(ProjectId(1), vec!["a.py".into(), "b.py".into()]);
            state.files.insert(ProjectId(2), vec!["main.rs".into()]);
            state.contents.insert(
                (ProjectId(1), "a.py".into()),
                "import os\n\ndef alpha():\n    return os.getcwd()\n".into(),
            );
            state.contents.insert(
                (ProjectId(1), "b.py".into()),
                "def beta(x):\n    return x * 2\n".into(),
            );
            state
                .contents
                .insert((ProjectId(2), "main.rs".into()), "fn main() {}\n".into());
        }
        Arc::new(fake)
    }

    pub fn workbench(self: &Arc<Self>) -> Workbench {
        Workbench::new(self.clone(), "python")
    }

    /// Park calls on `gate` until released.
    pub fn hold(&self, gate: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(gate.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let one parked (or future) call through `gate`.
    pub fn release(&self, gate: &str) {
        if let Some(sem) = self.gates.lock().unwrap().get(gate) {
            sem.add_permits(1);
        }
    }

    pub fn fail(&self, op: &str) {
        self.state.lock().unwrap().failing.insert(op.to_string());
    }

    pub fn recover(&self, op: &str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Files the backend holds for `id`, uploads included.
    pub fn server_files(&self, id: ProjectId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn server_project_count(&self) -> usize {
        self.state.lock().unwrap().projects.len()
    }

    pub fn explain_requests(&self) -> Vec<ExplainRequest> {
        self.state.lock().unwrap().explain_requests.clone()
    }

    pub fn impact_requests(&self) -> Vec<ImpactRequest> {
        self.state.lock().unwrap().impact_requests.clone()
    }

    /// Yield until at least `n` calls starting with `prefix` were made.
    pub async fn wait_for(&self, prefix: &str, n: usize) {
        while self.count(prefix) < n {
            tokio::task::yield_now().await;
        }
    }

    /// Log the call, then wait on its gate and check the failure toggle.
    async fn enter(&self, op: &str, call: String, gate: &str) -> Result<(), ClientError> {
        self.state.lock().unwrap().calls.push(call);
        let sem = self.gates.lock().unwrap().get(gate).cloned();
        if let Some(sem) = sem {
            sem.acquire().await.unwrap().forget();
        }
        if self.state.lock().unwrap().failing.contains(op) {
            return Err(ClientError::Server {
                status: 500,
                message: format!("{} exploded", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        self.enter("projects", "projects".into(), "projects").await?;
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn create_project(&self, new: &NewProject) -> Result<Project, ClientError> {
        self.enter("create", format!("create:{}", new.name), "create")
            .await?;
        let mut state = self.state.lock().unwrap();
        let id = state.projects.len() as i64 + 1;
        let mut created = project(id, &new.name);
        created.description = new.description.clone();
        state.projects.push(created.clone());
        Ok(created)
    }

    async fn upload_archive(&self, id: ProjectId, archive: &Archive) -> Result<(), ClientError> {
        self.enter("upload", format!("upload:{}", id), "upload")
            .await?;
        let mut reader = zip::ZipArchive::new(Cursor::new(archive.bytes.clone()))
            .map_err(|e| ClientError::BadRequest {
                status: 400,
                message: e.to_string(),
            })?;
        let mut state = self.state.lock().unwrap();
        for i in 0..reader.len() {
            let mut entry = reader.by_index(i).unwrap();
            let mut body = String::new();
            std::io::Read::read_to_string(&mut entry, &mut body).unwrap();
            let name = entry.name().to_string();
            state.files.entry(id).or_default().push(name.clone());
            state.contents.insert((id, name), body);
        }
        Ok(())
    }

    async fn list_files(&self, id: ProjectId) -> Result<Vec<String>, ClientError> {
        self.enter("files", format!("files:{}", id), "files").await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_file_content(
        &self,
        id: ProjectId,
        path: &str,
    ) -> Result<FileContent, ClientError> {
        self.enter(
            "content",
            format!("content:{}:{}", id, path),
            &format!("content:{}", path),
        )
        .await?;
        let state = self.state.lock().unwrap();
        match state.contents.get(&(id, path.to_string())) {
            Some(content) => Ok(FileContent {
                file_path: path.to_string(),
                content: content.clone(),
            }),
            None => Err(ClientError::BadRequest {
                status: 404,
                message: "File not found".into(),
            }),
        }
    }

    async fn send_chat_message(
        &self,
        id: ProjectId,
        message: &str,
    ) -> Result<ChatResponse, ClientError> {
        self.enter("chat", format!("chat:{}", id), "chat").await?;
        Ok(ChatResponse {
            answer: format!("You asked: {}", message),
            references: vec![],
        })
    }

    async fn explain_code(
        &self,
        request: &ExplainRequest,
    ) -> Result<ExplainResponse, ClientError> {
        self.state
            .lock()
            .unwrap()
            .explain_requests
            .push(request.clone());
        self.enter(
            "explain",
            "explain".into(),
            &format!("explain:{}", request.code),
        )
        .await?;
        Ok(ExplainResponse {
            explanation: format!(
                "{} line(s) of {}",
                request.code.lines().count(),
                request.language.as_deref().unwrap_or("?")
            ),
            complexity: None,
            issues: vec![],
        })
    }

    async fn get_usage(
        &self,
        id: ProjectId,
        symbol_name: &str,
        file_path: &str,
    ) -> Result<UsageResult, ClientError> {
        self.enter(
            "usage",
            format!("usage:{}:{}:{}", id, symbol_name, file_path),
            "usage",
        )
        .await?;
        Ok(UsageResult {
            symbol: SymbolRef {
                file_path: Some(file_path.to_string()),
                ..symbol(symbol_name, file_path)
            },
            calls: vec![],
            called_by: vec![symbol("main", "app.py")],
        })
    }

    async fn get_impact(
        &self,
        id: ProjectId,
        request: &ImpactRequest,
    ) -> Result<ImpactResult, ClientError> {
        self.state
            .lock()
            .unwrap()
            .impact_requests
            .push(request.clone());
        self.enter(
            "impact",
            format!("impact:{}:{}:{}", id, request.symbol_name, request.file_path),
            "impact",
        )
        .await?;
        Ok(ImpactResult {
            symbol: Some(symbol(&request.symbol_name, &request.file_path)),
            risk_level: RiskLevel::High,
            affected_count: 5,
            dependency_count: 2,
            analysis: "Used across the request pipeline.".into(),
            affected_symbols: (0..5)
                .map(|i| symbol(&format!("caller_{}", i), "app.py"))
                .collect(),
            dependencies: vec![],
        })
    }
}
