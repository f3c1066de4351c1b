//! Data types exchanged with the analysis backend and held by the panels.
//!
//! Field names follow the backend's JSON contract (`snake_case`, `type` for
//! symbol kinds). Everything here is read-only on the client side: projects
//! are never edited, file contents are never written back.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque backend identifier of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ProjectId)
    }
}

/// A project as listed by `GET /projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub file_count: u64,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A file body returned by `GET /projects/{id}/file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub file_path: String,
    pub content: String,
}

/// A ZIP archive staged for upload.
#[derive(Debug, Clone)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Archive {
    /// Read an archive from disk.
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read archive: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.zip")
            .to_string();
        Ok(Self { file_name, bytes })
    }
}

// ============ Chat ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A source location the backend cited in a chat answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default)]
    pub snippet: String,
}

/// Response of `POST /projects/{id}/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub references: Vec<Reference>,
    /// Set on the assistant message appended when a send failed.
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            references: Vec::new(),
            is_error: false,
        }
    }

    pub fn assistant(response: ChatResponse) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: response.answer,
            references: response.references,
            is_error: false,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            references: Vec::new(),
            is_error: true,
        }
    }
}

// ============ Explain ============

/// Body of `POST /explain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainRequest {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub issues: Vec<String>,
}

// ============ Usage / Impact ============

/// A symbol from the backend's call graph.
///
/// Used both for the queried symbol and for each reference in the
/// `calls`/`called_by`/`affected_symbols` lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
}

/// Response of `GET /projects/{id}/usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageResult {
    pub symbol: SymbolRef,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub calls: Vec<SymbolRef>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub called_by: Vec<SymbolRef>,
}

/// Body of `POST /projects/{id}/impact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactRequest {
    pub symbol_name: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
}

/// Risk classification assigned by the backend. Consumers label it as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Upper-case severity label for display.
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Response of `POST /projects/{id}/impact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactResult {
    #[serde(default)]
    pub symbol: Option<SymbolRef>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub affected_count: u64,
    #[serde(default)]
    pub dependency_count: u64,
    #[serde(default)]
    pub analysis: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub affected_symbols: Vec<SymbolRef>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub dependencies: Vec<SymbolRef>,
}

// ============ serde helpers ============

/// Accepts RFC 3339 or the offset-less ISO form FastAPI emits for naive
/// datetimes; the latter is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

fn deserialize_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_accepts_naive_timestamp_and_null_count() {
        let project: Project = serde_json::from_value(json!({
            "id": 1,
            "name": "demo",
            "description": null,
            "created_at": "2024-05-01T10:30:00.123456",
            "file_count": null
        }))
        .unwrap();
        assert_eq!(project.id, ProjectId(1));
        assert_eq!(project.file_count, 0);
        assert_eq!(project.created_at.to_rfc3339(), "2024-05-01T10:30:00.123456+00:00");
    }

    #[test]
    fn test_project_accepts_rfc3339() {
        let project: Project = serde_json::from_value(json!({
            "id": 7,
            "name": "svc",
            "created_at": "2024-05-01T12:00:00+02:00",
            "file_count": 12
        }))
        .unwrap();
        assert_eq!(project.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(project.file_count, 12);
        assert!(project.description.is_none());
    }

    #[test]
    fn test_usage_with_empty_calls() {
        let usage: UsageResult = serde_json::from_value(json!({
            "symbol": {"id": "config.py:parse_config", "name": "parse_config", "type": "function", "file_path": "config.py"},
            "calls": [],
            "called_by": [{"name": "main", "type": "function", "file_path": "app.py"}]
        }))
        .unwrap();
        assert_eq!(usage.symbol.kind, "function");
        assert!(usage.calls.is_empty());
        assert_eq!(usage.called_by.len(), 1);
        assert_eq!(usage.called_by[0].file_path.as_deref(), Some("app.py"));
    }

    #[test]
    fn test_impact_risk_level_kept_verbatim() {
        let impact: ImpactResult = serde_json::from_value(json!({
            "symbol": {"name": "parse_config", "type": "function"},
            "risk_level": "high",
            "affected_count": 5,
            "dependency_count": 0,
            "analysis": "Many callers.",
            "affected_symbols": [],
            "dependencies": []
        }))
        .unwrap();
        assert_eq!(impact.risk_level, RiskLevel::High);
        assert_eq!(impact.risk_level.label(), "HIGH");
        assert_eq!(impact.affected_count, 5);
    }

    #[test]
    fn test_unknown_risk_level_is_rejected() {
        let result: Result<ImpactResult, _> = serde_json::from_value(json!({
            "risk_level": "catastrophic"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_explain_null_issues() {
        let resp: ExplainResponse = serde_json::from_value(json!({
            "explanation": "Adds two numbers.",
            "complexity": null,
            "issues": null
        }))
        .unwrap();
        assert!(resp.issues.is_empty());
        assert!(resp.complexity.is_none());
    }

    #[test]
    fn test_explain_request_omits_absent_fields() {
        let body = serde_json::to_value(ExplainRequest {
            code: "x = 1".into(),
            file_path: None,
            language: Some("python".into()),
        })
        .unwrap();
        assert_eq!(body, json!({"code": "x = 1", "language": "python"}));
    }
}
