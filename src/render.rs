//! Plain-text rendering of workbench state.
//!
//! Every function returns a `String` so the CLI, the interactive shell and
//! the tests share one formatting path. Risk levels are shown with their
//! upper-case label exactly as the backend classified them.

use std::fmt::Write;

use crate::models::{
    ChatMessage, ChatRole, ExplainResponse, ImpactResult, Project, SymbolRef, UsageResult,
};
use crate::panel::{PanelState, Phase};

/// Affected symbols listed before the remainder is summarised.
pub const AFFECTED_LIMIT: usize = 10;

pub fn render_projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<28} {:>6}  {}", "ID", "NAME", "FILES", "CREATED");
    for p in projects {
        let _ = writeln!(
            out,
            "{:<6} {:<28} {:>6}  {}",
            p.id,
            p.name,
            p.file_count,
            p.created_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(desc) = p.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "       {}", desc);
        }
    }
    out
}

pub fn render_files(files: &[String]) -> String {
    if files.is_empty() {
        return "No files.\n".to_string();
    }
    let mut out = String::new();
    for f in files {
        let _ = writeln!(out, "  {}", f);
    }
    out
}

pub fn render_transcript(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for m in messages {
        let who = match (m.role, m.is_error) {
            (ChatRole::User, _) => "you",
            (ChatRole::Assistant, false) => "assistant",
            (ChatRole::Assistant, true) => "assistant (error)",
        };
        let _ = writeln!(out, "[{}] {}", who, m.content);
        for r in &m.references {
            let _ = writeln!(out, "    -> {}:{}-{}", r.file_path, r.line_start, r.line_end);
        }
    }
    out
}

pub fn render_explanation(explain: &ExplainResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", explain.explanation.trim_end());
    if let Some(complexity) = &explain.complexity {
        let _ = writeln!(out, "\nComplexity: {}", complexity);
    }
    if !explain.issues.is_empty() {
        let _ = writeln!(out, "\nIssues:");
        for issue in &explain.issues {
            let _ = writeln!(out, "  - {}", issue);
        }
    }
    out
}

fn symbol_line(symbol: &SymbolRef) -> String {
    let mut line = format!("{} ({})", symbol.name, symbol.kind);
    if let Some(path) = &symbol.file_path {
        let _ = write!(line, " {}", path);
        if let Some(start) = symbol.line_start {
            let _ = write!(line, ":{}", start);
        }
    }
    line
}

fn symbol_list(out: &mut String, title: &str, symbols: &[SymbolRef]) {
    let _ = writeln!(out, "{} ({})", title, symbols.len());
    if symbols.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for s in symbols {
        let _ = writeln!(out, "  {}", symbol_line(s));
    }
}

pub fn render_usage(usage: &UsageResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Symbol: {}", symbol_line(&usage.symbol));
    symbol_list(&mut out, "Calls", &usage.calls);
    symbol_list(&mut out, "Called By", &usage.called_by);
    out
}

pub fn render_impact(impact: &ImpactResult) -> String {
    let mut out = String::new();
    if let Some(symbol) = &impact.symbol {
        let _ = writeln!(out, "Symbol: {}", symbol_line(symbol));
    }
    let _ = writeln!(out, "Risk: {}", impact.risk_level.label());
    let _ = writeln!(
        out,
        "Affected: {} symbols | Dependencies: {}",
        impact.affected_count, impact.dependency_count
    );
    if !impact.analysis.is_empty() {
        let _ = writeln!(out, "\n{}\n", impact.analysis.trim_end());
    }
    if !impact.affected_symbols.is_empty() {
        let _ = writeln!(out, "Affected symbols:");
        for s in impact.affected_symbols.iter().take(AFFECTED_LIMIT) {
            let _ = writeln!(out, "  {}", symbol_line(s));
        }
        let rest = impact.affected_symbols.len().saturating_sub(AFFECTED_LIMIT);
        if rest > 0 {
            let _ = writeln!(out, "  ... and {} more", rest);
        }
    }
    out
}

/// Render one panel result area with `body` for a present result.
pub fn render_panel<T>(state: &PanelState<T>, body: impl Fn(&T) -> String) -> String {
    let mut out = String::new();
    match state.phase {
        Phase::Idle if state.result.is_none() => out.push_str("(idle)\n"),
        Phase::Pending => out.push_str("(loading...)\n"),
        _ => {}
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "{}", error);
    }
    if let Some(result) = &state.result {
        out.push_str(&body(result));
    }
    out
}
