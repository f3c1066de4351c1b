//! Selection bridge between the editor surface and the rest of the workbench.
//!
//! Raw [`SelectionEvent`]s from the editor are normalised into a
//! [`SelectionSignal`]: either "no selection" or the selected text tagged
//! with a language derived from the active file's extension. A non-empty
//! selection also pushes a [`TabRequest::Focus`]`(`[`Tab::Explain`]`)` into a
//! one-directional channel that the shell controller drains. Selection
//! always wins focus, whichever tab is showing.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tokio::sync::mpsc;
use tracing::debug;

/// Zero-based line/column position in the editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A cursor/selection change as reported by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionEvent {
    pub anchor: Position,
    pub head: Position,
    /// Text covered by the selection range.
    pub text: String,
}

impl SelectionEvent {
    /// A bare cursor at `at`.
    pub fn cursor(at: Position) -> Self {
        Self {
            anchor: at,
            head: at,
            text: String::new(),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

/// Normalised selection: the selected code (absent when nothing is
/// selected) and its language tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSignal {
    pub code: Option<String>,
    pub language: String,
}

impl SelectionSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

/// Right-hand panel tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chat,
    Explain,
    Analysis,
}

impl Tab {
    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Chat => "chat",
            Tab::Explain => "explain",
            Tab::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Tab::Chat),
            "explain" => Ok(Tab::Explain),
            "analysis" => Ok(Tab::Analysis),
            other => Err(format!(
                "unknown tab '{}': expected chat, explain, or analysis",
                other
            )),
        }
    }
}

/// Request from the bridge to the shell controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabRequest {
    Focus(Tab),
}

/// Converts editor selection events into [`SelectionSignal`]s.
pub struct SelectionBridge {
    fallback_language: String,
    requests: mpsc::UnboundedSender<TabRequest>,
}

impl SelectionBridge {
    /// Create a bridge and the receiving end of its tab-request channel.
    pub fn channel(
        fallback_language: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TabRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        let bridge = Self {
            fallback_language: fallback_language.into(),
            requests,
        };
        (bridge, receiver)
    }

    /// Normalise one event. `active_file` drives language detection.
    pub fn normalize(&self, event: &SelectionEvent, active_file: Option<&str>) -> SelectionSignal {
        if event.is_collapsed() || event.text.is_empty() {
            return SelectionSignal::none();
        }

        let language = active_file
            .map(|path| language_for_path(path, &self.fallback_language))
            .unwrap_or_else(|| self.fallback_language.clone());

        if self.requests.send(TabRequest::Focus(Tab::Explain)).is_err() {
            debug!("tab request dropped: shell receiver closed");
        }

        SelectionSignal {
            code: Some(event.text.clone()),
            language,
        }
    }
}

/// Map a file path to an editor language tag by extension.
pub fn language_for_path(path: &str, fallback: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let language = match ext.as_deref() {
        Some("py") => "python",
        Some("js") | Some("jsx") => "javascript",
        Some("ts") | Some("tsx") => "typescript",
        Some("json") => "json",
        Some("md") => "markdown",
        Some("html") => "html",
        Some("css") => "css",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("java") => "java",
        Some("toml") => "toml",
        Some("yaml") | Some("yml") => "yaml",
        _ => fallback,
    };
    language.to_string()
}

/// Build the selection covering 1-based lines `start..=end` of `content`.
///
/// Returns `None` when the range is empty or starts past the last line; an
/// `end` past the last line is clamped.
pub fn extract_lines(content: &str, start: usize, end: usize) -> Option<SelectionEvent> {
    if start == 0 || end < start {
        return None;
    }
    let lines: Vec<&str> = content.lines().collect();
    if start > lines.len() {
        return None;
    }
    let end = end.min(lines.len());
    let selected = &lines[start - 1..end];
    let last_len = selected.last().map(|l| l.chars().count()).unwrap_or(0);

    Some(SelectionEvent {
        anchor: Position::new((start - 1) as u32, 0),
        head: Position::new((end - 1) as u32, last_len as u32),
        text: selected.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(text: &str) -> SelectionEvent {
        SelectionEvent {
            anchor: Position::new(0, 0),
            head: Position::new(0, text.len() as u32),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_language_mapping() {
        assert_eq!(language_for_path("src/app.py", "python"), "python");
        assert_eq!(language_for_path("web/App.TSX", "python"), "typescript");
        assert_eq!(language_for_path("index.jsx", "python"), "javascript");
        assert_eq!(language_for_path("README.md", "python"), "markdown");
        assert_eq!(language_for_path("Makefile", "python"), "python");
        assert_eq!(language_for_path("script.sh", "plaintext"), "plaintext");
    }

    #[test]
    fn test_collapsed_selection_is_absent_and_requests_nothing() {
        let (bridge, mut rx) = SelectionBridge::channel("python");
        let signal = bridge.normalize(&SelectionEvent::cursor(Position::new(3, 4)), Some("a.py"));
        assert_eq!(signal, SelectionSignal::none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_text_is_absent() {
        let (bridge, mut rx) = SelectionBridge::channel("python");
        let event = SelectionEvent {
            anchor: Position::new(0, 0),
            head: Position::new(0, 3),
            text: String::new(),
        };
        assert!(!bridge.normalize(&event, Some("a.py")).has_code());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_selection_requests_explain_focus() {
        let (bridge, mut rx) = SelectionBridge::channel("python");
        let signal = bridge.normalize(&selection("def main():"), Some("app/main.ts"));
        assert_eq!(signal.code.as_deref(), Some("def main():"));
        assert_eq!(signal.language, "typescript");
        assert_eq!(rx.try_recv().unwrap(), TabRequest::Focus(Tab::Explain));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_selection_without_file_uses_fallback() {
        let (bridge, _rx) = SelectionBridge::channel("python");
        assert_eq!(bridge.normalize(&selection("x"), None).language, "python");
    }

    #[test]
    fn test_closed_receiver_does_not_panic() {
        let (bridge, rx) = SelectionBridge::channel("python");
        drop(rx);
        assert!(bridge.normalize(&selection("x"), None).has_code());
    }

    #[test]
    fn test_extract_lines() {
        let content = "import os\n\ndef main():\n    run()\n";
        let event = extract_lines(content, 3, 4).unwrap();
        assert_eq!(event.text, "def main():\n    run()");
        assert_eq!(event.anchor, Position::new(2, 0));
        assert_eq!(event.head, Position::new(3, 9));

        let clamped = extract_lines(content, 4, 99).unwrap();
        assert_eq!(clamped.text, "    run()");

        assert!(extract_lines(content, 0, 2).is_none());
        assert!(extract_lines(content, 3, 2).is_none());
        assert!(extract_lines(content, 10, 12).is_none());
    }

    #[test]
    fn test_tab_parse() {
        assert_eq!("Explain".parse::<Tab>().unwrap(), Tab::Explain);
        assert_eq!(Tab::default(), Tab::Chat);
        assert!("editor".parse::<Tab>().is_err());
    }
}
