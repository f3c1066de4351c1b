//! Line-oriented interactive shell over a [`Workbench`].
//!
//! Stands in for the graphical editor: `open` loads a file, `select a:b`
//! produces the selection event a mouse drag would, and the panel commands
//! trigger the same orchestrator calls the panel buttons do.
//!
//! Validation failures and backend errors are printed inline and never end
//! the session.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::cache::Outcome;
use crate::error::WorkbenchError;
use crate::models::{Archive, ProjectId};
use crate::render;
use crate::selection::Tab;
use crate::workbench::Workbench;

const HELP: &str = "\
Commands:
  projects                 list projects
  create <name>            create a project and select it
  project <id>|none        select the active project
  upload <zip>             upload a ZIP archive into the active project
  files                    list files of the active project
  open <path>              open a file in the editor
  select <a>:<b>|none      select lines a..=b of the open file
  tab <chat|explain|analysis>
  chat <message>           ask about the active project
  explain                  explain the current selection
  symbol <name>            set the usage/impact symbol name
  file <path>              set the usage/impact file path
  usage                    show callers and callees
  impact [change]          analyze the impact of a change
  status                   show the workbench state
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Projects,
    Create(String),
    Project(Option<ProjectId>),
    Upload(PathBuf),
    Files,
    Open(String),
    Select(Option<(usize, usize)>),
    Tab(Tab),
    Chat(String),
    Explain,
    Symbol(String),
    File(String),
    Usage,
    Impact(Option<String>),
    Status,
    Help,
    Quit,
}

/// Parse `A:B` (1-based, inclusive) into a line range.
pub fn parse_line_range(s: &str) -> Result<(usize, usize), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid line range '{}': expected A:B", s))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start line '{}'", start))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end line '{}'", end))?;
    if start == 0 || end < start {
        return Err(format!("invalid line range '{}': need 1 <= A <= B", s));
    }
    Ok((start, end))
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let need = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {} {}", word, what))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word {
        "projects" => ShellCommand::Projects,
        "create" => ShellCommand::Create(need("<name>")?),
        "project" => match need("<id>|none")?.as_str() {
            "none" => ShellCommand::Project(None),
            id => ShellCommand::Project(Some(
                id.parse().map_err(|_| format!("invalid project id '{}'", id))?,
            )),
        },
        "upload" => ShellCommand::Upload(PathBuf::from(need("<zip>")?)),
        "files" => ShellCommand::Files,
        "open" => ShellCommand::Open(need("<path>")?),
        "select" => match need("<a>:<b>|none")?.as_str() {
            "none" => ShellCommand::Select(None),
            range => ShellCommand::Select(Some(parse_line_range(range)?)),
        },
        "tab" => ShellCommand::Tab(need("<chat|explain|analysis>")?.parse()?),
        // Blank text is passed through; the chat panel rejects it.
        "chat" => ShellCommand::Chat(rest.to_string()),
        "explain" => ShellCommand::Explain,
        "symbol" => ShellCommand::Symbol(need("<name>")?),
        "file" => ShellCommand::File(need("<path>")?),
        "usage" => ShellCommand::Usage,
        "impact" => ShellCommand::Impact(Some(rest.to_string()).filter(|r| !r.is_empty())),
        "status" => ShellCommand::Status,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(command))
}

/// Read commands from `input` until EOF or `quit`, writing output to `out`.
pub async fn run_shell<R, W>(workbench: &Workbench, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "forge> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                writeln!(out, "! {}", message)?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if let Err(err) = dispatch(workbench, command, out).await {
            match err.downcast_ref::<WorkbenchError>() {
                Some(WorkbenchError::Validation(message)) => writeln!(out, "! {}", message)?,
                _ => writeln!(out, "error: {:#}", err)?,
            }
        }
    }
    Ok(())
}

fn outcome<T>(outcome: Outcome<T>) -> Result<Option<T>> {
    match outcome {
        Outcome::Ready(value) => Ok(Some(value)),
        Outcome::Failed(err) => Err(WorkbenchError::from(err).into()),
        Outcome::Stale => Ok(None),
    }
}

async fn dispatch<W: Write>(wb: &Workbench, command: ShellCommand, out: &mut W) -> Result<()> {
    match command {
        ShellCommand::Projects => {
            if let Some(projects) = outcome(wb.projects().await)? {
                write!(out, "{}", render::render_projects(&projects))?;
            }
        }
        ShellCommand::Create(name) => {
            if let Some(project) = wb.create_project(&name, None).await? {
                writeln!(out, "Created project {} ({}).", project.id, project.name)?;
            }
        }
        ShellCommand::Project(project) => {
            wb.select_project(project);
            match project {
                Some(id) => writeln!(out, "Active project: {}", id)?,
                None => writeln!(out, "No active project.")?,
            }
        }
        ShellCommand::Upload(path) => {
            let archive = Archive::from_path(&path)?;
            if wb.upload_archive(archive).await? {
                writeln!(out, "Uploaded {}.", path.display())?;
            }
        }
        ShellCommand::Files => {
            if let Some(files) = outcome(wb.files().await?)? {
                write!(out, "{}", render::render_files(&files))?;
            }
        }
        ShellCommand::Open(path) => {
            outcome(wb.open_file(&path).await?)?;
            match wb.displayed_content() {
                Some(file) => {
                    for (n, line) in file.content.lines().enumerate() {
                        writeln!(out, "{:>4} | {}", n + 1, line)?;
                    }
                }
                None => writeln!(out, "(loading {})", path)?,
            }
        }
        ShellCommand::Select(range) => {
            let signal = match range {
                Some((start, end)) => wb.select_lines(start, end)?,
                None => wb.clear_selection(),
            };
            match signal.code {
                Some(code) => writeln!(
                    out,
                    "Selected {} line(s) of {}. Tab: {}",
                    code.lines().count(),
                    signal.language,
                    wb.active_tab()
                )?,
                None => writeln!(out, "No selection.")?,
            }
        }
        ShellCommand::Tab(tab) => {
            wb.set_tab(tab);
            writeln!(out, "Tab: {}", tab)?;
        }
        ShellCommand::Chat(text) => {
            wb.chat().send(&text).await?;
            if let Some(last) = wb.chat().messages().last() {
                write!(out, "{}", render::render_transcript(std::slice::from_ref(last)))?;
            }
        }
        ShellCommand::Explain => {
            wb.explain().explain().await?;
            write!(
                out,
                "{}",
                render::render_panel(&wb.explain().state(), render::render_explanation)
            )?;
        }
        ShellCommand::Symbol(name) => {
            wb.analysis().set_symbol_name(&name);
            writeln!(out, "Symbol: {}", name)?;
        }
        ShellCommand::File(path) => {
            wb.analysis().set_file_path(&path);
            writeln!(out, "File: {}", path)?;
        }
        ShellCommand::Usage => {
            wb.analysis().show_usage().await?;
            write!(
                out,
                "{}",
                render::render_panel(&wb.analysis().usage(), render::render_usage)
            )?;
        }
        ShellCommand::Impact(change) => {
            wb.analysis().analyze_impact(change.as_deref()).await?;
            write!(
                out,
                "{}",
                render::render_panel(&wb.analysis().impact(), render::render_impact)
            )?;
        }
        ShellCommand::Status => write_status(wb, out)?,
        ShellCommand::Help => writeln!(out, "{}", HELP)?,
        ShellCommand::Quit => {}
    }
    Ok(())
}

fn write_status<W: Write>(wb: &Workbench, out: &mut W) -> Result<()> {
    let active = wb.navigation().active();
    let (symbol, file) = wb.analysis().inputs();
    let selection = wb.selection();
    let none = || "-".to_string();

    let waiting = if wb.chat().is_pending() { ", waiting" } else { "" };

    writeln!(
        out,
        "  Project:     {}",
        active.project.map(|p| p.to_string()).unwrap_or_else(none)
    )?;
    writeln!(out, "  File:        {}", active.file.unwrap_or_else(none))?;
    writeln!(out, "  Tab:         {}", wb.active_tab())?;
    match selection.code {
        Some(code) => writeln!(
            out,
            "  Selection:   {} chars ({})",
            code.chars().count(),
            selection.language
        )?,
        None => writeln!(out, "  Selection:   -")?,
    }
    writeln!(
        out,
        "  Chat:        {} message(s){}",
        wb.chat().messages().len(),
        waiting
    )?;
    writeln!(out, "  Symbol:      {}", if symbol.is_empty() { none() } else { symbol })?;
    writeln!(out, "  Symbol file: {}", if file.is_empty() { none() } else { file })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(
            parse_command("project 3").unwrap(),
            Some(ShellCommand::Project(Some(ProjectId(3))))
        );
        assert_eq!(
            parse_command("project none").unwrap(),
            Some(ShellCommand::Project(None))
        );
        assert_eq!(
            parse_command("select 2:5").unwrap(),
            Some(ShellCommand::Select(Some((2, 5))))
        );
        assert_eq!(
            parse_command("tab Analysis").unwrap(),
            Some(ShellCommand::Tab(Tab::Analysis))
        );
        assert_eq!(
            parse_command("impact rename the argument").unwrap(),
            Some(ShellCommand::Impact(Some("rename the argument".into())))
        );
        assert_eq!(parse_command("impact").unwrap(), Some(ShellCommand::Impact(None)));
        assert_eq!(parse_command("chat").unwrap(), Some(ShellCommand::Chat(String::new())));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("open").unwrap_err().contains("usage: open"));
        assert!(parse_command("project x").is_err());
        assert!(parse_command("select 5:2").is_err());
        assert!(parse_command("frobnicate").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn test_parse_line_range() {
        assert_eq!(parse_line_range("1:1").unwrap(), (1, 1));
        assert_eq!(parse_line_range(" 3 : 9 ").unwrap(), (3, 9));
        assert!(parse_line_range("0:2").is_err());
        assert!(parse_line_range("7").is_err());
    }
}
