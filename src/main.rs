//! # IntelliForge CLI (`forge`)
//!
//! Command-line front end for the workbench. One-shot commands cover each
//! backend capability; `forge shell` runs an interactive session with the
//! full workbench state (active project, open file, selection, panels).
//!
//! ## Usage
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge projects` | List projects |
//! | `forge create <name>` | Create a project |
//! | `forge upload <project> <zip>` | Upload a ZIP archive into a project |
//! | `forge files <project>` | List a project's files |
//! | `forge show <project> <path>` | Print a file |
//! | `forge chat <project> <message>` | Ask a question about a project |
//! | `forge explain <project> <path> --lines A:B` | Explain a line range |
//! | `forge usage <project> <symbol> <file>` | Callers and callees of a symbol |
//! | `forge impact <project> <symbol> <file>` | Impact of changing a symbol |
//! | `forge shell` | Interactive workbench |
//!
//! ## Examples
//!
//! ```bash
//! forge create demo --description "sample app"
//! forge upload 1 ./demo.zip
//! forge explain 1 src/app.py --lines 10:24
//! forge impact 1 parse_config config.py --change "rename the path argument"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use intelliforge::cache::Outcome;
use intelliforge::client::{AnalysisBackend, HttpClient};
use intelliforge::config;
use intelliforge::error::WorkbenchError;
use intelliforge::logging;
use intelliforge::models::{Archive, ProjectId};
use intelliforge::render;
use intelliforge::repl;
use intelliforge::workbench::Workbench;

const DEFAULT_CONFIG: &str = "./config/forge.toml";

/// IntelliForge workbench CLI.
///
/// Reads `./config/forge.toml` when present; see
/// `config/forge.example.toml` for the available settings.
#[derive(Parser)]
#[command(
    name = "forge",
    about = "IntelliForge: browse, chat with and analyze code on an IntelliForge backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Must exist when given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend API base URL, e.g. `http://localhost:8000/api`.
    /// Overrides `[backend].base_url`.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Debug logging on stderr unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects.
    Projects,

    /// Create a project.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Upload a ZIP archive of source files into a project.
    Upload { project: ProjectId, archive: PathBuf },

    /// List the files of a project.
    Files { project: ProjectId },

    /// Print a file of a project.
    Show { project: ProjectId, path: String },

    /// Ask the project's chat a question.
    Chat { project: ProjectId, message: String },

    /// Explain a range of lines of a file.
    Explain {
        project: ProjectId,
        path: String,
        /// 1-based inclusive line range, `A:B`.
        #[arg(long, value_parser = repl::parse_line_range)]
        lines: (usize, usize),
    },

    /// Show what a symbol calls and what calls it.
    Usage {
        project: ProjectId,
        symbol: String,
        file: String,
    },

    /// Assess the impact of changing a symbol.
    Impact {
        project: ProjectId,
        symbol: String,
        file: String,
        /// Description of the intended change.
        #[arg(long)]
        change: Option<String>,
    },

    /// Start an interactive workbench session.
    Shell {
        /// Project to select on start.
        #[arg(long)]
        project: Option<ProjectId>,
    },
}

fn ready<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Ready(value) => Ok(value),
        Outcome::Failed(err) => Err(WorkbenchError::from(err).into()),
        Outcome::Stale => bail!("request was superseded"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::resolve_config(
        cli.config.as_deref(),
        Path::new(DEFAULT_CONFIG),
        cli.base_url.as_deref(),
    )?;
    logging::init_logging(&cfg.logging.filter, cli.verbose)?;

    let backend: Arc<dyn AnalysisBackend> = Arc::new(HttpClient::new(&cfg.backend)?);
    let wb = Workbench::new(backend, &cfg.editor.fallback_language);

    match cli.command {
        Commands::Projects => {
            let projects = ready(wb.projects().await)?;
            print!("{}", render::render_projects(&projects));
        }
        Commands::Create { name, description } => {
            match wb.create_project(&name, description.as_deref()).await? {
                Some(project) => println!("Created project {} ({}).", project.id, project.name),
                None => bail!("project creation was superseded"),
            }
        }
        Commands::Upload { project, archive } => {
            wb.select_project(Some(project));
            let upload = Archive::from_path(&archive)?;
            wb.upload_archive(upload).await?;
            let files = ready(wb.files().await?)?;
            println!(
                "Uploaded {}; project {} now has {} file(s).",
                archive.display(),
                project,
                files.len()
            );
        }
        Commands::Files { project } => {
            wb.select_project(Some(project));
            let files = ready(wb.files().await?)?;
            print!("{}", render::render_files(&files));
        }
        Commands::Show { project, path } => {
            wb.select_project(Some(project));
            let file = ready(wb.open_file(&path).await?)?;
            print!("{}", file.content);
        }
        Commands::Chat { project, message } => {
            wb.select_project(Some(project));
            wb.chat().send(&message).await?;
            let messages = wb.chat().messages();
            print!("{}", render::render_transcript(&messages));
            if messages.last().is_some_and(|m| m.is_error) {
                bail!("chat request failed");
            }
        }
        Commands::Explain {
            project,
            path,
            lines: (start, end),
        } => {
            wb.select_project(Some(project));
            ready(wb.open_file(&path).await?)?;
            wb.select_lines(start, end)?;
            match wb.explain().explain().await? {
                Some(explanation) => print!("{}", render::render_explanation(&explanation)),
                None => bail!("explain request was superseded"),
            }
        }
        Commands::Usage {
            project,
            symbol,
            file,
        } => {
            wb.select_project(Some(project));
            wb.analysis().set_symbol_name(&symbol);
            wb.analysis().set_file_path(&file);
            if let Some(usage) = wb.analysis().show_usage().await? {
                print!("{}", render::render_usage(&usage));
            }
        }
        Commands::Impact {
            project,
            symbol,
            file,
            change,
        } => {
            wb.select_project(Some(project));
            wb.analysis().set_symbol_name(&symbol);
            wb.analysis().set_file_path(&file);
            if let Some(impact) = wb.analysis().analyze_impact(change.as_deref()).await? {
                print!("{}", render::render_impact(&impact));
            }
        }
        Commands::Shell { project } => {
            if project.is_some() {
                wb.select_project(project);
            }
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            repl::run_shell(&wb, stdin, &mut stdout).await?;
        }
    }

    Ok(())
}
