use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    /// Language reported for selections in files with an unmapped extension.
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            fallback_language: default_fallback_language(),
        }
    }
}

fn default_fallback_language() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive. A non-empty `RUST_LOG` or
    /// `--verbose` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "intelliforge=info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate backend
    let base_url = config.backend.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        anyhow::bail!(
            "backend.base_url must start with http:// or https:// (got '{}')",
            config.backend.base_url
        );
    }
    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    // Validate editor
    if config.editor.fallback_language.trim().is_empty() {
        anyhow::bail!("editor.fallback_language must not be empty");
    }

    Ok(())
}

/// Resolve the configuration for the CLI.
///
/// An explicitly supplied path must exist. Without one, `default_path` is
/// used when present and built-in defaults otherwise. `base_url` overrides
/// whatever the file says.
pub fn resolve_config(
    explicit: Option<&Path>,
    default_path: &Path,
    base_url: Option<&str>,
) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None if default_path.exists() => load_config(default_path)?,
        None => Config::default(),
    };
    if let Some(url) = base_url {
        config.backend.base_url = url.to_string();
        validate(&config)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("forge.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[backend]\ntimeout_secs = 5\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.backend.base_url, "http://localhost:8000/api");
        assert_eq!(cfg.backend.timeout_secs, 5);
        assert_eq!(cfg.editor.fallback_language, "python");
        assert_eq!(cfg.logging.filter, "intelliforge=info");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[backend]\ntimeout_secs = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[backend]\nbase_url = \"localhost:8000\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_resolve_missing_default_uses_builtin() {
        let tmp = TempDir::new().unwrap();
        let cfg = resolve_config(
            None,
            &tmp.path().join("absent.toml"),
            Some("http://127.0.0.1:9000/api"),
        )
        .unwrap();
        assert_eq!(cfg.backend.base_url, "http://127.0.0.1:9000/api");
    }

    #[test]
    fn test_resolve_missing_explicit_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.toml");
        assert!(resolve_config(Some(&missing), &missing, None).is_err());
    }
}
