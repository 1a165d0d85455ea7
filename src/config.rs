use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Port the practice backend listens on by default.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8765";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin of the practice backend (`http://host:port` or `https://…`).
    pub server: String,
    /// TUI log destination. The TUI owns the terminal, so without this
    /// nothing is logged in interactive mode.
    pub log_file: Option<PathBuf>,
    pub prefs_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: DEFAULT_SERVER.to_string(),
            log_file: None,
            prefs_file: None,
        }
    }
}

/// `$XDG_CONFIG_HOME/etude`, falling back to `~/.config/etude`.
pub fn config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("etude"))
}

/// Load the config file. An explicitly given path must exist; the default
/// location is optional.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match config_dir() {
            Some(dir) => (dir.join("config.toml"), false),
            None => return Ok(Config::default()),
        },
    };
    if !required && !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    Ok(toml::from_str(&content)?)
}

pub fn init(config: Config) {
    CONFIG.set(config).ok();
}

pub fn server() -> &'static str {
    CONFIG
        .get()
        .map(|c| c.server.as_str())
        .unwrap_or(DEFAULT_SERVER)
}

pub fn log_file() -> Option<&'static Path> {
    CONFIG.get().and_then(|c| c.log_file.as_deref())
}

pub fn prefs_file() -> Option<PathBuf> {
    CONFIG
        .get()
        .and_then(|c| c.prefs_file.clone())
        .or_else(|| config_dir().map(|d| d.join("prefs.toml")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn reads_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "server = \"https://practice.example\"\nlog_file = \"/tmp/etude.log\"\nprefs_file = \"/tmp/prefs.toml\"\n",
        )
        .unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.server, "https://practice.example");
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/etude.log")));
        assert_eq!(config.prefs_file, Some(PathBuf::from("/tmp/prefs.toml")));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
