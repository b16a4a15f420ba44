use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// CLI configuration: defaults, then `config.toml`, then `PHOTOSHARE_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the photo service (default: http://localhost:8000).
    pub api_url: String,
    /// Directory holding the saved session.
    pub data_dir: PathBuf,
    /// Where `download` writes photos when `--out` is not given.
    pub download_dir: PathBuf,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Optional keys of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    data_dir: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load from the user's config file (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path(&env);
        Self::load_from(&path, env)
    }

    /// Load from `path` (a missing file means defaults) and an environment lookup.
    fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        Self::from_sources(file.as_deref(), env)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Build from raw TOML text and an environment lookup.
    fn from_sources(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: FileConfig = match file {
            Some(text) => toml::from_str(text)?,
            None => FileConfig::default(),
        };

        let data_dir = env("PHOTOSHARE_DATA_DIR")
            .map(PathBuf::from)
            .or(file.data_dir)
            .unwrap_or_else(|| xdg_dir(&env, "XDG_DATA_HOME", ".local/share").join("photoshare"));

        let download_dir = env("PHOTOSHARE_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .or(file.download_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_url: env("PHOTOSHARE_API_URL")
                .or(file.api_url)
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            data_dir,
            download_dir,
            timeout_secs: env_u64(&env, "PHOTOSHARE_TIMEOUT_SECS")
                .or(file.timeout_secs)
                .unwrap_or(30),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn config_path(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    xdg_dir(env, "XDG_CONFIG_HOME", ".config").join("photoshare/config.toml")
}

fn xdg_dir(env: &impl Fn(&str) -> Option<String>, var: &str, fallback: &str) -> PathBuf {
    env(var).map(PathBuf::from).unwrap_or_else(|| {
        let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
        Path::new(&home).join(fallback)
    })
}

fn env_u64(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    env(key).and_then(|v| v.parse().ok())
}
