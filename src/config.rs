use crate::color::CYAN;
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = ".cash_history";
const LOG_FILE: &str = "cash.log";
const MAX_JOBS: usize = 64;
/// Upper bound of `max_jobs`; larger values fall back to the default
const MAX_JOBS_LIMIT: usize = 4096;

/// Shell settings.
///
/// Defaults are overridden by ~/.config/cash/config.toml (if exists).
/// Every field of the file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history_file: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub accent_color: usize,
    pub max_jobs: usize,
    pub greeting: bool,
}

impl Default for Config {
    fn default() -> Self {
        let history_file = match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        };

        Config {
            history_file,
            log_file: PathBuf::from(LOG_FILE),
            log_level: "info".to_string(),
            accent_color: CYAN,
            max_jobs: MAX_JOBS,
            greeting: true,
        }
    }
}

impl Config {
    /// Defaults merged with the user's file. A broken file is reported and ignored
    pub fn load() -> Self {
        let Some(path) = Self::user_path() else {
            return Config::default();
        };
        match Self::from_file(&path) {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("cash: config parse error in {}: {e}", path.display());
                Config::default()
            }
        }
    }

    fn user_path() -> Option<PathBuf> {
        Some(dirs::home_dir()?.join(".config/cash/config.toml"))
    }

    /// Ok(None) if the file does not exist
    pub fn from_file(path: &Path) -> Result<Option<Self>, toml::de::Error> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.sanitize();
        Ok(config)
    }

    /// Replaces out of range values with the defaults
    fn sanitize(&mut self) {
        if self.accent_color > 5 {
            self.accent_color = CYAN;
        }
        if self.max_jobs == 0 || self.max_jobs > MAX_JOBS_LIMIT {
            self.max_jobs = MAX_JOBS;
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
