use crate::loader::load_by_extension;
use anyhow::Result;
use common::LocalPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/svcdef/config.yaml";
pub const USER_CONFIG_PATH: &str = ".config/svcdef/config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: PathBuf,
    pub home: Option<PathBuf>,
}

fn default_prefix() -> PathBuf { PathBuf::from(common::DEFAULT_PREFIX) }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            home: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub output: Option<PathBuf>,
}

fn default_log_level() -> String { "warn".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        load_by_extension(path, "config")
    }

    /// An explicit file replaces the search; otherwise the system file and then
    /// the user file are merged over the defaults when they exist.
    /// `SVCDEF_PREFIX` overrides the prefix either way.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let mut config = Config::default();
                let mut candidates = vec![PathBuf::from(DEFAULT_CONFIG_PATH)];
                if let Some(home) = dirs::home_dir() {
                    candidates.push(home.join(USER_CONFIG_PATH));
                }
                for candidate in candidates.iter().filter(|p| p.exists()) {
                    config.merge(Self::from_file(candidate)?);
                }
                config
            }
        };

        if let Some(prefix) = std::env::var_os("SVCDEF_PREFIX") {
            config.paths.prefix = PathBuf::from(prefix);
        }
        Ok(config)
    }

    /// Merge with another config, preferring values from other
    pub fn merge(&mut self, other: Config) {
        self.paths.prefix = other.paths.prefix;
        if other.paths.home.is_some() {
            self.paths.home = other.paths.home;
        }

        self.logging.level = other.logging.level;
        if other.logging.output.is_some() {
            self.logging.output = other.logging.output;
        }
    }

    /// Values substituted for the placeholder tokens of persisted services.
    pub fn local_paths(&self) -> LocalPaths {
        let home = self.paths.home.clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"));
        LocalPaths::new(self.paths.prefix.clone(), home)
    }
}
