use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub url: String,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            url: "https://bldr.habitat.sh".to_string(),
            token_env: Some("HAB_AUTH_TOKEN".to_string()),
            token_command: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub app_id: String,
    pub app_url: String,
    pub api_url: String,
    /// Env var holding a user-to-server GitHub token
    pub token_env: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            app_id: "5629".to_string(),
            app_url: "https://github.com/apps/habitat-builder".to_string(),
            api_url: "https://api.github.com".to_string(),
            token_env: Some("GITHUB_TOKEN".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Keep watching a populated list until a matching entry shows up
    pub until_matched: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

pub fn config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("bldr-console"))
}

fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.toml"))
}

impl Config {
    /// Load the default config file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                }
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    pub fn github_token(&self) -> Option<String> {
        let var = self.github.token_env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.trim().is_empty())
    }

    pub fn builder_api_url(&self) -> String {
        format!("{}/v1", self.builder.url.trim_end_matches('/'))
    }
}
