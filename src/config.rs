//! Configuration: optional YAML file, overridden by flags / environment.
//!
//! File location: `--config PATH` (or `CLOUDCTL_CONFIG`), else
//! `<config dir>/cloudctl/config.yaml` when it exists.
//!
//! ```yaml
//! api_url: https://api.ionos.com
//! token: eyJ...
//! poll_interval_secs: 2
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::api::Auth;

pub const DEFAULT_API_URL: &str = "https://api.ionos.com";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const APP_DIR: &str = "cloudctl";
const CONFIG_FILE: &str = "config.yaml";

/// On-disk configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Like `load`, but a missing file is an empty config.
    pub fn load_if_exists(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Session flag values (already merged with their environment variables by clap).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub config: Option<PathBuf>,
}

impl Overrides {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let text = |id: &str| {
            matches
                .try_get_one::<String>(id)
                .ok()
                .flatten()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            api_url: text("api-url"),
            token: text("token"),
            username: text("username"),
            password: text("password"),
            config: text("config").map(PathBuf::from),
        }
    }
}

/// Effective settings for one process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: Url,
    pub auth: Auth,
    pub poll_interval: Duration,
}

impl Settings {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let file = match (&overrides.config, default_path()) {
            (Some(explicit), _) => FileConfig::load(explicit)?,
            (None, Some(default)) => FileConfig::load_if_exists(&default)?,
            (None, None) => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }

    /// Merge file values with overrides; overrides win key by key.
    pub fn resolve(file: FileConfig, overrides: &Overrides) -> Result<Self> {
        let raw_url = overrides
            .api_url
            .clone()
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(raw_url.trim())
            .with_context(|| format!("Invalid API URL '{raw_url}'"))?;
        if api_url.cannot_be_a_base() || !matches!(api_url.scheme(), "http" | "https") {
            bail!("Invalid API URL '{raw_url}': expected an http(s) URL");
        }

        let token = overrides.token.clone().or(file.token);
        let username = overrides.username.clone().or(file.username);
        let password = overrides.password.clone().or(file.password);
        let auth = match (token, username, password) {
            (Some(token), _, _) => Auth::Token(token),
            (None, Some(username), Some(password)) => Auth::Basic { username, password },
            (None, Some(_), None) => bail!("A username was configured without a password"),
            _ => {
                warn!("no credentials configured; requests will be sent anonymously");
                Auth::Anonymous
            }
        };

        Ok(Self {
            api_url,
            auth,
            poll_interval: Duration::from_secs(
                file.poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
        })
    }
}
