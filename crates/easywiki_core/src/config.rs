use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("easywiki/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Bot credentials used for `action=login`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            credentials: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Resolve each setting as explicit > env > config file > default.
    /// `explicit` carries command-line flags and may be left empty.
    pub fn resolve_layered(explicit: &WikiSection, config: &WikiConfig) -> Result<Self> {
        Self::resolve_with(explicit, config, |key| env::var(key).ok())
    }

    fn resolve_with(
        explicit: &WikiSection,
        config: &WikiConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let layered = |explicit: &Option<String>, key: &str, file: &Option<String>| {
            explicit
                .clone()
                .or_else(|| env_value(key))
                .or_else(|| file.clone())
        };

        let api_url = layered(&explicit.api_url, "WIKI_API_URL", &config.wiki.api_url)
            .ok_or_else(|| {
                Error::Config("WIKI_API_URL or [wiki] api_url is required".to_string())
            })?;
        let user_agent = layered(
            &explicit.user_agent,
            "WIKI_USER_AGENT",
            &config.wiki.user_agent,
        )
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let timeout_ms = match (explicit.timeout_ms, env_value("WIKI_HTTP_TIMEOUT_MS")) {
            (Some(timeout_ms), _) => timeout_ms,
            (None, Some(raw)) => raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("WIKI_HTTP_TIMEOUT_MS must be an integer: {raw}"))
            })?,
            (None, None) => config.wiki.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };

        let username = layered(&explicit.username, "WIKI_BOT_USER", &config.wiki.username);
        let password = layered(&explicit.password, "WIKI_BOT_PASS", &config.wiki.password);
        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            api_url,
            user_agent,
            timeout_ms,
            credentials,
        })
    }
}

/// Load and parse a WikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| {
        Error::Config(format!("failed to read {}: {error}", config_path.display()))
    })?;
    toml::from_str(&content).map_err(|error| {
        Error::Config(format!("failed to parse {}: {error}", config_path.display()))
    })
}
