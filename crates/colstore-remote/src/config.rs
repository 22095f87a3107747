use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteResult};

pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_ENDPOINT: &str = "memory://";

/// Connection settings for a [`DocumentClient`](crate::DocumentClient).
///
/// Read once at process start, typically from a TOML file:
///
/// ```toml
/// project_id = "demo"
/// endpoint = "https://documents.example.com"
/// api_key = "..."
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub project_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_id: "local".into(),
            endpoint: default_endpoint(),
            api_key: None,
            database: default_database(),
        }
    }
}

impl ClientConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> RemoteResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RemoteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> RemoteResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> RemoteResult<String> {
        toml::to_string_pretty(self).map_err(|e| RemoteError::Config(e.to_string()))
    }

    pub fn validate(&self) -> RemoteResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(RemoteError::Config("project_id must not be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(RemoteError::Config("endpoint must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(RemoteError::Config("database must not be empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("project_id", &self.project_id)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}
