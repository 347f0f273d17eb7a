//! Configuration and session storage.
//!
//! Handles:
//! - Portal endpoints and client timings
//! - The saved session cookie

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use autoserv_id::Username;
use autoserv_sync::{CredentialProvider, SessionCredentials, SyncConfig};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Overrides the platform config directory.
const CONFIG_DIR_ENV: &str = "SVC_CONFIG_DIR";

/// Get the config directory path.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("com", "autoserv", "svc")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// REST base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// STOMP WebSocket endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    std::env::var("AUTOSERV_API_URL").unwrap_or_else(|_| autoserv_sync::DEFAULT_API_URL.to_string())
}

fn default_ws_url() -> String {
    std::env::var("AUTOSERV_WS_URL").unwrap_or_else(|_| autoserv_sync::DEFAULT_WS_URL.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            reconnect_delay_ms: None,
            mutation_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        write_private(&dir.join(CONFIG_FILE), &serde_json::to_string_pretty(self)?)
    }

    /// Set a key by its CLI name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api-url" => self.api_url = value.trim_end_matches('/').to_string(),
            "ws-url" => self.ws_url = value.to_string(),
            "reconnect-delay-ms" => {
                self.reconnect_delay_ms = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid number: {value}"))?,
                )
            }
            "mutation-timeout-secs" => {
                self.mutation_timeout_secs = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid number: {value}"))?,
                )
            }
            other => anyhow::bail!(
                "Unknown config key '{other}'. Known keys: api-url, ws-url, reconnect-delay-ms, mutation-timeout-secs"
            ),
        }
        Ok(())
    }

    /// Library configuration: environment first, then this file.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env();
        config.api_url = self.api_url.clone();
        config.ws_url = self.ws_url.clone();
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.mutation_timeout_secs {
            config.mutation_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Saved portal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Username,

    /// Raw `Cookie` header value.
    pub cookie: String,

    pub saved_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(username: Username, cookie: String) -> Self {
        Self {
            username,
            cookie,
            saved_at: Utc::now(),
        }
    }

    /// Load credentials from disk.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&config_dir()?)
    }

    pub fn load_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CREDENTIALS_FILE);

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials from {:?}", path))?;

        let creds: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {:?}", path))?;

        Ok(Some(creds))
    }

    /// Save credentials to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        write_private(&dir.join(CREDENTIALS_FILE), &serde_json::to_string_pretty(self)?)
    }

    /// Delete credentials from disk.
    pub fn delete() -> Result<()> {
        Self::delete_from(&config_dir()?)
    }

    pub fn delete_from(dir: &Path) -> Result<()> {
        let path = dir.join(CREDENTIALS_FILE);

        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete credentials at {:?}", path))?;
        }

        Ok(())
    }
}

impl CredentialProvider for Credentials {
    fn session(&self) -> Option<SessionCredentials> {
        Some(SessionCredentials {
            username: self.username.clone(),
            cookie: self.cookie.clone(),
        })
    }
}

/// Write a file readable only by the owner on Unix.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))?;
    }

    Ok(())
}
