use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.wms365.ai";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PAGE_SIZE: u32 = 30;

/// Client endpoint configuration, stored as TOML in the platform config dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// REST base URL.
    pub base_url: String,
    /// Realtime socket URL. Defaults to `base_url` when absent.
    pub socket_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Message page size used for cursor pagination.
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            socket_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("wms-client.toml"))
    }

    /// Load from the platform config dir, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        match Self::toml_path() {
            Some(path) => Self::load_from(&path).unwrap_or_default(),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path().ok_or(Error::NoAppDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| Error::Decode(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    /// URL the socket session connects to.
    pub fn socket_url(&self) -> &str {
        self.socket_url.as_deref().unwrap_or(&self.base_url)
    }

    /// Join an endpoint path onto the base URL.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
