use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::classifier::{gateway::DEFAULT_MODEL, gemini::DEFAULT_BASE_URL};

/// Startup configuration for the monitoring core.
///
/// Read once at process start; the default credential it carries is handed
/// to the classifier gateway and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Fallback credential used when a request does not bring its own.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// No timeout unless set; the remote service enforces its own.
    pub request_timeout_secs: Option<u64>,
    pub database_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.into(),
            gemini_base_url: DEFAULT_BASE_URL.into(),
            request_timeout_secs: None,
            database_path: PathBuf::from("flowstate.sqlite3"),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl MonitorConfig {
    /// Load `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load `path` if it exists, then apply overrides from `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!("Ignoring unreadable config {}: {err}", path.display());
            Self::default()
        }))
    }

    /// Apply `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_BASE_URL` and
    /// `FLOWSTATE_DATABASE` from `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").and_then(non_blank) {
            self.gemini_api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL").and_then(non_blank) {
            self.gemini_model = model;
        }
        if let Some(url) = lookup("GEMINI_BASE_URL").and_then(non_blank) {
            self.gemini_base_url = url;
        }
        if let Some(path) = lookup("FLOWSTATE_DATABASE").and_then(non_blank) {
            self.database_path = PathBuf::from(path);
        }
        self.gemini_api_key = self.gemini_api_key.take().and_then(non_blank);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
