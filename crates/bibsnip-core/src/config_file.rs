//! On-disk configuration.
//!
//! Two files live under the platform config directory. `config.toml` holds
//! optional app settings (provider, model, verification timeout), with a
//! CWD `.bibsnip.toml` overlay. `config.json` holds the persisted API key
//! as a single-key object `{"api_key": "..."}`; environment variables win
//! over the file on read, and the file is written whenever a key verifies
//! successfully.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Explicit provider tag (`openai` | `gemini`); absent means key-shape
    /// auto-detection.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub verify_timeout_secs: Option<u64>,
}

/// Platform config directory: `<config_dir>/bibsnip`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibsnip"))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

pub fn key_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.json"))
}

/// Load config by cascading CWD `.bibsnip.toml` over the platform config.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".bibsnip.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. `None` if the file doesn't exist or
/// can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        provider: overlay.provider.or(base.provider),
        model: overlay.model.or(base.model),
        verify_timeout_secs: overlay.verify_timeout_secs.or(base.verify_timeout_secs),
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {e}"))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {e}"))?;
    Ok(path)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    api_key: Option<String>,
}

/// Resolve the API key: environment first (`GOOGLE_API_KEY`, then
/// `OPENAI_API_KEY`), then the persisted key file.
pub fn load_api_key() -> Option<String> {
    env_api_key().or_else(|| key_path().and_then(|p| load_api_key_from(&p)))
}

/// The environment half of key resolution, exposed so callers can report
/// where a key came from.
pub fn env_api_key() -> Option<String> {
    ["GOOGLE_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

pub fn load_api_key_from(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let parsed: KeyFile = serde_json::from_str(&content).ok()?;
    parsed.api_key.filter(|k| !k.trim().is_empty())
}

/// Persist a verified key as `{"api_key": "..."}`.
pub fn save_api_key(key: &str) -> Result<PathBuf, String> {
    let path = key_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_api_key_to(&path, key)?;
    Ok(path)
}

pub fn save_api_key_to(path: &Path, key: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;
    }
    let content = serde_json::to_string(&KeyFile {
        api_key: Some(key.to_string()),
    })
    .map_err(|e| format!("Failed to serialize key file: {e}"))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to save key: {e}"))
}
