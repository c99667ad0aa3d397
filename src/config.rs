use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_base() -> String {
    "main".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory scanned by the repo picker.
    pub repos_root: Option<String>,
    /// Prefill for the base-branch field.
    #[serde(default = "default_base")]
    pub default_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos_root: None,
            default_base: default_base(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pr-scheduler")
        .join("config.json")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
