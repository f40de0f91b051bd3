use std::path::{Path, PathBuf};

use clinplan_agent::{MAX_SAMPLE_VALUES, PlannerConfig};
use clinplan_plan::EXCERPT_CHARS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "off")]
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key; the key itself is never stored.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub include_value_samples: bool,
    pub max_sample_values: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            include_value_samples: true,
            max_sample_values: MAX_SAMPLE_VALUES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
        }
    }
}

/// Contents of `clinplan.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub planner: PlannerSettings,
    pub runs: RunSettings,
}

impl Settings {
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            model: self.llm.model.clone(),
            include_value_samples: self.planner.include_value_samples,
            max_sample_values: self.planner.max_sample_values.min(MAX_SAMPLE_VALUES),
            excerpt_chars: EXCERPT_CHARS,
        }
    }
}

/// Read settings, writing the defaults first when the file does not exist.
pub fn load_or_create_settings(path: &Path) -> SettingsResult<Settings> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = Settings::default();
    save_settings(path, &settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> SettingsResult<()> {
    let encoded = toml::to_string_pretty(settings)?;
    crate::registry::write_bytes_atomic(path, encoded.as_bytes())?;
    Ok(())
}
