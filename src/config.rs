use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of the external vision-analysis service.
    pub base_url: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat-completions endpoint base.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key: String::new(),
            model: "llama-3.3-70b-versatile".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub vision: VisionConfig,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("verdant.sqlite3"),
            vision: VisionConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Read the JSON config file if present, otherwise defaults, then
    /// apply environment overrides for the deploy-time secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("invalid config file {}", path.display()))?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("AI_SERVER_URL") {
            config.vision.base_url = url;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = key;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_file_fills_in_defaults() {
        let raw = r#"{ "vision": { "base_url": "http://vision.internal:8001" } }"#;
        let config: Config = serde_json::from_str(raw).expect("should parse");
        assert_eq!(config.vision.base_url, "http://vision.internal:8001");
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.database_path, PathBuf::from("verdant.sqlite3"));
    }
}
