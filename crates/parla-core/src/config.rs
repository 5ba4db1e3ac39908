use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub ollama_url: String,
    pub translate_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub source_lang: String,
    pub target_lang: String,
    /// Text-to-speech program; `None` disables playback
    pub tts_program: Option<String>,
    /// Speech recognizer argv, `{lang}` is replaced by the source language.
    /// It must print one transcript to stdout and exit.
    pub capture_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            translate_url: "https://api.mymemory.translated.net".to_string(),
            poll_interval_secs: 30,
            request_timeout_secs: 60,
            source_lang: "zh-TW".to_string(),
            target_lang: "en-US".to_string(),
            tts_program: Some("espeak-ng".to_string()),
            capture_command: None,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Remember the selected language pair for the next start
    pub fn save_languages(source_lang: &str, target_lang: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.source_lang = source_lang.to_string();
        config.target_lang = target_lang.to_string();
        config.save()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parla").join("config.json"))
    }
}
