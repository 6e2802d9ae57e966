use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/ask".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    12_000
}

fn default_voice() -> String {
    "en-US".to_string()
}

fn default_bengali_voice() -> String {
    "bn-BD".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SpeechConfig {
    #[serde(default = "default_voice")]
    pub default_voice: String,
    #[serde(default = "default_bengali_voice")]
    pub bengali_voice: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            endpoint: default_endpoint(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            default_voice: default_voice(),
            bengali_voice: default_bengali_voice(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            relay: RelayConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => log::warn!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/studyspark/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}
