use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Where downloaded model files are cached between runs.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Base URL of the pre-trained model repository.
    #[serde(default = "default_model_base_url")]
    pub model_base_url: String,

    /// Try an accelerated execution provider before falling back to CPU.
    #[serde(default = "default_prefer_hardware")]
    pub prefer_hardware: bool,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Upper bound on generated tokens per image strip.
    #[serde(default = "default_max_decode_steps")]
    pub max_decode_steps: usize,

    /// Images taller than `tile_aspect` times their width are split into strips.
    #[serde(default = "default_tile_aspect")]
    pub tile_aspect: f32,

    /// Upper bound on strips per image; taller strips are used past it.
    #[serde(default = "default_max_tiles")]
    pub max_tiles: u32,

    /// Largest image payload accepted by an extraction session.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("promptvault")
        .join("models")
}

fn default_model_base_url() -> String {
    "https://huggingface.co/Xenova/trocr-base-printed/resolve/main".to_string()
}

fn default_prefer_hardware() -> bool {
    true
}

fn default_intra_threads() -> usize {
    4
}

fn default_max_decode_steps() -> usize {
    64
}

fn default_tile_aspect() -> f32 {
    2.0
}

fn default_max_tiles() -> u32 {
    8
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024 // 10MB
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_base_url: default_model_base_url(),
            prefer_hardware: default_prefer_hardware(),
            intra_threads: default_intra_threads(),
            max_decode_steps: default_max_decode_steps(),
            tile_aspect: default_tile_aspect(),
            max_tiles: default_max_tiles(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Synthetic progress shown while a recognition call is outstanding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressConfig {
    #[serde(default = "default_progress_start")]
    pub start: u8,

    #[serde(default = "default_progress_step")]
    pub step: u8,

    /// Progress never passes this value until the call resolves.
    #[serde(default = "default_progress_cap")]
    pub cap: u8,

    #[serde(default = "default_progress_interval_ms")]
    pub interval_ms: u64,
}

fn default_progress_start() -> u8 {
    10
}

fn default_progress_step() -> u8 {
    15
}

fn default_progress_cap() -> u8 {
    85
}

fn default_progress_interval_ms() -> u64 {
    500
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            start: default_progress_start(),
            step: default_progress_step(),
            cap: default_progress_cap(),
            interval_ms: default_progress_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl Config {
    /// Load from `PROMPTVAULT_CONFIG` or the default location, writing defaults
    /// on first run.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os("PROMPTVAULT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("promptvault")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ocr]
            prefer_hardware = false

            [progress]
            step = 5
            "#,
        )
        .unwrap();

        assert!(!config.ocr.prefer_hardware);
        assert_eq!(config.ocr.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ocr.max_tiles, 8);
        assert_eq!(config.progress.start, 10);
        assert_eq!(config.progress.step, 5);
        assert_eq!(config.progress.cap, 85);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.ocr.intra_threads = 2;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.ocr.intra_threads, 2);
        assert_eq!(loaded.progress, ProgressConfig::default());
    }
}
