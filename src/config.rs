use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PATH: &str = "config.json";

/// Upper bound for the trigger cooldown (one day).
const MAX_COOLDOWN_SECS: f32 = 86_400.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub booth: BoothConfig,
    pub capture: CaptureConfig,
    pub ui: UiConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub print: PrintConfig,
    pub server: ServerConfig,
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    pub window_title: String,
    pub cooldown_secs: f32,
    pub mirror: bool,
    /// Consecutive failed reads before the camera is considered gone.
    pub max_read_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub countdown_secs: u32,
    pub countdown_step_ms: u64,
    pub flush_frames: u32,
    pub flash_ms: u64,
    pub animation_interval_ms: u64,
    pub caption: String,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub font_family: String,
    pub font_size_pt: u32,
    pub text_scale: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub presence_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: String,
    pub table: String,
    pub max_records: u64,
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub command: String,
    pub job_title: String,
    pub page_width: u32,
    pub page_height: u32,
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub backoff_ms: u64,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            window_title: "MAGIC Photo Booth".to_string(),
            cooldown_secs: 6.0,
            mirror: true,
            max_read_failures: 50,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            countdown_step_ms: 1000,
            flush_frames: 3,
            flash_ms: 50,
            animation_interval_ms: 200,
            caption: "MAGIC 2026".to_string(),
            jpeg_quality: 95,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            font_family: "DejaVuSans-Bold".to_string(),
            font_size_pt: 40,
            text_scale: 4,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/hand_landmark.onnx"),
            presence_threshold: 0.7,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "magic-photos".to_string(),
            table: "photos".to_string(),
            max_records: 600,
            poll_ms: 1000,
        }
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            command: "lp".to_string(),
            job_title: "MAGIC Photo Booth".to_string(),
            // 4x6 inch at 300 dpi
            page_width: 1200,
            page_height: 1800,
            poll_ms: 1000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { backoff_ms: 2000 }
    }
}

impl BoothConfig {
    pub fn cooldown(&self) -> Duration {
        // max() also maps NaN to zero
        Duration::from_secs_f32(self.cooldown_secs.max(0.0).min(MAX_COOLDOWN_SECS))
    }
}

impl CaptureConfig {
    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }
}

impl UploadConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl PrintConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind))
    }
}

impl SupervisorConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            // Missing fields fall back to Default thanks to #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    tracing::warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            tracing::info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        // Always save back so new fields show up in the file
        config.save_to(path)?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.upload.max_records, 600);
        assert_eq!(config.booth.cooldown(), Duration::from_secs(6));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "upload": { "max_records": 10 } }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.upload.max_records, 10);
        assert_eq!(config.upload.bucket, "magic-photos");
        assert_eq!(config.capture.animation_interval(), Duration::from_millis(200));

        // Written back with the filled-in fields
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("animation_interval_ms"));
    }

    #[test]
    fn test_cooldown_is_clamped() {
        let mut booth = BoothConfig::default();
        booth.cooldown_secs = f32::INFINITY;
        assert_eq!(booth.cooldown(), Duration::from_secs(86_400));
        booth.cooldown_secs = f32::NAN;
        assert_eq!(booth.cooldown(), Duration::ZERO);
        booth.cooldown_secs = -3.0;
        assert_eq!(booth.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_huge_cooldown_in_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "booth": { "cooldown_secs": 1e39 } }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.booth.cooldown(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert!(config.server.addr().is_ok());
    }
}
