use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use image::codecs::jpeg::JpegEncoder;
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;

use crate::capture::{ArtifactOutput, CaptureArtifact, CaptureMode};

/// On-disk layout under the storage root:
///
/// ```text
/// <root>/local_backup/YYYY_MM_DD/magic[_burst|_anim]_<ts>.<jpg|gif>
/// <root>/retry_queue/<file name>
/// <root>/temp/<downloaded print file>
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    jpeg_quality: u8,
}

pub fn artifact_file_name(mode: CaptureMode, base_timestamp: i64) -> String {
    format!("magic{}_{}.{}", mode.file_tag(), base_timestamp, mode.extension())
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            root: root.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn backup_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join("local_backup").join(date.format("%Y_%m_%d").to_string())
    }

    pub fn retry_dir(&self) -> PathBuf {
        self.root.join("retry_queue")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Writes the artifact into today's backup folder. `Ok(None)` means the
    /// artifact had nothing to write (an animation without bytes).
    pub fn save(&self, artifact: &CaptureArtifact) -> Result<Option<PathBuf>> {
        let Some(output) = artifact.output() else {
            return Ok(None);
        };

        let dir = self.backup_dir(Local::now().date_naive());
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(artifact_file_name(artifact.mode, artifact.base_timestamp));

        match output {
            ArtifactOutput::Image(img) => {
                let file = fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.jpeg_quality);
                encoder.encode_image(img).context("JPEG encoding failed")?;
            }
            ArtifactOutput::Animation(bytes) => {
                fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        tracing::info!("Saved {}", path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn artifact(mode: CaptureMode, animation: Option<Vec<u8>>) -> CaptureArtifact {
        CaptureArtifact {
            mode,
            frames: vec![RgbImage::from_pixel(10, 8, Rgb([30, 60, 90]))],
            timestamps: vec![Local::now()],
            base_timestamp: 1_700_000_000,
            collage: None,
            animation,
        }
    }

    #[test]
    fn test_file_names_by_mode() {
        assert_eq!(artifact_file_name(CaptureMode::Single, 42), "magic_42.jpg");
        assert_eq!(artifact_file_name(CaptureMode::Burst, 42), "magic_burst_42.jpg");
        assert_eq!(artifact_file_name(CaptureMode::Animated, 42), "magic_anim_42.gif");
    }

    #[test]
    fn test_backup_dir_is_dated() {
        let storage = Storage::new("/data", 95);
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(storage.backup_dir(date), PathBuf::from("/data/local_backup/2026_03_07"));
        assert_eq!(storage.retry_dir(), PathBuf::from("/data/retry_queue"));
    }

    #[test]
    fn test_save_single_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), 90);

        let path = storage.save(&artifact(CaptureMode::Single, None)).unwrap().unwrap();
        assert!(path.ends_with("magic_1700000000.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 8));
    }

    #[test]
    fn test_save_animation_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), 90);

        let bytes = b"GIF89a-fake".to_vec();
        let path = storage.save(&artifact(CaptureMode::Animated, Some(bytes.clone()))).unwrap().unwrap();
        assert_eq!(fs::read(path).unwrap(), bytes);
    }

    #[test]
    fn test_animation_without_bytes_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), 90);

        assert!(storage.save(&artifact(CaptureMode::Animated, None)).unwrap().is_none());
        assert!(!dir.path().join("local_backup").exists());
    }
}
