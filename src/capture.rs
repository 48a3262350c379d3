use anyhow::Result;
use chrono::{DateTime, Local};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{imageops, imageops::FilterType, Delay, DynamicImage, Frame, RgbImage};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::camera::FrameSource;
use crate::config::CaptureConfig;
use crate::filters::Filter;
use crate::output::Preview;
use crate::overlay::{flash_frame, Overlay};

pub const BURST_FRAMES: usize = 4;
pub const ANIMATION_FRAMES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    Single,
    Burst,
    Animated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capture mode '{0}'")]
pub struct ParseModeError(pub String);

impl CaptureMode {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureMode::Single => "SINGLE",
            CaptureMode::Burst => "BURST",
            CaptureMode::Animated => "ANIMATED",
        }
    }

    /// Part of the backup file name between `magic` and the timestamp.
    pub fn file_tag(&self) -> &'static str {
        match self {
            CaptureMode::Single => "",
            CaptureMode::Burst => "_burst",
            CaptureMode::Animated => "_anim",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CaptureMode::Single | CaptureMode::Burst => "jpg",
            CaptureMode::Animated => "gif",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CaptureMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(CaptureMode::Single),
            "BURST" => Ok(CaptureMode::Burst),
            // GIF is what the booth UI has always sent
            "ANIMATED" | "GIF" => Ok(CaptureMode::Animated),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Output of one completed capture sequence.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub mode: CaptureMode,
    pub frames: Vec<RgbImage>,
    pub timestamps: Vec<DateTime<Local>>,
    pub base_timestamp: i64,
    pub collage: Option<RgbImage>,
    pub animation: Option<Vec<u8>>,
}

/// What actually gets written to disk for an artifact.
#[derive(Debug, Clone, Copy)]
pub enum ArtifactOutput<'a> {
    Image(&'a RgbImage),
    Animation(&'a [u8]),
}

impl CaptureArtifact {
    pub fn output(&self) -> Option<ArtifactOutput<'_>> {
        match self.mode {
            CaptureMode::Single => self.frames.first().map(ArtifactOutput::Image),
            // An incomplete burst falls back to its first shot
            CaptureMode::Burst => self
                .collage
                .as_ref()
                .or(self.frames.first())
                .map(ArtifactOutput::Image),
            CaptureMode::Animated => self.animation.as_deref().map(ArtifactOutput::Animation),
        }
    }
}

/// 2x2 grid of exactly four frames, each resized to the smallest width and height
/// among them. Order: top-left, top-right, bottom-left, bottom-right.
pub fn make_collage(frames: &[RgbImage]) -> Option<RgbImage> {
    if frames.len() != BURST_FRAMES {
        return None;
    }
    let w = frames.iter().map(|f| f.width()).min()?;
    let h = frames.iter().map(|f| f.height()).min()?;

    let mut collage = RgbImage::new(w * 2, h * 2);
    for (i, frame) in frames.iter().enumerate() {
        let x = (i % 2) as i64 * w as i64;
        let y = (i / 2) as i64 * h as i64;
        if frame.dimensions() == (w, h) {
            imageops::replace(&mut collage, frame, x, y);
        } else {
            let tile = imageops::resize(frame, w, h, FilterType::Triangle);
            imageops::replace(&mut collage, &tile, x, y);
        }
    }
    Some(collage)
}

/// Infinitely looping GIF, one `frame_delay` per frame.
pub fn encode_gif(frames: &[RgbImage], frame_delay: Duration) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        let delay = Delay::from_saturating_duration(frame_delay);
        for frame in frames {
            // The encoder works on RGBA
            let rgba = DynamicImage::ImageRgb8(frame.clone()).into_rgba8();
            encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
        }
    }
    Ok(bytes)
}

/// Drives the camera through one capture sequence per trigger.
pub struct Sequencer {
    config: CaptureConfig,
    mirror: bool,
    overlay: Overlay,
}

impl Sequencer {
    pub fn new(config: CaptureConfig, mirror: bool, overlay: Overlay) -> Self {
        Self {
            config,
            mirror,
            overlay,
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Runs the sequence for `mode`. `Ok(None)` means nothing usable was captured.
    pub fn run(
        &self,
        mode: CaptureMode,
        filter: Filter,
        source: &mut dyn FrameSource,
        preview: &mut dyn Preview,
    ) -> Result<Option<CaptureArtifact>> {
        match mode {
            CaptureMode::Single => Ok(self.grab(source).map(|frame| self.single(frame, filter))),
            CaptureMode::Burst => self.burst(filter, source, preview),
            CaptureMode::Animated => Ok(self.animated(filter, source)),
        }
    }

    pub fn single(&self, frame: RgbImage, filter: Filter) -> CaptureArtifact {
        let now = Local::now();
        CaptureArtifact {
            mode: CaptureMode::Single,
            frames: vec![filter.apply(&frame, &self.config.caption)],
            timestamps: vec![now],
            base_timestamp: now.timestamp(),
            collage: None,
            animation: None,
        }
    }

    pub fn burst(
        &self,
        filter: Filter,
        source: &mut dyn FrameSource,
        preview: &mut dyn Preview,
    ) -> Result<Option<CaptureArtifact>> {
        let base_timestamp = Local::now().timestamp();
        let mut frames = Vec::with_capacity(BURST_FRAMES);
        let mut timestamps = Vec::with_capacity(BURST_FRAMES);

        for i in 0..BURST_FRAMES {
            if i > 0 {
                self.countdown(source, preview)?;
            }

            // Drop frames buffered while the countdown was on screen
            for _ in 0..self.config.flush_frames {
                let _ = source.read();
            }

            let Some(frame) = self.grab(source) else {
                continue;
            };
            timestamps.push(Local::now());
            frames.push(filter.apply(&frame, &self.config.caption));

            self.flash(source, preview)?;
        }

        if frames.is_empty() {
            tracing::warn!("Burst captured no frames");
            return Ok(None);
        }
        if frames.len() < BURST_FRAMES {
            tracing::warn!("Burst captured {}/{} frames, keeping the first", frames.len(), BURST_FRAMES);
        }

        let collage = make_collage(&frames);
        Ok(Some(CaptureArtifact {
            mode: CaptureMode::Burst,
            frames,
            timestamps,
            base_timestamp,
            collage,
            animation: None,
        }))
    }

    pub fn animated(&self, filter: Filter, source: &mut dyn FrameSource) -> Option<CaptureArtifact> {
        let base_timestamp = Local::now().timestamp();
        let interval = self.config.animation_interval();
        let mut frames = Vec::with_capacity(ANIMATION_FRAMES);
        let mut timestamps = Vec::with_capacity(ANIMATION_FRAMES);

        for i in 0..ANIMATION_FRAMES {
            let Some(frame) = self.grab(source) else {
                continue;
            };
            timestamps.push(Local::now());
            frames.push(filter.apply(&frame, &self.config.caption));

            // Keep draining the camera between shots so the next frame is fresh
            if i < ANIMATION_FRAMES - 1 {
                let start = Instant::now();
                while start.elapsed() < interval {
                    let _ = source.read();
                }
            }
        }

        if frames.is_empty() {
            tracing::warn!("Animation captured no frames");
            return None;
        }

        let animation = match encode_gif(&frames, interval) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("GIF encoding failed: {:#}", e);
                return None;
            }
        };

        Some(CaptureArtifact {
            mode: CaptureMode::Animated,
            frames,
            timestamps,
            base_timestamp,
            collage: None,
            animation: Some(animation),
        })
    }

    /// One mirrored frame, or `None` if the read failed (the frame is skipped).
    fn grab(&self, source: &mut dyn FrameSource) -> Option<RgbImage> {
        match source.read() {
            Ok(mut frame) => {
                if self.mirror {
                    imageops::flip_horizontal_in_place(&mut frame);
                }
                Some(frame)
            }
            Err(e) => {
                tracing::debug!("Skipping frame: {:#}", e);
                None
            }
        }
    }

    fn countdown(&self, source: &mut dyn FrameSource, preview: &mut dyn Preview) -> Result<()> {
        let step = self.config.countdown_step();
        for digit in (1..=self.config.countdown_secs).rev() {
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= step {
                    break;
                }
                if let Some(mut display) = self.grab(source) {
                    let progress = elapsed.as_secs_f32() / step.as_secs_f32();
                    self.overlay.countdown(&mut display, digit, progress);
                    preview.show(&display)?;
                }
            }
        }
        Ok(())
    }

    fn flash(&self, source: &mut dyn FrameSource, preview: &mut dyn Preview) -> Result<()> {
        if let Ok(frame) = source.read() {
            preview.hold(&flash_frame(frame.width(), frame.height()), self.config.flash())?;
        }
        Ok(())
    }
}
