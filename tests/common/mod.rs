#![allow(dead_code)]

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use magic_booth::booth::{Booth, BoothContext};
use magic_booth::camera::FrameSource;
use magic_booth::config::{BoothConfig, CaptureConfig};
use magic_booth::delivery::{self, Queues};
use magic_booth::gate::CaptureGate;
use magic_booth::gesture::GestureDetector;
use magic_booth::landmarks::HandLandmarker;
use magic_booth::output::Preview;
use magic_booth::overlay::Overlay;
use magic_booth::session::SessionHandle;
use magic_booth::shutdown::Shutdown;
use magic_booth::storage::Storage;
use magic_booth::types::*;

pub const FRAME_W: u32 = 32;
pub const FRAME_H: u32 = 24;

/// Camera stand-in: a fixed frame, or failures while `failing` is set.
#[derive(Clone)]
pub struct StillCamera {
    pub failing: Arc<AtomicBool>,
    pub reads: Arc<AtomicUsize>,
}

impl StillCamera {
    pub fn new() -> Self {
        Self {
            failing: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameSource for StillCamera {
    fn read(&mut self) -> Result<RgbImage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("device unplugged"));
        }
        Ok(RgbImage::from_fn(FRAME_W, FRAME_H, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 128])))
    }
}

#[derive(Clone, Default)]
pub struct CountingPreview {
    pub shown: Arc<AtomicUsize>,
    pub quit: Arc<AtomicBool>,
}

impl Preview for CountingPreview {
    fn show(&mut self, _frame: &RgbImage) -> Result<()> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn hold(&mut self, frame: &RgbImage, _duration: Duration) -> Result<()> {
        self.show(frame)
    }

    fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

pub fn thumbs_up() -> HandLandmarks {
    let mut points = [Point3D::default(); HAND_POINTS];
    for (tip, pip) in [(INDEX_TIP, INDEX_PIP), (MIDDLE_TIP, MIDDLE_PIP), (RING_TIP, RING_PIP), (PINKY_TIP, PINKY_PIP)] {
        points[pip].y = 100.0;
        points[tip].y = 110.0;
    }
    points[THUMB_TIP].y = 40.0;
    points[THUMB_MCP].y = 90.0;
    HandLandmarks::new(points, 0.95)
}

/// Reports a thumbs up while `raised` is set, nothing otherwise.
#[derive(Clone)]
pub struct PuppetHand {
    pub raised: Arc<AtomicBool>,
    pub broken: Arc<AtomicBool>,
}

impl PuppetHand {
    pub fn raised() -> Self {
        Self {
            raised: Arc::new(AtomicBool::new(true)),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl HandLandmarker for PuppetHand {
    fn name(&self) -> String {
        "puppet".to_string()
    }

    fn process(&mut self, _frame: &RgbImage) -> Result<Vec<HandLandmarks>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(anyhow!("inference failed"));
        }
        if self.raised.load(Ordering::SeqCst) {
            Ok(vec![thumbs_up()])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Capture timings squeezed to zero so sequences finish immediately.
pub fn fast_capture() -> CaptureConfig {
    CaptureConfig {
        countdown_step_ms: 0,
        flash_ms: 0,
        animation_interval_ms: 0,
        ..CaptureConfig::default()
    }
}

pub struct Rig {
    pub booth: Booth,
    pub ctx: BoothContext,
    pub queues: Queues,
    pub camera: StillCamera,
    pub preview: CountingPreview,
    pub hand: PuppetHand,
}

pub fn rig(storage_root: &Path, booth_config: BoothConfig) -> Rig {
    let (dispatcher, queues) = delivery::queues();
    let ctx = BoothContext {
        session: SessionHandle::default(),
        gate: Arc::new(CaptureGate::new()),
        dispatcher,
        storage: Storage::new(storage_root, 90),
        shutdown: Shutdown::new(),
        booth: BoothConfig {
            mirror: true,
            ..booth_config
        },
        capture: fast_capture(),
        overlay: Overlay::bitmap(1),
    };
    let camera = StillCamera::new();
    let preview = CountingPreview::default();
    let hand = PuppetHand::raised();
    let booth = Booth::new(
        ctx.clone(),
        Box::new(camera.clone()),
        Box::new(preview.clone()),
        GestureDetector::new(Box::new(hand.clone())),
    );
    Rig {
        booth,
        ctx,
        queues,
        camera,
        preview,
        hand,
    }
}

/// Every file under `dir`, recursively.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(files_under(&path));
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

pub fn write_jpeg(path: &Path) {
    RgbImage::from_pixel(16, 12, Rgb([200, 100, 50])).save(path).unwrap();
}
