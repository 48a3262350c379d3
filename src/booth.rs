use anyhow::{bail, Result};
use colored::*;
use image::imageops;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::camera::FrameSource;
use crate::capture::Sequencer;
use crate::config::{BoothConfig, CaptureConfig};
use crate::delivery::Dispatcher;
use crate::gate::CaptureGate;
use crate::gesture::{Debounce, GestureDetector};
use crate::output::Preview;
use crate::overlay::Overlay;
use crate::session::SessionHandle;
use crate::shutdown::Shutdown;
use crate::storage::Storage;

/// Everything a capture loop needs that outlives a single camera session.
/// Cloned into each restart.
#[derive(Clone)]
pub struct BoothContext {
    pub session: SessionHandle,
    pub gate: Arc<CaptureGate>,
    pub dispatcher: Dispatcher,
    pub storage: Storage,
    pub shutdown: Shutdown,
    pub booth: BoothConfig,
    pub capture: CaptureConfig,
    pub overlay: Overlay,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Frame read failed, nothing shown.
    Skipped,
    /// Preview shown, no capture.
    Idle,
    Quit,
    /// Trigger arrived while another capture held the gate.
    Dropped,
    Captured(PathBuf),
    /// Sequence ran but produced nothing that could be saved.
    NoArtifact,
}

/// The capture loop. Owns the camera for its whole life.
pub struct Booth {
    source: Box<dyn FrameSource>,
    preview: Box<dyn Preview>,
    detector: GestureDetector,
    sequencer: Sequencer,
    debounce: Debounce,
    ctx: BoothContext,
    read_failures: u32,
}

impl Booth {
    pub fn new(
        ctx: BoothContext,
        source: Box<dyn FrameSource>,
        preview: Box<dyn Preview>,
        detector: GestureDetector,
    ) -> Self {
        let sequencer = Sequencer::new(ctx.capture.clone(), ctx.booth.mirror, ctx.overlay.clone());
        let debounce = Debounce::new(ctx.booth.cooldown());
        Self {
            source,
            preview,
            detector,
            sequencer,
            debounce,
            ctx,
            read_failures: 0,
        }
    }

    pub fn tick(&mut self) -> Result<Tick> {
        if self.ctx.shutdown.is_triggered() {
            return Ok(Tick::Quit);
        }

        // 1. Frame
        let mut frame = match self.source.read() {
            Ok(frame) => {
                self.read_failures = 0;
                frame
            }
            Err(e) => {
                self.read_failures += 1;
                if self.read_failures > self.ctx.booth.max_read_failures {
                    bail!("Camera stopped delivering frames ({} consecutive failures): {:#}", self.read_failures, e);
                }
                tracing::debug!("Frame read failed: {:#}", e);
                return Ok(Tick::Skipped);
            }
        };
        if self.ctx.booth.mirror {
            imageops::flip_horizontal_in_place(&mut frame);
        }

        // 2. Gesture
        let gesture = match self.detector.detect(&frame) {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!("Gesture detection failed: {:#}", e);
                None
            }
        };

        // 3. Preview with status overlay
        let state = self.ctx.session.snapshot();
        self.sequencer.overlay().status(&mut frame, &state);
        self.preview.show(&frame)?;

        if self.preview.quit_requested() {
            tracing::info!("Quit requested from the booth window");
            self.ctx.shutdown.trigger();
            return Ok(Tick::Quit);
        }

        // 4. Trigger
        let now = Instant::now();
        let Some(gesture) = gesture else {
            return Ok(Tick::Idle);
        };
        if !self.debounce.ready(now) {
            return Ok(Tick::Idle);
        }

        let gate = Arc::clone(&self.ctx.gate);
        let Some(_permit) = gate.try_acquire() else {
            tracing::info!("Capture in progress, trigger ignored");
            return Ok(Tick::Dropped);
        };
        self.debounce.mark(now);
        tracing::info!("{} accepted", gesture.label());
        println!("{}", format!("Capture: {} | {}", state.mode, state.filter).cyan().bold());

        // 5. Sequence, with the mode/filter that were active at trigger time
        let artifact = self
            .sequencer
            .run(state.mode, state.filter, self.source.as_mut(), self.preview.as_mut())?;
        let Some(artifact) = artifact else {
            tracing::warn!("{} capture produced no frames", state.mode);
            return Ok(Tick::NoArtifact);
        };

        // 6. Persist and hand off
        let path = match self.ctx.storage.save(&artifact) {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(Tick::NoArtifact),
            Err(e) => {
                tracing::error!("Failed to save capture: {:#}", e);
                return Ok(Tick::NoArtifact);
            }
        };
        if let Err(e) = self.ctx.dispatcher.dispatch(&path) {
            tracing::error!("Failed to queue {}: {:#}", path.display(), e);
        }
        Ok(Tick::Captured(path))
    }

    /// Runs until shutdown or quit. Errors end the loop and go to the supervisor.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Capture loop started (model: {})", self.detector.model_name());
        loop {
            if self.tick()? == Tick::Quit {
                return Ok(());
            }
        }
    }
}
