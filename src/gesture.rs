use anyhow::Result;
use image::RgbImage;
use std::time::{Duration, Instant};

use crate::landmarks::HandLandmarker;
use crate::types::*;

/// Classifies one hand. Only the thumbs-up pose is recognised:
/// every non-thumb finger folded (tip at or below its PIP joint) and the
/// thumb tip strictly above the thumb MCP joint.
pub fn classify(hand: &HandLandmarks) -> Option<Gesture> {
    let folded = |tip: usize, pip: usize| hand.y(tip) >= hand.y(pip);

    let fingers_closed = folded(INDEX_TIP, INDEX_PIP)
        && folded(MIDDLE_TIP, MIDDLE_PIP)
        && folded(RING_TIP, RING_PIP)
        && folded(PINKY_TIP, PINKY_PIP);

    if fingers_closed && hand.y(THUMB_TIP) < hand.y(THUMB_MCP) {
        Some(Gesture::ThumbsUp)
    } else {
        None
    }
}

pub struct GestureDetector {
    model: Box<dyn HandLandmarker>,
}

impl GestureDetector {
    pub fn new(model: Box<dyn HandLandmarker>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    /// Runs the model on one frame and classifies the first hand; any other hands are ignored.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Option<Gesture>> {
        let hands = self.model.process(frame)?;
        Ok(hands.first().and_then(classify))
    }
}

/// Cooldown between accepted triggers. Owned by the capture loop.
#[derive(Debug, Clone)]
pub struct Debounce {
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl Debounce {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger: None,
        }
    }

    /// True when strictly more than the cooldown has passed since the last accepted trigger.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_trigger {
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
            None => true,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_trigger = Some(now);
    }
}
