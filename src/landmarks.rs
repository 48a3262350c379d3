use crate::types::HandLandmarks;
use anyhow::Result;
use image::RgbImage;

/// Anything that turns a frame into hand landmark sets.
pub trait HandLandmarker {
    fn name(&self) -> String;
    fn process(&mut self, frame: &RgbImage) -> Result<Vec<HandLandmarks>>;
}

/// Used when no model file is available: the preview keeps running but never sees a hand.
pub struct NoHandModel;

impl HandLandmarker for NoHandModel {
    fn name(&self) -> String {
        "No model (gestures disabled)".to_string()
    }

    fn process(&mut self, _frame: &RgbImage) -> Result<Vec<HandLandmarks>> {
        Ok(Vec::new())
    }
}
