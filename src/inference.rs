use anyhow::{bail, Context, Result};
use image::{imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

use crate::landmarks::HandLandmarker;
use crate::types::{HandLandmarks, Point3D, HAND_POINTS};

const INPUT_SIZE: u32 = 224;
/// Landmarks plus presence score.
const REQUIRED_OUTPUTS: usize = 2;

/// Single-hand landmark model (MediaPipe hand_landmark layout):
/// input `[1, 224, 224, 3]` RGB in 0..1, output 0 is `[1, 63]` xyz in input pixels,
/// output 1 is the hand presence score.
pub struct OnnxHandLandmarker {
    session: Session,
    presence_threshold: f32,
}

impl OnnxHandLandmarker {
    pub fn new(model_path: &Path, presence_threshold: f32) -> Result<Self> {
        tracing::info!("Loading hand landmark model from {}...", model_path.display());
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load model {}", model_path.display()))?;

        Ok(Self {
            session,
            presence_threshold,
        })
    }
}

impl HandLandmarker for OnnxHandLandmarker {
    fn name(&self) -> String {
        "Hand Landmarks (21 pts)".to_string()
    }

    fn process(&mut self, frame: &RgbImage) -> Result<Vec<HandLandmarks>> {
        // 1. Preprocess: full frame -> 224x224 NHWC
        let resized = image::imageops::resize(frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let mut input_data = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
        for pixel in resized.pixels() {
            input_data.push(pixel[0] as f32 / 255.0);
            input_data.push(pixel[1] as f32 / 255.0);
            input_data.push(pixel[2] as f32 / 255.0);
        }

        let shape = vec![1, INPUT_SIZE as i64, INPUT_SIZE as i64, 3];
        let input = ort::value::Tensor::from_array((shape, input_data))?;
        let outputs = self.session.run(ort::inputs![input])?;
        check_output_count(outputs.len())?;

        // 2. Presence gate
        let (_presence_shape, presence_data) = outputs[1].try_extract_tensor::<f32>()?;
        let score = presence_score(presence_data.first().copied().unwrap_or(0.0));
        if score < self.presence_threshold {
            return Ok(Vec::new());
        }

        // 3. Landmarks: model space (0..224) -> frame space
        let (_points_shape, points_data) = outputs[0].try_extract_tensor::<f32>()?;
        if points_data.len() < HAND_POINTS * 3 {
            return Ok(Vec::new());
        }

        let sx = frame.width() as f32 / INPUT_SIZE as f32;
        let sy = frame.height() as f32 / INPUT_SIZE as f32;
        let mut points = [Point3D::default(); HAND_POINTS];
        for (i, point) in points.iter_mut().enumerate() {
            *point = Point3D::new(
                points_data[i * 3] * sx,
                points_data[i * 3 + 1] * sy,
                points_data[i * 3 + 2],
            );
        }

        Ok(vec![HandLandmarks::new(points, score)])
    }
}

fn check_output_count(count: usize) -> Result<()> {
    if count < REQUIRED_OUTPUTS {
        bail!("Model has {} output(s), expected landmarks and presence", count);
    }
    Ok(())
}

/// Accepts either a probability or a raw logit.
fn presence_score(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}
