use anyhow::{anyhow, Context, Result};
use colored::*;
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

/// Where frames come from. The capture loop owns exactly one of these.
pub trait FrameSource {
    fn read(&mut self) -> Result<RgbImage>;
}

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn new(index: u32) -> Result<Self> {
        let cam_index = CameraIndex::Index(index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(cam_index, requested).context("Failed to create camera instance")?;

        camera.open_stream().map_err(|e| anyhow!(e)).context("Failed to open camera stream")?;

        println!("{}", format!("Opened camera: {}", camera.info().human_name()).green());
        tracing::info!("Format: {}", camera.camera_format());

        Ok(Self { camera })
    }

    /// Opens the requested index, or tries the external camera (1) before the built-in one (0).
    pub fn open_preferred(index: Option<u32>) -> Result<Self> {
        match index {
            Some(i) => Self::new(i),
            None => Self::new(1).or_else(|e| {
                tracing::debug!("Camera 1 unavailable ({:#}), trying 0", e);
                Self::new(0)
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.camera.resolution().width()
    }

    pub fn height(&self) -> u32 {
        self.camera.resolution().height()
    }
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> Result<RgbImage> {
        let frame = self.camera.frame().map_err(|e| anyhow!(e)).context("Failed to get frame")?;
        let decoded = frame.decode_image::<RgbFormat>().map_err(|e| anyhow!(e)).context("Failed to decode frame")?;
        Ok(decoded)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::debug!("Failed to stop camera stream: {}", e);
        }
    }
}

pub fn list_cameras() -> Result<Vec<(String, String)>> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| anyhow!(e))?;
    Ok(cameras
        .into_iter()
        .map(|cam| (cam.index().to_string(), cam.human_name()))
        .collect())
}
