use anyhow::Result;
use image::RgbImage;
use std::time::Duration;

/// Where preview frames go. Implemented by the booth window; tests record frames instead.
pub trait Preview {
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// Shows a frame and keeps it up for `duration` (flash feedback).
    fn hold(&mut self, frame: &RgbImage, duration: Duration) -> Result<()> {
        self.show(frame)?;
        std::thread::sleep(duration);
        Ok(())
    }

    /// ESC / Q pressed or window closed.
    fn quit_requested(&self) -> bool;
}

pub struct WindowOutput {
    window: minifb::Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl WindowOutput {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = minifb::Window::new(
            title,
            width,
            height,
            minifb::WindowOptions {
                resize: true,
                borderless: true,
                ..minifb::WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    fn present(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow::anyhow!("Window update failed: {}", e))
    }
}

impl Preview for WindowOutput {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        let target_w = frame.width() as usize;
        let target_h = frame.height() as usize;
        if target_w != self.width || target_h != self.height {
            self.width = target_w;
            self.height = target_h;
        }
        if self.buffer.len() != self.width * self.height {
            self.buffer.resize(self.width * self.height, 0);
        }

        // RGB8 -> 0RGB u32
        for (dst, pixel) in self.buffer.iter_mut().zip(frame.pixels()) {
            let r = pixel[0] as u32;
            let g = pixel[1] as u32;
            let b = pixel[2] as u32;
            *dst = (r << 16) | (g << 8) | b;
        }

        self.present()
    }

    fn hold(&mut self, frame: &RgbImage, duration: Duration) -> Result<()> {
        self.show(frame)?;
        // Keep pumping window events while the frame stays up
        let start = std::time::Instant::now();
        while start.elapsed() < duration {
            std::thread::sleep(Duration::from_millis(10));
            self.window.update();
        }
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(minifb::Key::Escape)
            || self.window.is_key_down(minifb::Key::Q)
    }
}
