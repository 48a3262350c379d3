use image::{Rgb, RgbImage};

use crate::font;
use crate::session::SessionState;
use crate::ttf::FontRenderer;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const SHADOW: Rgb<u8> = Rgb([150, 0, 0]);

pub const CAPTURE_HINT: &str = "THUMBS UP TO CAPTURE";

/// Draws booth text onto preview frames, with a TTF font when one was found and
/// the bitmap font otherwise.
#[derive(Clone)]
pub struct Overlay {
    font: Option<FontRenderer>,
    font_size_pt: f32,
    text_scale: u32,
}

impl Overlay {
    pub fn new(font: Option<FontRenderer>, font_size_pt: u32, text_scale: u32) -> Self {
        Self {
            font,
            font_size_pt: font_size_pt.max(1) as f32,
            text_scale: text_scale.max(1),
        }
    }

    /// Bitmap-only overlay, used by tests and when fonts are not configured.
    pub fn bitmap(text_scale: u32) -> Self {
        Self::new(None, 24, text_scale)
    }

    fn draw(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, factor: f32) {
        match &self.font {
            Some(fr) => fr.draw_text(img, x, y, text, color, self.font_size_pt * factor),
            None => {
                let scale = ((self.text_scale as f32 * factor).round() as u32).max(1);
                font::draw_text_line(img, x, y, text, color, scale)
            }
        }
    }

    fn measure(&self, text: &str, factor: f32) -> (u32, u32) {
        match &self.font {
            Some(fr) => {
                let size = self.font_size_pt * factor;
                (fr.measure_width(text, size), fr.measure_height(size))
            }
            None => {
                let scale = ((self.text_scale as f32 * factor).round() as u32).max(1);
                (font::measure_text_width(text, scale), font::text_height(scale))
            }
        }
    }

    /// Live preview status: active mode/filter at the top, capture hint at the bottom.
    pub fn status(&self, img: &mut RgbImage, state: &SessionState) {
        let line = format!("MODE: {} | FILTER: {}", state.mode, state.filter);
        self.draw(img, 20, 20, &line, RED, 1.0);

        let (_, hint_h) = self.measure(CAPTURE_HINT, 1.5);
        let y = img.height() as i32 - hint_h as i32 - 40;
        self.draw(img, 20, y, CAPTURE_HINT, GREEN, 1.5);
    }

    /// Centered countdown digit. `progress` runs 0..1 across the digit's second and
    /// shrinks the glyph as it advances.
    pub fn countdown(&self, img: &mut RgbImage, digit: u32, progress: f32) {
        let text = digit.to_string();
        let base = match &self.font {
            Some(_) => img.height() as f32 * 0.5 / self.font_size_pt,
            None => img.height() as f32 * 0.4 / (font::text_height(1) * self.text_scale) as f32,
        };
        let factor = base * (1.0 - 0.5 * progress.clamp(0.0, 1.0));

        let (w, h) = self.measure(&text, factor);
        let x = (img.width() as i32 - w as i32) / 2;
        let y = (img.height() as i32 - h as i32) / 2;
        let offset = ((h / 20).max(1)) as i32;

        self.draw(img, x + offset, y + offset, &text, SHADOW, factor);
        self.draw(img, x, y, &text, WHITE, factor);
    }
}

/// Full-white frame shown right after each burst shot.
pub fn flash_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}
