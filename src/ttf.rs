use image::{Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use std::fs;
use std::path::Path;

#[derive(Clone)]
pub struct FontRenderer {
    font: Font<'static>,
}

impl FontRenderer {
    pub fn try_load(family: &str) -> Option<Self> {
        // Family is like "DejaVuSans-Bold", "Arial"; files are "<family>.ttf"
        let paths = [
            format!("/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/Supplemental/{}.ttf", family),
            format!("/usr/share/fonts/truetype/{}.ttf", family),
            format!("/usr/share/fonts/truetype/dejavu/{}.ttf", family),
            format!("C:\\Windows\\Fonts\\{}.ttf", family),
            // Check local dir
            format!("{}.ttf", family),
        ];

        for p in paths.iter() {
            if !Path::new(p).exists() {
                continue;
            }
            if let Ok(data) = fs::read(p) {
                if let Some(font) = Font::try_from_vec(data) {
                    tracing::info!("Loaded font from {}", p);
                    return Some(Self { font });
                }
            }
        }

        tracing::info!("Could not find font family '{}'. Falling back to bitmap.", family);
        None
    }

    pub fn draw_text(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, size_px: f32) {
        let scale = Scale::uniform(size_px);
        let v_metrics = self.font.v_metrics(scale);
        let start = point(x as f32, y as f32 + v_metrics.ascent);
        let (width, height) = (img.width() as i32, img.height() as i32);

        for glyph in self.font.layout(text, scale, start) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    if v < 0.2 {
                        return;
                    }
                    let px = bb.min.x + gx as i32;
                    let py = bb.min.y + gy as i32;
                    if px >= 0 && px < width && py >= 0 && py < height {
                        let dst = img.get_pixel_mut(px as u32, py as u32);
                        for c in 0..3 {
                            dst[c] = (dst[c] as f32 * (1.0 - v) + color[c] as f32 * v) as u8;
                        }
                    }
                });
            }
        }
    }

    pub fn measure_width(&self, text: &str, size_px: f32) -> u32 {
        let scale = Scale::uniform(size_px);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .filter_map(|g| g.pixel_bounding_box())
            .map(|bb| bb.max.x)
            .max()
            .unwrap_or(0)
            .max(0) as u32
    }

    pub fn measure_height(&self, size_px: f32) -> u32 {
        let scale = Scale::uniform(size_px);
        let v_metrics = self.font.v_metrics(scale);
        (v_metrics.ascent - v_metrics.descent + v_metrics.line_gap) as u32
    }
}
