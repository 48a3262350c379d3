//! Visual styles applied to every captured frame.
//!
//! `Filter` is a closed set; untrusted names are parsed with [`str::parse`] and
//! anything outside the set is rejected. Every variant maps to exactly one
//! transform in [`Filter::transform`].

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::font;

pub type Transform = fn(&RgbImage, &str) -> RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    None,
    Glitch,
    Neon,
    Dreamy,
    Retro,
    Noir,
    Bw,
    StrangerTheme,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter '{0}'")]
pub struct ParseFilterError(pub String);

impl Filter {
    pub const ALL: [Filter; 8] = [
        Filter::None,
        Filter::Glitch,
        Filter::Neon,
        Filter::Dreamy,
        Filter::Retro,
        Filter::Noir,
        Filter::Bw,
        Filter::StrangerTheme,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Filter::None => "NONE",
            Filter::Glitch => "GLITCH",
            Filter::Neon => "NEON",
            Filter::Dreamy => "DREAMY",
            Filter::Retro => "RETRO",
            Filter::Noir => "NOIR",
            Filter::Bw => "BW",
            Filter::StrangerTheme => "STRANGER_THEME",
        }
    }

    pub fn transform(&self) -> Transform {
        match self {
            Filter::None => apply_none,
            Filter::Glitch => apply_glitch,
            Filter::Neon => apply_neon,
            Filter::Dreamy => apply_dreamy,
            Filter::Retro => apply_retro,
            Filter::Noir => apply_noir,
            Filter::Bw => apply_bw,
            Filter::StrangerTheme => apply_stranger_theme,
        }
    }

    /// Pre-sharpens the frame, then runs the style. `caption` is printed by styles
    /// that carry text (the polaroid border of RETRO).
    pub fn apply(&self, image: &RgbImage, caption: &str) -> RgbImage {
        let enhanced = sharpen(image, 0.5);
        (self.transform())(&enhanced, caption)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Filter::ALL
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| ParseFilterError(s.to_string()))
    }
}

// --- Building blocks ---

fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn map_pixels(img: &RgbImage, f: impl Fn(Rgb<u8>) -> Rgb<u8>) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        *p = f(*p);
    }
    out
}

/// `a * wa + b * wb + gamma`, per channel.
fn add_weighted(a: &RgbImage, wa: f32, b: &RgbImage, wb: f32, gamma: f32) -> RgbImage {
    let mut out = a.clone();
    for (o, q) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..3 {
            o[c] = clamp(o[c] as f32 * wa + q[c] as f32 * wb + gamma);
        }
    }
    out
}

fn scale_channels(img: &RgbImage, alpha: [f32; 3], beta: [f32; 3]) -> RgbImage {
    map_pixels(img, |p| {
        Rgb([
            clamp(p[0] as f32 * alpha[0] + beta[0]),
            clamp(p[1] as f32 * alpha[1] + beta[1]),
            clamp(p[2] as f32 * alpha[2] + beta[2]),
        ])
    })
}

fn luma(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn grayscale(img: &RgbImage) -> RgbImage {
    map_pixels(img, |p| {
        let l = clamp(luma(&p));
        Rgb([l, l, l])
    })
}

/// Wide gaussian blurs are done on a downscaled copy.
fn soft_blur(img: &RgbImage, sigma: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let factor = (sigma / 3.0).max(1.0);
    if factor <= 1.0 {
        return imageops::blur(img, sigma);
    }
    let sw = ((w as f32 / factor) as u32).max(1);
    let sh = ((h as f32 / factor) as u32).max(1);
    let small = imageops::resize(img, sw, sh, FilterType::Triangle);
    let blurred = imageops::blur(&small, sigma / factor);
    imageops::resize(&blurred, w, h, FilterType::Triangle)
}

fn sharpen(img: &RgbImage, strength: f32) -> RgbImage {
    let blurred = soft_blur(img, 3.0);
    add_weighted(img, 1.0 + strength, &blurred, -strength, 0.0)
}

/// Linear stretch of the luminance range between the 1st and 99th percentile.
/// `strength` blends between the input (0) and the fully stretched image (1).
fn stretch_contrast(img: &RgbImage, strength: f32) -> RgbImage {
    let mut hist = [0u32; 256];
    for p in img.pixels() {
        hist[clamp(luma(p)) as usize] += 1;
    }
    let total: u32 = hist.iter().sum();
    if total == 0 {
        return img.clone();
    }
    let cut = total / 100;
    let mut acc = 0;
    let mut lo = 0usize;
    for (i, n) in hist.iter().enumerate() {
        acc += n;
        if acc > cut {
            lo = i;
            break;
        }
    }
    acc = 0;
    let mut hi = 255usize;
    for (i, n) in hist.iter().enumerate().rev() {
        acc += n;
        if acc > cut {
            hi = i;
            break;
        }
    }
    if hi <= lo {
        return img.clone();
    }
    let gain = 255.0 / (hi - lo) as f32;
    let offset = lo as f32;
    map_pixels(img, |p| {
        let mut out = p;
        for c in 0..3 {
            let stretched = (p[c] as f32 - offset) * gain;
            out[c] = clamp(p[c] as f32 * (1.0 - strength) + stretched * strength);
        }
        out
    })
}

fn vignette(img: &RgbImage, strength: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let sx = (w as f32 * 0.6).max(1.0);
    let sy = (h as f32 * 0.6).max(1.0);
    let (cx, cy) = ((w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0);
    let mut out = img.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        let dx = (x as f32 - cx) / sx;
        let dy = (y as f32 - cy) / sy;
        let mask = (-(dx * dx + dy * dy) / 2.0).exp();
        let m = mask * (1.0 - strength) + strength;
        for c in 0..3 {
            p[c] = clamp(p[c] as f32 * m);
        }
    }
    out
}

fn film_grain(img: &RgbImage, intensity: f32) -> RgbImage {
    let mut rng = rand::thread_rng();
    let sigma = 25.0 * intensity;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            // Box-Muller
            let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
            let u2: f32 = rng.gen();
            let n = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
            p[c] = clamp(p[c] as f32 + n * sigma);
        }
    }
    out
}

// --- Styles ---

fn apply_none(img: &RgbImage, _caption: &str) -> RgbImage {
    let smooth = imageops::blur(img, 1.0);
    add_weighted(img, 0.7, &smooth, 0.3, 0.0)
}

fn apply_glitch(img: &RgbImage, _caption: &str) -> RgbImage {
    let (w, h) = img.dimensions();
    let shift = (w / 80).max(8).min(w / 2);
    let mut out = img.clone();

    // RGB split: red right, blue left, edges keep their own values
    for y in 0..h {
        for x in 0..w {
            let red_src = if x >= shift { x - shift } else { x };
            let blue_src = if x + shift < w { x + shift } else { x };
            let red = img.get_pixel(red_src, y)[0];
            let blue = img.get_pixel(blue_src, y)[2];
            let p = out.get_pixel_mut(x, y);
            p[0] = red;
            p[2] = blue;
        }
    }

    // Scanlines
    for y in (0..h).step_by(3) {
        for x in 0..w {
            let p = out.get_pixel_mut(x, y);
            for c in 0..3 {
                p[c] = (p[c] as f32 * 0.7) as u8;
            }
        }
    }

    // Displaced bands
    if h > 20 {
        let mut rng = rand::thread_rng();
        for _ in 0..3 {
            let band_y = rng.gen_range(0..h - 20);
            let band_h = rng.gen_range(2..8);
            let offset: i32 = rng.gen_range(-15..15);
            for y in band_y..(band_y + band_h).min(h) {
                let row: Vec<Rgb<u8>> = (0..w).map(|x| *out.get_pixel(x, y)).collect();
                for x in 0..w {
                    let src = (x as i32 - offset).rem_euclid(w as i32) as usize;
                    out.put_pixel(x, y, row[src]);
                }
            }
        }
    }

    scale_channels(&out, [1.1; 3], [5.0; 3])
}

fn apply_neon(img: &RgbImage, _caption: &str) -> RgbImage {
    let contrasted = stretch_contrast(img, 0.6);
    let boosted = scale_channels(&contrasted, [1.1, 1.0, 1.15], [8.0, 0.0, 10.0]);
    let glow = soft_blur(&boosted, 8.0);
    let blended = add_weighted(&boosted, 0.85, &glow, 0.15, 0.0);
    sharpen(&blended, 0.3)
}

fn apply_dreamy(img: &RgbImage, _caption: &str) -> RgbImage {
    // Lift shadows, wash towards a warm pastel
    let lifted = map_pixels(img, |p| {
        let mut out = p;
        for c in 0..3 {
            let v = (p[c] as f32 / 255.0).powf(0.85) * 255.0;
            out[c] = clamp(v);
        }
        out
    });
    let pastel = map_pixels(&lifted, |p| {
        let l = luma(&p);
        Rgb([
            clamp(l + (p[0] as f32 - l) * 0.7 + 18.0),
            clamp(l + (p[1] as f32 - l) * 0.7 + 4.0),
            clamp(l + (p[2] as f32 - l) * 0.7 + 12.0),
        ])
    });
    let haze = soft_blur(&pastel, 25.0);
    let blended = add_weighted(&pastel, 0.55, &haze, 0.45, 0.0);
    let bright = scale_channels(&blended, [1.05; 3], [15.0; 3]);
    vignette(&bright, 0.2)
}

fn apply_retro(img: &RgbImage, caption: &str) -> RgbImage {
    let sepia = map_pixels(img, |p| {
        let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
        Rgb([
            clamp(0.393 * r + 0.769 * g + 0.189 * b),
            clamp(0.349 * r + 0.686 * g + 0.168 * b),
            clamp(0.272 * r + 0.534 * g + 0.131 * b),
        ])
    });
    let toned = add_weighted(img, 0.35, &sepia, 0.65, 15.0);
    let warm = scale_channels(&toned, [1.08, 1.02, 0.95], [8.0, 3.0, -5.0]);
    let photo = vignette(&warm, 0.25);

    // Polaroid frame: thin sides and top, deep bottom with the caption
    let (w, h) = photo.dimensions();
    let side = (w as f32 * 0.04) as u32;
    let bottom = (h as f32 * 0.20) as u32;
    let mut framed = RgbImage::from_pixel(w + 2 * side, h + side + bottom, Rgb([255, 248, 240]));
    imageops::replace(&mut framed, &photo, side as i64, side as i64);

    if bottom > 0 && !caption.is_empty() {
        let scale = ((bottom as f32 * 0.35) as u32 / font::text_height(1)).max(1);
        let text_w = font::measure_text_width(caption, scale) as i32;
        let x = (framed.width() as i32 - text_w) / 2;
        let y = (h + side) as i32 + (bottom as i32 - font::text_height(scale) as i32) / 2;
        font::draw_text_line(&mut framed, x, y, caption, Rgb([80, 60, 60]), scale);
    }
    framed
}

fn apply_noir(img: &RgbImage, _caption: &str) -> RgbImage {
    let gray = stretch_contrast(&grayscale(img), 0.9);
    let punchy = scale_channels(&gray, [1.25; 3], [-10.0; 3]);
    film_grain(&vignette(&punchy, 0.4), 0.12)
}

fn apply_bw(img: &RgbImage, _caption: &str) -> RgbImage {
    let gray = stretch_contrast(&grayscale(img), 0.5);
    let smooth = imageops::blur(&gray, 1.0);
    add_weighted(&gray, 0.6, &smooth, 0.4, 0.0)
}

fn apply_stranger_theme(img: &RgbImage, _caption: &str) -> RgbImage {
    // Deep red, Upside Down look
    let contrasted = stretch_contrast(img, 0.9);
    let tinted = scale_channels(&contrasted, [1.5, 0.6, 0.7], [20.0, 0.0, 0.0]);
    let glow = soft_blur(&tinted, 10.0);
    let blended = add_weighted(&tinted, 0.7, &glow, 0.3, 0.0);
    film_grain(&vignette(&blended, 0.7), 0.20)
}
