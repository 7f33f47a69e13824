use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::Rgba;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::canvas::PixelSurface;

#[cfg(test)]
#[path = "text_test.rs"]
mod text_test;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a usable TrueType/OpenType font")]
    Invalid,
}

/// Lay out one line left-aligned at x = 0 with the top of the em box at
/// y = 0.  Returns `(glyph, x, baseline_y)` triples and the advance width.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Coverage-weighted RGBA patch positioned in canvas space.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        Self { buf: Vec::new(), buf_w: 0, buf_h: 0, off_x: 0, off_y: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.buf_w == 0 || self.buf_h == 0
    }
}

/// Rasterize (multiline) text with its top-left at `(origin_x, origin_y)`,
/// clipped to the canvas.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    color: Rgba<u8>,
    canvas_w: u32,
    canvas_h: u32,
) -> RasterizedText {
    if font_size <= 0.0 {
        return RasterizedText::empty();
    }
    let line_height = font.as_scaled(font_size).height();

    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_height;
        let (glyphs, _) = layout_line(font, line, font_size);
        all_glyphs.extend(glyphs.into_iter().map(|(id, x, y)| (id, x, y + y_offset)));
    }
    if all_glyphs.is_empty() {
        return RasterizedText::empty();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return RasterizedText::empty();
    }

    let pad = 2.0;
    let x0 = ((origin_x + min_x - pad).floor() as i32).max(0);
    let y0 = ((origin_y + min_y - pad).floor() as i32).max(0);
    let x1 = ((origin_x + max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((origin_y + max_y + pad).ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return RasterizedText::empty();
    }

    let needed = buf_w as usize * buf_h as usize;
    let mut coverage = vec![0.0f32; needed];

    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let Some(outlined) = font.outline_glyph(glyph) else { continue };
        let b = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let ix = px as i32 + b.min.x as i32 - x0;
            let iy = py as i32 + b.min.y as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    let mut buf = vec![0u8; needed * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov.min(1.0)).round() as u8;
        }
    }

    RasterizedText { buf, buf_w, buf_h, off_x: x0, off_y: y0 }
}

/// Draw text onto `surface` with its top-left at (x, y), source-over at
/// `opacity`.  Returns false when nothing was drawn.
pub fn draw_text(
    surface: &mut PixelSurface,
    font: &FontArc,
    text: &str,
    font_size: f32,
    x: f32,
    y: f32,
    color: Rgba<u8>,
    opacity: f32,
) -> bool {
    let raster = rasterize_text(font, text, font_size, x, y, color, surface.width(), surface.height());
    if raster.is_empty() {
        return false;
    }
    surface.blit_rgba(
        raster.off_x as i64,
        raster.off_y as i64,
        raster.buf_w,
        raster.buf_h,
        &raster.buf,
        opacity,
    );
    true
}

// ============================================================================
// FONT LOOKUP
// ============================================================================

pub fn load_font_bytes(bytes: Vec<u8>) -> Result<FontArc, FontError> {
    FontArc::try_from_vec(bytes).map_err(|_| FontError::Invalid)
}

pub fn load_font_file(path: &Path) -> Result<FontArc, FontError> {
    load_font_bytes(std::fs::read(path)?)
}

/// Load a regular-weight font by family name from the system.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::Monospace],
            &Properties::new(),
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Family name → font.  Explicitly registered fonts win; anything else is
/// looked up on the system once and cached (misses included).
#[derive(Default)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
    misses: HashSet<String>,
    /// Skip system lookup entirely (headless runs, tests).
    pub registered_only: bool,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, family: impl Into<String>, font: FontArc) {
        let family = family.into();
        self.misses.remove(&family);
        self.fonts.insert(family, font);
    }

    pub fn register_file(&mut self, family: impl Into<String>, path: &Path) -> Result<(), FontError> {
        let font = load_font_file(path)?;
        self.register(family, font);
        Ok(())
    }

    pub fn contains(&self, family: &str) -> bool {
        self.fonts.contains_key(family)
    }

    pub fn resolve(&mut self, family: &str) -> Option<FontArc> {
        if let Some(font) = self.fonts.get(family) {
            return Some(font.clone());
        }
        if self.registered_only || self.misses.contains(family) {
            return None;
        }
        match load_system_font(family) {
            Some(font) => {
                log_info!("Loaded system font '{}'", family);
                self.fonts.insert(family.to_string(), font.clone());
                Some(font)
            }
            None => {
                log_warn!("Font '{}' not found on this system", family);
                self.misses.insert(family.to_string());
                None
            }
        }
    }
}
