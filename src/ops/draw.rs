//! Drawing primitives on `PixelSurface`: anti-aliased strokes and fills
//! evaluated from signed distance functions, destination-out erasing,
//! solid stamps and blits.
//!
//! Coordinates are in surface pixels with pixel (x, y) covering the square
//! `[x, x+1) × [y, y+1)`; coverage is sampled at pixel centres.  Every
//! primitive blends each pixel at most once, so a single call never stacks
//! its own alpha.

use image::Rgba;

use crate::canvas::{PixelSurface, TRANSPARENT};

#[cfg(test)]
#[path = "draw_test.rs"]
mod draw_test;

/// Colour, line width and alpha multiplier for a stroke or fill.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    pub width: f32,
    pub opacity: f32,
}

impl StrokeStyle {
    pub fn new(color: Rgba<u8>, width: f32, opacity: f32) -> Self {
        Self { color, width, opacity }
    }
}

/// Shapes committed by the drag tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Rectangle,
    /// Circle centred on the drag start; radius = drag length.
    Ellipse,
}

/// How a rectangle or ellipse is painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ShapeFillMode {
    #[default]
    Outline,
    Filled,
}

// ============================================================================
// SDF helpers: negative = inside
// ============================================================================

#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-12 {
        return ((px - ax) * (px - ax) + (py - ay) * (py - ay)).sqrt();
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Ellipse centred at origin (approximation; exact for circles).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    if (rx - ry).abs() < 1e-6 {
        return (px * px + py * py).sqrt() - rx;
    }
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// One-pixel anti-aliasing ramp centred on the edge.
#[inline]
fn edge_coverage(signed_distance: f32) -> f32 {
    (0.5 - signed_distance).clamp(0.0, 1.0)
}

/// Clamp a float bounding box to integer pixel bounds on the surface.
/// Returns `None` when the box misses the surface entirely.
fn clip_bounds(
    surface: &PixelSurface,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
) -> Option<(u32, u32, u32, u32)> {
    let x0 = min_x.floor().max(0.0);
    let y0 = min_y.floor().max(0.0);
    let x1 = max_x.ceil().min(surface.width() as f32 - 1.0);
    let y1 = max_y.ceil().min(surface.height() as f32 - 1.0);
    if !(x0 <= x1 && y0 <= y1) {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

impl PixelSurface {
    /// Blend `color` into every pixel of the box, weighted by the coverage
    /// function evaluated at the pixel centre.
    fn paint_coverage(
        &mut self,
        bounds: Option<(u32, u32, u32, u32)>,
        color: Rgba<u8>,
        opacity: f32,
        coverage: impl Fn(f32, f32) -> f32,
    ) {
        let Some((x0, y0, x1, y1)) = bounds else { return };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = coverage(x as f32 + 0.5, y as f32 + 0.5);
                if c > 0.0 {
                    self.blend_pixel(x, y, color, opacity * c);
                }
            }
        }
    }

    /// Destination-out: scale each pixel's alpha by `1 - coverage`.
    fn erase_coverage(
        &mut self,
        bounds: Option<(u32, u32, u32, u32)>,
        coverage: impl Fn(f32, f32) -> f32,
    ) {
        let Some((x0, y0, x1, y1)) = bounds else { return };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = coverage(x as f32 + 0.5, y as f32 + 0.5);
                if c <= 0.0 {
                    continue;
                }
                let mut px = self.get_pixel(x, y);
                let new_a = (px[3] as f32 * (1.0 - c)).round();
                if new_a <= 0.0 {
                    px = TRANSPARENT;
                } else {
                    px[3] = new_a as u8;
                }
                self.set_pixel(x, y, px);
            }
        }
    }

    // ---- strokes ------------------------------------------------------------

    /// Straight segment with round caps.
    pub fn stroke_line(&mut self, a: (f32, f32), b: (f32, f32), style: &StrokeStyle) {
        let r = style.width * 0.5;
        if r <= 0.0 {
            return;
        }
        let bounds = clip_bounds(
            self,
            a.0.min(b.0) - r - 1.0,
            a.1.min(b.1) - r - 1.0,
            a.0.max(b.0) + r + 1.0,
            a.1.max(b.1) + r + 1.0,
        );
        self.paint_coverage(bounds, style.color, style.opacity, |px, py| {
            edge_coverage(sdf_line_segment(px, py, a.0, a.1, b.0, b.1) - r)
        });
    }

    /// Round-capped segment cleared to transparency.
    pub fn erase_line(&mut self, a: (f32, f32), b: (f32, f32), width: f32) {
        let r = width * 0.5;
        if r <= 0.0 {
            return;
        }
        let bounds = clip_bounds(
            self,
            a.0.min(b.0) - r - 1.0,
            a.1.min(b.1) - r - 1.0,
            a.0.max(b.0) + r + 1.0,
            a.1.max(b.1) + r + 1.0,
        );
        self.erase_coverage(bounds, |px, py| {
            edge_coverage(sdf_line_segment(px, py, a.0, a.1, b.0, b.1) - r)
        });
    }

    /// Rectangle outline between two corners, the line centred on the edges.
    pub fn stroke_rect(&mut self, a: (f32, f32), b: (f32, f32), style: &StrokeStyle) {
        let r = style.width * 0.5;
        if r <= 0.0 {
            return;
        }
        let (cx, cy) = ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
        let (hx, hy) = ((b.0 - a.0).abs() * 0.5, (b.1 - a.1).abs() * 0.5);
        let bounds = clip_bounds(self, cx - hx - r - 1.0, cy - hy - r - 1.0, cx + hx + r + 1.0, cy + hy + r + 1.0);
        self.paint_coverage(bounds, style.color, style.opacity, |px, py| {
            edge_coverage(sdf_box(px - cx, py - cy, hx, hy).abs() - r)
        });
    }

    /// Solid integer-aligned rectangle (`fillRect` semantics, no anti-aliasing).
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>, opacity: f32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w as i64).min(self.width() as i64);
        let y1 = (y + h as i64).min(self.height() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px as u32, py as u32, color, opacity);
            }
        }
    }

    /// Ellipse outline with radii (rx, ry) around `center`.
    pub fn stroke_ellipse(&mut self, center: (f32, f32), rx: f32, ry: f32, style: &StrokeStyle) {
        let r = style.width * 0.5;
        if r <= 0.0 {
            return;
        }
        let (rx, ry) = (rx.max(0.0), ry.max(0.0));
        let bounds = clip_bounds(
            self,
            center.0 - rx - r - 1.0,
            center.1 - ry - r - 1.0,
            center.0 + rx + r + 1.0,
            center.1 + ry + r + 1.0,
        );
        if rx < 1e-3 || ry < 1e-3 {
            // Degenerate: a dot of the stroke width
            self.paint_coverage(bounds, style.color, style.opacity, |px, py| {
                edge_coverage(sdf_line_segment(px, py, center.0, center.1, center.0, center.1) - r)
            });
            return;
        }
        self.paint_coverage(bounds, style.color, style.opacity, |px, py| {
            edge_coverage(sdf_ellipse(px - center.0, py - center.1, rx, ry).abs() - r)
        });
    }

    /// Filled ellipse with radii (rx, ry) around `center`.
    pub fn fill_ellipse(&mut self, center: (f32, f32), rx: f32, ry: f32, color: Rgba<u8>, opacity: f32) {
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let bounds = clip_bounds(self, center.0 - rx - 1.0, center.1 - ry - 1.0, center.0 + rx + 1.0, center.1 + ry + 1.0);
        self.paint_coverage(bounds, color, opacity, |px, py| {
            edge_coverage(sdf_ellipse(px - center.0, py - center.1, rx, ry))
        });
    }

    /// Reset a rectangle to transparent.
    pub fn clear_rect(&mut self, x: i64, y: i64, w: u32, h: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w as i64).min(self.width() as i64);
        let y1 = (y + h as i64).min(self.height() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.set_pixel(px as u32, py as u32, TRANSPARENT);
            }
        }
    }

    /// Source-over `src` at (dx, dy) with an extra opacity multiplier.
    pub fn blit_surface(&mut self, src: &PixelSurface, dx: i64, dy: i64, opacity: f32) {
        self.blit_rgba(dx, dy, src.width(), src.height(), src.as_raw(), opacity);
    }

    /// Source-over a raw RGBA buffer of `src_w × src_h` at (dx, dy).
    pub fn blit_rgba(&mut self, dx: i64, dy: i64, src_w: u32, src_h: u32, data: &[u8], opacity: f32) {
        if data.len() != src_w as usize * src_h as usize * 4 {
            log_warn!("blit_rgba: buffer of {} bytes does not match {}×{}", data.len(), src_w, src_h);
            return;
        }
        for sy in 0..src_h {
            let gy = dy + sy as i64;
            if gy < 0 || gy >= self.height() as i64 {
                continue;
            }
            for sx in 0..src_w {
                let gx = dx + sx as i64;
                if gx < 0 || gx >= self.width() as i64 {
                    continue;
                }
                let o = (sy as usize * src_w as usize + sx as usize) * 4;
                let top = Rgba([data[o], data[o + 1], data[o + 2], data[o + 3]]);
                self.blend_pixel(gx as u32, gy as u32, top, opacity);
            }
        }
    }

    /// Solid `size × size` block with its top-left corner at (x, y).
    pub fn stamp_square(&mut self, x: i64, y: i64, size: u32, color: Rgba<u8>) {
        self.fill_rect(x, y, size.max(1), size.max(1), color, 1.0);
    }

    /// One-pixel dashed rectangle outline (selection marquee).
    pub fn stroke_dashed_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>, dash: (u32, u32)) {
        let period = (dash.0 + dash.1).max(1);
        let on = |i: u32| i % period < dash.0;
        let (x1, y1) = (x + w as i64, y + h as i64);
        // Walk the perimeter so the dash pattern runs continuously around it
        let mut i = 0u32;
        for px in x..=x1 {
            if on(i) && self.contains(px, y) {
                self.blend_pixel(px as u32, y as u32, color, 1.0);
            }
            i += 1;
        }
        for py in (y + 1)..=y1 {
            if on(i) && self.contains(x1, py) {
                self.blend_pixel(x1 as u32, py as u32, color, 1.0);
            }
            i += 1;
        }
        for px in (x..x1).rev() {
            if on(i) && self.contains(px, y1) {
                self.blend_pixel(px as u32, y1 as u32, color, 1.0);
            }
            i += 1;
        }
        for py in ((y + 1)..y1).rev() {
            if on(i) && self.contains(x, py) {
                self.blend_pixel(x as u32, py as u32, color, 1.0);
            }
            i += 1;
        }
    }

    /// Faint one-pixel grid lines every `step` pixels, starting at 0.
    pub fn draw_grid(&mut self, step: u32, color: Rgba<u8>) {
        if step == 0 {
            return;
        }
        let (w, h) = (self.width(), self.height());
        for x in (0..w).step_by(step as usize) {
            for y in 0..h {
                self.blend_pixel(x, y, color, 1.0);
            }
        }
        for y in (0..h).step_by(step as usize) {
            for x in 0..w {
                // Skip crossings already painted by the vertical pass
                if x % step != 0 {
                    self.blend_pixel(x, y, color, 1.0);
                }
            }
        }
    }

    /// Draw one of the drag-tool shapes between `start` and `end`.
    pub fn draw_shape(
        &mut self,
        kind: ShapeKind,
        start: (f32, f32),
        end: (f32, f32),
        style: &StrokeStyle,
        fill: ShapeFillMode,
    ) {
        match kind {
            ShapeKind::Line => self.stroke_line(start, end, style),
            ShapeKind::Rectangle => {
                if fill == ShapeFillMode::Filled {
                    let x = start.0.min(end.0).round() as i64;
                    let y = start.1.min(end.1).round() as i64;
                    let w = (end.0 - start.0).abs().round() as u32;
                    let h = (end.1 - start.1).abs().round() as u32;
                    self.fill_rect(x, y, w, h, style.color, style.opacity);
                }
                self.stroke_rect(start, end, style);
            }
            ShapeKind::Ellipse => {
                let dx = end.0 - start.0;
                let dy = end.1 - start.1;
                let radius = (dx * dx + dy * dy).sqrt();
                if fill == ShapeFillMode::Filled {
                    self.fill_ellipse(start, radius, radius, style.color, style.opacity);
                }
                self.stroke_ellipse(start, radius, radius, style);
            }
        }
    }
}
