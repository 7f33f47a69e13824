use std::collections::VecDeque;

use image::Rgba;
use thiserror::Error;

use crate::canvas::PixelSurface;

#[cfg(test)]
#[path = "fill_test.rs"]
mod fill_test;

/// What a flood fill did to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    /// Seed outside the surface; nothing touched.
    OutOfBounds,
    /// Seed already holds the fill colour; nothing touched.
    NoOp,
    /// Number of pixels recoloured.
    Filled { pixels: usize },
}

impl FillOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, FillOutcome::Filled { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FillError {
    #[error("not enough memory to flood fill a {width}×{height} surface")]
    ResourceExhausted { width: u32, height: u32 },
}

/// Replace the 4-connected region of pixels exactly equal to the seed pixel
/// with `fill_color` (alpha forced to 255).
///
/// Breadth-first over an explicit queue with a W×H visited bitmap, so every
/// pixel is examined at most once.  The surface is only modified once both
/// buffers have been allocated; an allocation failure leaves it untouched.
pub fn flood_fill(
    surface: &mut PixelSurface,
    x: i64,
    y: i64,
    fill_color: Rgba<u8>,
) -> Result<FillOutcome, FillError> {
    let total = surface.width() as usize * surface.height() as usize;
    flood_fill_reserving(surface, x, y, fill_color, total)
}

/// Visited bitmap and work queue, both reserved for `capacity` pixels.
struct WorkBuffers {
    visited: Vec<u8>,
    queue: VecDeque<u32>,
}

impl WorkBuffers {
    fn allocate(capacity: usize) -> Option<Self> {
        let mut visited: Vec<u8> = Vec::new();
        visited.try_reserve_exact(capacity).ok()?;
        let mut queue: VecDeque<u32> = VecDeque::new();
        queue.try_reserve_exact(capacity).ok()?;
        Some(Self { visited, queue })
    }
}

/// `flood_fill` with an explicit reservation size, never less than W×H.
/// Each pixel is queued at most once, so the queue never grows past the
/// reservation.
fn flood_fill_reserving(
    surface: &mut PixelSurface,
    x: i64,
    y: i64,
    fill_color: Rgba<u8>,
    reserve: usize,
) -> Result<FillOutcome, FillError> {
    if !surface.contains(x, y) {
        return Ok(FillOutcome::OutOfBounds);
    }

    let fill = Rgba([fill_color[0], fill_color[1], fill_color[2], 255]);
    let (w, h) = (surface.width(), surface.height());
    let target = surface.get_pixel(x as u32, y as u32);
    if target == fill {
        return Ok(FillOutcome::NoOp);
    }

    let wu = w as usize;
    let total = wu * h as usize;
    let Some(WorkBuffers { mut visited, mut queue }) = WorkBuffers::allocate(reserve.max(total)) else {
        log_err!("Flood fill: cannot allocate work buffers for {}×{}", w, h);
        return Err(FillError::ResourceExhausted { width: w, height: h });
    };
    visited.resize(total, 0);

    let tc = target.0;
    let fc = fill.0;
    let pixels = surface.as_raw_mut();

    let seed = y as usize * wu + x as usize;
    visited[seed] = 1;
    queue.push_back(seed as u32);

    let mut filled = 0usize;
    while let Some(idx) = queue.pop_front() {
        let idx = idx as usize;
        let o = idx * 4;
        if pixels[o..o + 4] != tc {
            continue;
        }
        pixels[o..o + 4].copy_from_slice(&fc);
        filled += 1;

        let px = idx % wu;
        let py = idx / wu;
        let mut visit = |n: usize| {
            if visited[n] == 0 {
                visited[n] = 1;
                queue.push_back(n as u32);
            }
        };
        if px > 0 {
            visit(idx - 1);
        }
        if px + 1 < wu {
            visit(idx + 1);
        }
        if py > 0 {
            visit(idx - wu);
        }
        if py + 1 < h as usize {
            visit(idx + wu);
        }
    }

    Ok(FillOutcome::Filled { pixels: filled })
}
