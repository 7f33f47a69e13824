use image::{Rgba, RgbaImage};
use rayon::prelude::*;

#[cfg(test)]
#[path = "canvas_test.rs"]
mod canvas_test;

/// Upper bound on surface area; anything larger is clamped to 1×1 at creation.
pub const MAX_SURFACE_PIXELS: u64 = 256_000_000;

/// Maximum supported canvas dimension in pixels (per axis).
pub const MAX_CANVAS_DIM: u32 = 32_768;

/// A pixel with zero alpha.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Opaque white, used as the export background.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ============================================================================
// PIXEL SURFACE – flat, non-premultiplied RGBA buffer
// ============================================================================

/// Owned W×H RGBA buffer.  The backing `RgbaImage` always holds exactly
/// `width * height * 4` bytes; dimensions only change through `resize`.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSurface {
    image: RgbaImage,
}

impl PixelSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = sanitize_dimensions(width, height);
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut surface = Self::new(width, height);
        if color != TRANSPARENT {
            surface.fill(color);
        }
        surface
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        if image.width() == 0 || image.height() == 0 {
            return Self::new(1, 1);
        }
        Self { image }
    }

    /// Wrap a raw RGBA byte buffer.  Returns `None` when the length does not
    /// match `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    /// Read a pixel; out-of-bounds reads return transparent black.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width() || y >= self.height() {
            return TRANSPARENT;
        }
        *self.image.get_pixel(x, y)
    }

    /// Write a pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        self.image.put_pixel(x, y, pixel);
    }

    /// Source-over blend `top` onto the pixel at (x, y) with an extra
    /// `opacity` multiplier on the source alpha.
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, top: Rgba<u8>, opacity: f32) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let px = self.image.get_pixel_mut(x, y);
        *px = blend_pixel(*px, top, opacity);
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    pub fn clear(&mut self) {
        self.as_raw_mut().fill(0);
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.image.as_raw().chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Reallocate at the new size.  Existing content is discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Reallocate at the new size, rescaling existing content to fit.
    pub fn resize_preserving(&mut self, width: u32, height: u32) {
        let (width, height) = sanitize_dimensions(width, height);
        if width == self.width() && height == self.height() {
            return;
        }
        self.image = image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
    }

    /// Approximate memory held by the pixel buffer.
    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// True when a `width`×`height` canvas is non-empty and within the per-axis
/// and total pixel limits.
pub fn dimensions_fit(width: u32, height: u32) -> bool {
    width > 0
        && height > 0
        && width <= MAX_CANVAS_DIM
        && height <= MAX_CANVAS_DIM
        && width as u64 * height as u64 <= MAX_SURFACE_PIXELS
}

fn sanitize_dimensions(width: u32, height: u32) -> (u32, u32) {
    let total = width as u64 * height as u64;
    if total > MAX_SURFACE_PIXELS || width == 0 || height == 0 {
        log_warn!(
            "PixelSurface: dimensions {}×{} are empty or exceed {} pixels, clamped to 1×1",
            width,
            height,
            MAX_SURFACE_PIXELS
        );
        (1, 1)
    } else {
        (width, height)
    }
}

/// Non-premultiplied source-over: `top` (with its alpha scaled by `opacity`)
/// composited over `base`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: fully opaque top pixel at full opacity, just overwrite
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_a = base[3] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |i: usize| {
        let b = base[i] as f32 / 255.0;
        let t = top[i] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// LAYERS
// ============================================================================

/// Stable identity of a layer, independent of its position in the stack.
pub type LayerId = u64;

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    /// Display label only; not required to be unique.
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub pixels: PixelSurface,
}

impl Layer {
    pub fn new(id: LayerId, name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            pixels: PixelSurface::new(width, height),
        }
    }
}

/// Direction for `LayerStack::move_layer`.  `Up` moves a layer towards the
/// top of the paint order (higher index), `Down` towards the bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

// ============================================================================
// LAYER STACK
// ============================================================================

/// Ordered layers, index 0 painted first (bottom).  Owns every layer, the
/// active-layer pointer and the non-destructive preview surface.
#[derive(Clone, Debug)]
pub struct LayerStack {
    pub layers: Vec<Layer>,
    pub active_layer_index: usize,
    pub width: u32,
    pub height: u32,
    /// Tool previews and the grid overlay.  Never part of the composite.
    pub preview_layer: PixelSurface,
    /// Bumped on every mutation that changes the composite.
    pub dirty_generation: u64,
    next_layer_id: LayerId,
}

impl LayerStack {
    /// A stack holding a single transparent layer named "Layer 1".
    pub fn new(width: u32, height: u32) -> Self {
        let mut stack = Self::empty(width, height);
        stack.create_layer("Layer 1");
        stack
    }

    /// A stack with no layers.  Only used while assembling a stack from
    /// persisted data; callers must add at least one layer.
    pub(crate) fn empty(width: u32, height: u32) -> Self {
        let preview_layer = PixelSurface::new(width, height);
        Self {
            layers: Vec::new(),
            active_layer_index: 0,
            width: preview_layer.width(),
            height: preview_layer.height(),
            preview_layer,
            dirty_generation: 0,
            next_layer_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active_layer_index)
    }

    pub fn get_active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.get_mut(self.active_layer_index)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    fn allocate_id(&mut self) -> LayerId {
        let id = self.next_layer_id;
        self.next_layer_id += 1;
        id
    }

    /// Append a transparent layer on top and make it active.
    pub fn create_layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = self.allocate_id();
        let layer = Layer::new(id, name.into(), self.width, self.height);
        self.layers.push(layer);
        self.active_layer_index = self.layers.len() - 1;
        self.mark_dirty();
        id
    }

    /// Insert an already-built layer at `index` (clamped to the stack length).
    /// The layer's surface must match the canvas size.
    pub(crate) fn insert_layer(&mut self, index: usize, mut layer: Layer) -> usize {
        layer.id = self.allocate_id();
        let idx = index.min(self.layers.len());
        self.layers.insert(idx, layer);
        self.active_layer_index = idx;
        self.mark_dirty();
        idx
    }

    /// Swap a layer with its neighbour.  Returns false at the boundaries or
    /// for an unknown index.
    pub fn move_layer(&mut self, index: usize, direction: MoveDirection) -> bool {
        let target = match direction {
            MoveDirection::Up => index.checked_add(1),
            MoveDirection::Down => index.checked_sub(1),
        };
        let Some(target) = target else { return false };
        if index >= self.layers.len() || target >= self.layers.len() {
            return false;
        }
        let active_id = self.active_layer().map(|l| l.id);
        self.layers.swap(index, target);
        self.restore_active(active_id);
        self.mark_dirty();
        true
    }

    /// Move a layer to the top of the paint order and make it active.
    pub fn raise_to_top(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        let layer = self.layers.remove(index);
        self.layers.push(layer);
        self.active_layer_index = self.layers.len() - 1;
        self.mark_dirty();
        true
    }

    /// Move a layer to the bottom of the paint order, keeping the active
    /// pointer on whichever layer it referenced.
    pub fn lower_to_bottom(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        let active_id = self.active_layer().map(|l| l.id);
        let layer = self.layers.remove(index);
        self.layers.insert(0, layer);
        self.restore_active(active_id);
        self.mark_dirty();
        true
    }

    /// Remove a layer.  The last remaining layer is never removed.
    pub fn delete_layer(&mut self, index: usize) -> Option<Layer> {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return None;
        }
        let was_active = index == self.active_layer_index;
        let removed = self.layers.remove(index);
        if was_active || self.active_layer_index >= self.layers.len() {
            self.active_layer_index = self.layers.len() - 1;
        } else if self.active_layer_index > index {
            self.active_layer_index -= 1;
        }
        self.mark_dirty();
        Some(removed)
    }

    pub fn select_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.active_layer_index = index;
        true
    }

    pub fn set_visibility(&mut self, index: usize, visible: bool) -> bool {
        let Some(layer) = self.layers.get_mut(index) else { return false };
        layer.visible = visible;
        self.mark_dirty();
        true
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> bool {
        let Some(layer) = self.layers.get_mut(index) else { return false };
        layer.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        self.mark_dirty();
        true
    }

    pub fn rename_layer(&mut self, index: usize, name: impl Into<String>) -> bool {
        let Some(layer) = self.layers.get_mut(index) else { return false };
        layer.name = name.into();
        true
    }

    fn restore_active(&mut self, active_id: Option<LayerId>) {
        if let Some(idx) = active_id.and_then(|id| self.index_of(id)) {
            self.active_layer_index = idx;
        }
    }

    /// Reallocate the canvas and every layer at the new size.  Raster
    /// content is discarded.  A size outside the canvas limits is refused
    /// and leaves the stack as it was.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.check_resize(width, height) {
            return false;
        }
        self.preview_layer.resize(width, height);
        self.width = self.preview_layer.width();
        self.height = self.preview_layer.height();
        for layer in &mut self.layers {
            layer.pixels.resize(self.width, self.height);
        }
        log_info!("Canvas resized to {}×{} (content discarded)", self.width, self.height);
        self.mark_dirty();
        true
    }

    /// Like `resize`, but every layer's content is rescaled to the new size.
    pub fn resize_preserving(&mut self, width: u32, height: u32) -> bool {
        if !self.check_resize(width, height) {
            return false;
        }
        self.preview_layer.resize(width, height);
        self.width = self.preview_layer.width();
        self.height = self.preview_layer.height();
        let (w, h) = (self.width, self.height);
        self.layers
            .par_iter_mut()
            .for_each(|layer| layer.pixels.resize_preserving(w, h));
        log_info!("Canvas resized to {}×{} (content rescaled)", self.width, self.height);
        self.mark_dirty();
        true
    }

    fn check_resize(&self, width: u32, height: u32) -> bool {
        if dimensions_fit(width, height) {
            return true;
        }
        log_warn!(
            "Resize to {}×{} refused; canvas stays {}×{}",
            width,
            height,
            self.width,
            self.height
        );
        false
    }

    // ---- compositing --------------------------------------------------------

    /// Flatten all visible layers into a new surface.
    pub fn composite(&self) -> PixelSurface {
        let mut target = PixelSurface::new(self.width, self.height);
        self.composite_into(&mut target);
        target
    }

    /// Clear `target` (reallocating it if its size differs from the canvas)
    /// and paint every visible layer bottom-to-top with source-over at the
    /// layer's opacity.  Rows are processed in parallel.
    pub fn composite_into(&self, target: &mut PixelSurface) {
        if target.width() != self.width || target.height() != self.height {
            target.resize(self.width, self.height);
        } else {
            target.clear();
        }

        let visible: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|l| l.visible && l.opacity > 0.0)
            .collect();
        if visible.is_empty() {
            return;
        }

        let row_bytes = self.width as usize * 4;
        target
            .as_raw_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let start = y * row_bytes;
                for layer in &visible {
                    let src = &layer.pixels.as_raw()[start..start + row_bytes];
                    for (dst, top) in row.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        if top[3] == 0 {
                            continue;
                        }
                        let base = Rgba([dst[0], dst[1], dst[2], dst[3]]);
                        let out = blend_pixel(base, Rgba([top[0], top[1], top[2], top[3]]), layer.opacity);
                        dst.copy_from_slice(&out.0);
                    }
                }
            });
    }

    /// Total pixel memory owned by all layers.
    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.pixels.memory_bytes()).sum()
    }
}
