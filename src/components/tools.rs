//! Tool selection, per-interaction configuration and the pointer-driven
//! state machine that turns pointer events into layer mutations.
//!
//! The machine never owns the canvas: every handler borrows the
//! `LayerStack` and `HistoryManager` it acts on and reports what changed
//! through a list of `ToolAction`s.

use image::Rgba;

use crate::canvas::LayerStack;
use crate::components::colors::DEFAULT_COLOR;
use crate::components::history::{HistoryButtons, HistoryManager};
use crate::ops::draw::{ShapeFillMode, ShapeKind, StrokeStyle};
use crate::ops::fill::{flood_fill, FillError};
use crate::ops::text::{draw_text, FontBook};

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;

/// Spacing of the grid overlay and of snapped pointer coordinates.
pub const DEFAULT_GRID_STEP: u32 = 32;
/// Grid line colour, `rgba(0,0,0,0.06)`.
pub const GRID_COLOR: Rgba<u8> = Rgba([0, 0, 0, 15]);
/// Text-selection marquee colour.
pub const SELECTION_COLOR: Rgba<u8> = Rgba([0, 0, 0, 160]);
/// Dash on / off lengths of the selection marquee.
pub const SELECTION_DASH: (u32, u32) = (6, 4);

pub const DEFAULT_FONT_FAMILY: &str = "IBM Plex Mono";
pub const DEFAULT_TEXT_SIZE: f32 = 24.0;

// ============================================================================
// TOOLS & CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Freehand,
    Eraser,
    Fill,
    Line,
    Rect,
    Ellipse,
    Text,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Freehand,
        Tool::Eraser,
        Tool::Fill,
        Tool::Line,
        Tool::Rect,
        Tool::Ellipse,
        Tool::Text,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Freehand => "Pencil",
            Tool::Eraser => "Eraser",
            Tool::Fill => "Fill",
            Tool::Line => "Line",
            Tool::Rect => "Rectangle",
            Tool::Ellipse => "Circle",
            Tool::Text => "Text",
        }
    }

    /// Single-key shortcut selecting this tool.
    pub fn shortcut(self) -> char {
        match self {
            Tool::Freehand => 'b',
            Tool::Eraser => 'e',
            Tool::Fill => 'g',
            Tool::Line => 'l',
            Tool::Rect => 'r',
            Tool::Ellipse => 'o',
            Tool::Text => 't',
        }
    }

    /// Drag tools that preview on the overlay and commit on release.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Rect => Some(ShapeKind::Rectangle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            _ => None,
        }
    }
}

/// Everything a tool reads while handling an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub color: Rgba<u8>,
    /// Stroke width in surface pixels.
    pub size: f32,
    /// Alpha multiplier in [0, 1].
    pub opacity: f32,
    /// Freehand stamps solid squares instead of smoothed segments.
    pub pixel_mode: bool,
    pub grid: bool,
    pub snap: bool,
    pub grid_step: u32,
    pub font_family: String,
    pub text_size: f32,
    pub shape_fill: ShapeFillMode,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
            size: 6.0,
            opacity: 1.0,
            pixel_mode: false,
            grid: false,
            snap: false,
            grid_step: DEFAULT_GRID_STEP,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            text_size: DEFAULT_TEXT_SIZE,
            shape_fill: ShapeFillMode::Outline,
        }
    }
}

impl ToolConfig {
    pub fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle::new(self.color, self.size, self.opacity)
    }
}

/// One configuration update from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    Color(Rgba<u8>),
    Size(f32),
    Opacity(f32),
    PixelMode(bool),
    Grid(bool),
    Snap(bool),
    GridStep(u32),
    FontFamily(String),
    TextSize(f32),
    ShapeFill(ShapeFillMode),
}

// ============================================================================
// POINTER INPUT & COORDINATE MAPPING
// ============================================================================

/// A pointer sample in host display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    /// Pen pressure in [0, 1]; `None` for devices that don't report it.
    pub pressure: Option<f32>,
}

impl PointerEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure: Some(pressure) }
    }

    /// Multiplier applied to the stroke width.  Missing or zero pressure
    /// counts as full pressure.
    pub fn pressure_scale(&self) -> f32 {
        match self.pressure {
            Some(p) if p > 0.0 && p.is_finite() => p.min(1.0),
            _ => 1.0,
        }
    }
}

/// On-screen size of the displayed canvas.  Without one, display
/// coordinates are taken to be surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Map a display-space position to a surface pixel: scale by
/// surface / display size, round, clamp to the surface, then (with `snap`)
/// quantise to the nearest multiple of `grid_step`.
pub fn map_to_surface(
    x: f32,
    y: f32,
    viewport: Option<Viewport>,
    surface_w: u32,
    surface_h: u32,
    snap: Option<u32>,
) -> (i64, i64) {
    let (sx, sy) = match viewport {
        Some(v) if v.width > 0.0 && v.height > 0.0 => {
            (surface_w as f32 / v.width, surface_h as f32 / v.height)
        }
        _ => (1.0, 1.0),
    };
    let max_x = surface_w.saturating_sub(1) as i64;
    let max_y = surface_h.saturating_sub(1) as i64;
    let axis = |v: f32, scale: f32, max: i64| -> i64 {
        let mapped = (v * scale).round();
        let mapped = if mapped.is_finite() { mapped as i64 } else { 0 };
        let mut p = mapped.clamp(0, max);
        if let Some(step) = snap.filter(|s| *s > 0) {
            let step = step as i64;
            let snapped = ((p as f64) / step as f64).round() as i64 * step;
            // Stay on a grid line inside the surface
            p = (if snapped > max { snapped - step } else { snapped }).max(0);
        }
        p
    };
    (axis(x, sx, max_x), axis(y, sy, max_y))
}

/// Pixel centre of a surface coordinate, where strokes are anchored.
#[inline]
fn centre(p: (i64, i64)) -> (f32, f32) {
    (p.0 as f32 + 0.5, p.1 as f32 + 0.5)
}

// ============================================================================
// KEYBOARD SHORTCUTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Undo,
    Redo,
    SelectTool(Tool),
}

/// ctrl+z undo, ctrl+y / ctrl+shift+z redo, plain letters select tools.
pub fn shortcut_for_key(key: &str, ctrl: bool, shift: bool) -> Option<KeyAction> {
    let mut chars = key.chars();
    let ch = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() {
        return None;
    }
    if ctrl {
        return match (ch, shift) {
            ('z', false) => Some(KeyAction::Undo),
            ('z', true) | ('y', _) => Some(KeyAction::Redo),
            _ => None,
        };
    }
    Tool::ALL
        .iter()
        .find(|t| t.shortcut() == ch)
        .map(|t| KeyAction::SelectTool(*t))
}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Host-facing request to collect text for a finished selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntryRequest {
    pub x: i64,
    pub y: i64,
    pub w: u32,
    pub h: u32,
    pub font_family: String,
    pub text_size: f32,
    pub color: Rgba<u8>,
}

/// What a handler changed, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Layer pixels changed; the composite is stale.
    Recomposite,
    /// Only the preview surface changed.
    OverlayChanged,
    HistoryPushed(HistoryButtons),
    RequestTextEntry(TextEntryRequest),
    FillRejected(FillError),
}

/// One recorded freehand sample, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub x: i64,
    pub y: i64,
    pub pressure: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionRect {
    x: i64,
    y: i64,
    w: u32,
    h: u32,
}

impl SelectionRect {
    fn spanning(a: (i64, i64), b: (i64, i64)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            w: (b.0 - a.0).unsigned_abs() as u32,
            h: (b.1 - a.1).unsigned_abs() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interaction {
    Idle,
    /// Freehand or eraser: `last` is the previous pointer position.
    Stroke { last: (i64, i64) },
    Shape { start: (i64, i64), current: (i64, i64), kind: ShapeKind },
    TextSelect { start: (i64, i64), current: (i64, i64), rect: Option<SelectionRect> },
    /// Fill already happened on pointer-down; waiting for release.
    Filled,
}

pub struct ToolStateMachine {
    tool: Tool,
    config: ToolConfig,
    viewport: Option<Viewport>,
    interaction: Interaction,
    path: Vec<PathPoint>,
    pending_text: Option<TextEntryRequest>,
}

impl Default for ToolStateMachine {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

impl ToolStateMachine {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            tool: Tool::default(),
            config,
            viewport: None,
            interaction: Interaction::Idle,
            path: Vec::new(),
            pending_text: None,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.interaction != Interaction::Idle
    }

    /// Points recorded by the current freehand stroke.
    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn pending_text(&self) -> Option<&TextEntryRequest> {
        self.pending_text.as_ref()
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    /// Switch tools.  An interaction in progress is ended as if the pointer
    /// had been released where it last was.
    pub fn set_tool(
        &mut self,
        tool: Tool,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        if self.is_active() {
            let at = self.last_position();
            actions = self.finish(stack, history, at);
        }
        self.tool = tool;
        actions
    }

    /// Commit any interaction in progress where the pointer last was and
    /// drop a pending text request.  Called before the canvas is
    /// reallocated so no drawing carries coordinates across a resize.
    pub fn end_interaction(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        if self.is_active() {
            let at = self.last_position();
            actions = self.finish(stack, history, at);
        }
        self.pending_text = None;
        actions
    }

    /// Abandon all interaction state without touching any surface.
    pub fn reset(&mut self) {
        self.interaction = Interaction::Idle;
        self.path.clear();
        self.pending_text = None;
    }

    /// Apply one configuration update.  Values are clamped to their valid
    /// ranges.  Returns true when the overlay needs redrawing.
    pub fn apply_config(&mut self, change: ConfigChange) -> bool {
        let c = &mut self.config;
        match change {
            ConfigChange::Color(color) => c.color = Rgba([color[0], color[1], color[2], 255]),
            ConfigChange::Size(size) => {
                if size.is_finite() {
                    c.size = size.max(1.0);
                }
            }
            ConfigChange::Opacity(opacity) => {
                if opacity.is_finite() {
                    c.opacity = opacity.clamp(0.0, 1.0);
                }
            }
            ConfigChange::PixelMode(on) => c.pixel_mode = on,
            ConfigChange::Grid(on) => {
                let changed = c.grid != on;
                c.grid = on;
                return changed;
            }
            ConfigChange::Snap(on) => c.snap = on,
            ConfigChange::GridStep(step) => {
                let step = step.max(1);
                let changed = c.grid_step != step;
                c.grid_step = step;
                return changed && c.grid;
            }
            ConfigChange::FontFamily(family) => c.font_family = family,
            ConfigChange::TextSize(size) => {
                if size.is_finite() && size > 0.0 {
                    c.text_size = size;
                }
            }
            ConfigChange::ShapeFill(mode) => c.shape_fill = mode,
        }
        false
    }

    /// Clear the preview surface and redraw the grid when it is enabled.
    pub fn refresh_overlay(&self, stack: &mut LayerStack) {
        stack.preview_layer.clear();
        if self.config.grid {
            stack.preview_layer.draw_grid(self.config.grid_step, GRID_COLOR);
        }
    }

    fn map(&self, stack: &LayerStack, ev: &PointerEvent) -> (i64, i64) {
        let snap = self.config.snap.then_some(self.config.grid_step);
        map_to_surface(ev.x, ev.y, self.viewport, stack.width, stack.height, snap)
    }

    fn last_position(&self) -> (i64, i64) {
        match self.interaction {
            Interaction::Stroke { last } => last,
            Interaction::Shape { current, .. } | Interaction::TextSelect { current, .. } => current,
            Interaction::Idle | Interaction::Filled => (0, 0),
        }
    }

    fn push_history(stack: &LayerStack, history: &mut HistoryManager, actions: &mut Vec<ToolAction>) {
        actions.push(ToolAction::HistoryPushed(history.push(stack)));
    }

    // ---- pointer handlers ---------------------------------------------------

    pub fn on_pointer_down(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
        ev: PointerEvent,
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        if self.is_active() {
            // Missed release (e.g. pointer captured elsewhere): close it first
            let at = self.last_position();
            actions = self.finish(stack, history, at);
        }
        let p = self.map(stack, &ev);
        self.path.clear();

        match self.tool {
            Tool::Fill => {
                Self::push_history(stack, history, &mut actions);
                let color = self.config.color;
                if let Some(layer) = stack.get_active_layer_mut() {
                    match flood_fill(&mut layer.pixels, p.0, p.1, color) {
                        Ok(outcome) if outcome.changed() => {
                            stack.mark_dirty();
                            actions.push(ToolAction::Recomposite);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log_err!("Fill at ({}, {}) rejected: {}", p.0, p.1, e);
                            actions.push(ToolAction::FillRejected(e));
                        }
                    }
                }
                self.interaction = Interaction::Filled;
            }
            Tool::Freehand | Tool::Eraser => {
                self.path.push(PathPoint { x: p.0, y: p.1, pressure: ev.pressure_scale() });
                self.interaction = Interaction::Stroke { last: p };
            }
            Tool::Line | Tool::Rect | Tool::Ellipse => {
                if let Some(kind) = self.tool.shape_kind() {
                    self.interaction = Interaction::Shape { start: p, current: p, kind };
                }
            }
            Tool::Text => {
                self.pending_text = None;
                self.interaction = Interaction::TextSelect { start: p, current: p, rect: None };
            }
        }
        actions
    }

    pub fn on_pointer_move(
        &mut self,
        stack: &mut LayerStack,
        _history: &mut HistoryManager,
        ev: PointerEvent,
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        let p = self.map(stack, &ev);

        match self.interaction {
            Interaction::Idle | Interaction::Filled => {}
            Interaction::Stroke { last } => {
                let cfg = &self.config;
                let Some(layer) = stack.get_active_layer_mut() else { return actions };
                match self.tool {
                    Tool::Eraser => {
                        layer.pixels.erase_line(centre(last), centre(p), cfg.size);
                    }
                    _ if cfg.pixel_mode => {
                        let s = cfg.size.round().max(1.0) as u32;
                        layer.pixels.stamp_square(p.0, p.1, s, cfg.color);
                    }
                    _ => {
                        let style = StrokeStyle::new(cfg.color, cfg.size * ev.pressure_scale(), cfg.opacity);
                        layer.pixels.stroke_line(centre(last), centre(p), &style);
                        self.path.push(PathPoint { x: p.0, y: p.1, pressure: ev.pressure_scale() });
                    }
                }
                stack.mark_dirty();
                self.interaction = Interaction::Stroke { last: p };
                actions.push(ToolAction::Recomposite);
            }
            Interaction::Shape { start, kind, .. } => {
                self.refresh_overlay(stack);
                stack.preview_layer.draw_shape(
                    kind,
                    centre(start),
                    centre(p),
                    &self.config.stroke_style(),
                    ShapeFillMode::Outline,
                );
                self.interaction = Interaction::Shape { start, current: p, kind };
                actions.push(ToolAction::OverlayChanged);
            }
            Interaction::TextSelect { start, .. } => {
                let rect = SelectionRect::spanning(start, p);
                self.refresh_overlay(stack);
                stack
                    .preview_layer
                    .stroke_dashed_rect(rect.x, rect.y, rect.w, rect.h, SELECTION_COLOR, SELECTION_DASH);
                self.interaction = Interaction::TextSelect { start, current: p, rect: Some(rect) };
                actions.push(ToolAction::OverlayChanged);
            }
        }
        actions
    }

    pub fn on_pointer_up(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
        ev: PointerEvent,
    ) -> Vec<ToolAction> {
        if !self.is_active() {
            return Vec::new();
        }
        let p = self.map(stack, &ev);
        self.finish(stack, history, p)
    }

    /// Leaving the canvas commits exactly like a release.
    pub fn on_pointer_leave(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
        ev: PointerEvent,
    ) -> Vec<ToolAction> {
        self.on_pointer_up(stack, history, ev)
    }

    fn finish(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
        p: (i64, i64),
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        let interaction = std::mem::replace(&mut self.interaction, Interaction::Idle);

        // Previews never outlive the interaction
        if !matches!(interaction, Interaction::Stroke { .. } | Interaction::Filled) {
            self.refresh_overlay(stack);
            actions.push(ToolAction::OverlayChanged);
        }

        match interaction {
            Interaction::Idle | Interaction::Filled => {}
            Interaction::Stroke { .. } => {
                self.path.clear();
                Self::push_history(stack, history, &mut actions);
            }
            Interaction::Shape { start, kind, .. } => {
                Self::push_history(stack, history, &mut actions);
                let style = self.config.stroke_style();
                let fill = self.config.shape_fill;
                if let Some(layer) = stack.get_active_layer_mut() {
                    layer.pixels.draw_shape(kind, centre(start), centre(p), &style, fill);
                    stack.mark_dirty();
                    actions.push(ToolAction::Recomposite);
                }
            }
            Interaction::TextSelect { rect, .. } => {
                if let Some(rect) = rect {
                    let request = TextEntryRequest {
                        x: rect.x,
                        y: rect.y,
                        w: rect.w,
                        h: rect.h,
                        font_family: self.config.font_family.clone(),
                        text_size: self.config.text_size,
                        color: self.config.color,
                    };
                    self.pending_text = Some(request.clone());
                    actions.push(ToolAction::RequestTextEntry(request));
                }
            }
        }
        actions
    }

    // ---- text entry ---------------------------------------------------------

    /// Render the confirmed text at the pending selection's top-left,
    /// bracketed by history checkpoints.  Empty text, a missing selection or
    /// an unavailable font leave everything untouched.
    pub fn commit_text(
        &mut self,
        stack: &mut LayerStack,
        history: &mut HistoryManager,
        fonts: &mut FontBook,
        text: &str,
    ) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        let Some(request) = self.pending_text.take() else { return actions };
        if text.is_empty() {
            return actions;
        }
        let Some(font) = fonts.resolve(&request.font_family) else {
            log_warn!("Text not placed: font '{}' unavailable", request.font_family);
            return actions;
        };

        Self::push_history(stack, history, &mut actions);
        let opacity = self.config.opacity;
        if let Some(layer) = stack.get_active_layer_mut() {
            let drawn = draw_text(
                &mut layer.pixels,
                &font,
                text,
                request.text_size,
                request.x as f32,
                request.y as f32,
                request.color,
                opacity,
            );
            if drawn {
                stack.mark_dirty();
                actions.push(ToolAction::Recomposite);
            }
        }
        Self::push_history(stack, history, &mut actions);
        actions
    }

    /// Dismiss the text-entry request without drawing.
    pub fn cancel_text(&mut self) -> bool {
        self.pending_text.take().is_some()
    }
}
